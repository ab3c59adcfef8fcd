//! GeminiApiAgent - Direct REST API client for Gemini.
//!
//! Calls `generateContent` with one text part followed by the frames as
//! inline image data. One agent is bound to one API key; the credential pool
//! owns one agent per key through [`GeminiAgentFactory`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signlens_core::Frame;
use signlens_core::config::OracleConfig;
use signlens_core::oracle::{Credential, OracleClient, OracleClientFactory, OracleError};
use std::sync::Arc;
use std::time::Duration;

/// Oracle client that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiApiAgent {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl GeminiApiAgent {
    /// Creates an agent with the provided API key and model and default sampling.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = OracleConfig::default();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: defaults.base_url,
            generation_config: GenerationConfig {
                temperature: defaults.temperature,
                top_p: defaults.top_p,
                top_k: defaults.top_k,
            },
        }
    }

    /// Builds an agent from configuration, sharing `client`'s connection pool.
    pub fn from_config(client: Client, api_key: impl Into<String>, config: &OracleConfig) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
            },
        }
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the endpoint root (used to point at a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_parts(prompt: &str, frames: &[Frame]) -> Result<Vec<Part>, OracleError> {
        let mut parts = Vec::with_capacity(frames.len() + 1);
        if !prompt.trim().is_empty() {
            parts.push(Part::Text {
                text: prompt.to_string(),
            });
        }

        // Oldest first, current frame last.
        for frame in frames {
            parts.push(Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: frame.mime_type().to_string(),
                    data: BASE64_STANDARD.encode(frame.data()),
                },
            });
        }

        if parts.is_empty() {
            return Err(OracleError::new(
                "Gemini payload must include text or at least one frame",
            ));
        }

        Ok(parts)
    }

    async fn send_request(&self, body: &GenerateContentRequest) -> Result<String, OracleError> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            self.base_url,
            model = self.model,
            api_key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                // reqwest includes the URL (and so the key) in its Display output.
                OracleError::new(format!(
                    "Gemini API request failed: {}",
                    err.without_url()
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            OracleError::new(format!(
                "Failed to parse Gemini response: {}",
                err.without_url()
            ))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl OracleClient for GeminiApiAgent {
    async fn generate(&self, prompt: &str, frames: &[Frame]) -> Result<String, OracleError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: Self::build_parts(prompt, frames)?,
            }],
            generation_config: self.generation_config.clone(),
        };
        self.send_request(&request).await
    }
}

/// Creates one [`GeminiApiAgent`] per credential.
pub struct GeminiAgentFactory {
    client: Client,
    config: OracleConfig,
}

impl GeminiAgentFactory {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OracleError::new(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

impl OracleClientFactory for GeminiAgentFactory {
    fn create(&self, credential: &Credential) -> Result<Arc<dyn OracleClient>, OracleError> {
        Ok(Arc::new(GeminiApiAgent::from_config(
            self.client.clone(),
            credential.api_key(),
            &self.config,
        )))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, OracleError> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| OracleError::new("Gemini API returned no text in the response candidates"))
}

/// Finds the first `quotaId` in `error.details[].violations[]`.
fn find_quota_id(details: &[Value]) -> Option<String> {
    details
        .iter()
        .filter_map(|detail| detail.get("violations").and_then(Value::as_array))
        .flatten()
        .find_map(|violation| violation.get("quotaId").and_then(Value::as_str))
        .map(str::to_string)
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> OracleError {
    let (message, quota_id) = match serde_json::from_str::<ErrorWrapper>(&body) {
        Ok(wrapper) => {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            let message = if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            };
            (message, find_quota_id(&wrapper.error.details))
        }
        Err(_) => (body, None),
    };

    let mut error = OracleError::with_status(status.as_u16(), message);
    if let Some(quota_id) = quota_id {
        error = error.with_quota_id(quota_id);
    }
    if let Some(delay) = retry_after {
        error = error.with_retry_after(delay);
    }
    error
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signlens_core::oracle::OracleErrorKind;

    #[test]
    fn test_build_parts_orders_text_then_frames() {
        let frames = vec![
            Frame::new(b"old".to_vec(), "image/jpeg"),
            Frame::new(b"new".to_vec(), "image/png"),
        ];
        let parts = GeminiApiAgent::build_parts("describe", &frames).unwrap();
        let json = serde_json::to_value(&parts).unwrap();

        assert_eq!(json[0]["text"], "describe");
        assert_eq!(json[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(json[1]["inlineData"]["data"], BASE64_STANDARD.encode(b"old"));
        assert_eq!(json[2]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn test_build_parts_rejects_empty_payload() {
        assert!(GeminiApiAgent::build_parts("   ", &[]).is_err());
    }

    #[test]
    fn test_request_serializes_generation_config() {
        let request = GenerateContentRequest {
            contents: vec![],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.8,
                top_k: 40,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert!(json["generationConfig"]["topP"].is_number());
    }

    #[test]
    fn test_map_http_error_extracts_per_day_quota() {
        let body = r#"{
          "error": {
            "code": 429,
            "message": "You exceeded your current quota.",
            "status": "RESOURCE_EXHAUSTED",
            "details": [
              {"@type": "type.googleapis.com/google.rpc.QuotaFailure",
               "violations": [{"quotaMetric": "generate_content_free_tier_requests",
                               "quotaId": "GenerateRequestsPerDayPerProjectPerModel-FreeTier"}]}
            ]
          }
        }"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body.to_string(), None);
        assert_eq!(err.status, Some(429));
        assert!(err.message.starts_with("RESOURCE_EXHAUSTED: "));
        assert_eq!(
            err.quota_id.as_deref(),
            Some("GenerateRequestsPerDayPerProjectPerModel-FreeTier")
        );
        assert_eq!(err.kind(), OracleErrorKind::DailyQuota);
    }

    #[test]
    fn test_map_http_error_per_minute_is_rate_limited() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED",
            "details": [{"violations": [{"quotaId": "GenerateRequestsPerMinutePerProjectPerModel"}]}]}}"#;
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            body.to_string(),
            Some(Duration::from_secs(7)),
        );
        assert_eq!(err.kind(), OracleErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_map_http_error_plain_body() {
        let err = map_http_error(StatusCode::BAD_REQUEST, "bad things".to_string(), None);
        assert_eq!(err.message, "bad things");
        assert_eq!(err.kind(), OracleErrorKind::Other);
    }

    #[test]
    fn test_extract_text_response() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"detectedSign\": null}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text_response(parsed).unwrap(), "{\"detectedSign\": null}");

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(extract_text_response(empty).is_err());
    }

    #[test]
    fn test_parse_retry_after() {
        let value = HeaderValue::from_static("12");
        assert_eq!(parse_retry_after(Some(&value)), Some(Duration::from_secs(12)));
        let date = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
