//! REST endpoints under `/api`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use signlens_application::{KeyedOutcome, PipelineError};
use signlens_core::session::ConversationEntry;
use signlens_core::translation::ClassificationResult;
use signlens_core::{Frame, SignlensError};
use tracing::{error, info, warn};

use crate::app::AppState;

/// Error returned by the REST handlers.
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    /// The oracle is throttling; retry later.
    Throttled(String),
    /// The oracle's daily quota is gone.
    QuotaExhausted(String),
    /// The oracle failed or answered with something unusable.
    Upstream(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::QuotaExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::InvalidInput(m)
            | Self::NotFound(m)
            | Self::Throttled(m)
            | Self::QuotaExhausted(m)
            | Self::Upstream(m)
            | Self::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "success": false, "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<SignlensError> for ApiError {
    fn from(err: SignlensError) -> Self {
        if err.is_validation() {
            Self::InvalidInput(err.to_string())
        } else if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Domain(e) => e.into(),
            e if e.is_fatal() => Self::QuotaExhausted(e.to_string()),
            e if e.is_transient() => Self::Throttled(e.to_string()),
            e => Self::Upstream(e.to_string()),
        }
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.pipeline.sessions().len().await;
    Json(json!({
        "status": "ok",
        "message": "Signlens server is running",
        "sessions": sessions,
    }))
}

/// `GET /api/translate/vocabulary`
pub async fn vocabulary(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let signs = state.pipeline.vocabulary().get().await?;
    Ok(Json(json!({
        "success": true,
        "count": signs.len(),
        "signs": signs.as_slice(),
    })))
}

/// `POST /api/translate/session/start`
pub async fn start_session(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = state.pipeline.translations().create_session(&session_id).await?;
    info!(session_id = %session.session_id, "stored session created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "sessionId": session.session_id })),
    ))
}

/// `GET /api/translate/session/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.pipeline.translations().find_session(&session_id).await? {
        Some(session) => Ok(Json(json!({ "success": true, "session": session }))),
        None => Err(ApiError::NotFound(format!("session '{session_id}' not found"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct FramesRequest {
    #[serde(default)]
    pub frames: Vec<String>,
}

/// `POST /api/translate/frames`
///
/// One-shot classification of an uploaded frame sequence; the last frame is
/// the one being classified.
pub async fn translate_frames(
    State(state): State<AppState>,
    Json(request): Json<FramesRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.frames.is_empty() {
        return Err(ApiError::InvalidInput("frames[] required".to_string()));
    }
    let frames = request
        .frames
        .iter()
        .map(|encoded| Frame::from_encoded(encoded))
        .collect::<Result<Vec<_>, _>>()?;

    let result = state.pipeline.analyze(&frames).await.map_err(|e| {
        if e.is_transient() {
            warn!(error = %e, "one-shot classification throttled");
        } else {
            error!(error = %e, "one-shot classification failed");
        }
        ApiError::from(e)
    })?;

    Ok(Json(json!({
        "success": true,
        "text": summary_text(&result),
        "confidence": result.confidence,
        "analysis": result,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub image_frame: Option<String>,
    #[serde(default)]
    pub previous_frames: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_context: Vec<ContextItem>,
}

/// One previously recognised sign supplied by the client.
#[derive(Debug, Deserialize)]
pub struct ContextItem {
    pub sign: String,
    #[serde(default)]
    pub confidence: f64,
}

/// `POST /api/translate`
///
/// Classifies `imageFrame` with `previousFrames` as motion context. A frame
/// identical to the previous request for the same `sessionId` is answered
/// with `skipped: true` and no oracle call.
pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(image) = request.image_frame.filter(|f| !f.trim().is_empty()) else {
        return Err(ApiError::InvalidInput("imageFrame is required".to_string()));
    };
    let frames = request
        .previous_frames
        .iter()
        .chain(std::iter::once(&image))
        .map(|encoded| Frame::from_encoded(encoded))
        .collect::<Result<Vec<_>, _>>()?;
    let context: Vec<ConversationEntry> = request
        .conversation_context
        .into_iter()
        .map(|item| ConversationEntry {
            sign: item.sign,
            confidence: item.confidence,
        })
        .collect();
    let session_id = request.session_id.filter(|id| !id.trim().is_empty());

    let outcome = state
        .pipeline
        .translate(session_id.as_deref(), &frames, &context)
        .await
        .map_err(|e| {
            if e.is_transient() {
                warn!(error = %e, "translation throttled");
            } else {
                error!(error = %e, "translation failed");
            }
            ApiError::from(e)
        })?;

    let timestamp = chrono::Utc::now().to_rfc3339();
    Ok(Json(match outcome {
        KeyedOutcome::Classified(result) => json!({
            "success": true,
            "translation": result,
            "timestamp": timestamp,
        }),
        KeyedOutcome::Skipped(result) => json!({
            "success": true,
            "translation": result,
            "skipped": true,
            "timestamp": timestamp,
        }),
    }))
}

/// `"<sign> (<pct>%)\n\n<reasoning>"`, with "Unknown" for no sign.
fn summary_text(result: &ClassificationResult) -> String {
    let label = result.detected_sign.as_deref().unwrap_or("Unknown");
    let pct = (result.confidence * 100.0).round() as i64;
    if result.reasoning.is_empty() {
        format!("{label} ({pct}%)")
    } else {
        format!("{label} ({pct}%)\n\n{}", result.reasoning)
    }
}
