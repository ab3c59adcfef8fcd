//! Still-image frames submitted for classification.
//!
//! Frames are opaque encoded-image blobs; the only things the pipeline ever
//! looks at are the bytes (for fingerprinting and forwarding) and the mime type.

use crate::error::{Result, SignlensError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_FRAME_MIME: &str = "image/jpeg";

/// One encoded still image.
///
/// Cloning is cheap: the payload is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Arc<[u8]>,
    mime_type: String,
}

impl Frame {
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decodes a frame sent by a client, either raw base64 or a
    /// `data:<mime>;base64,<payload>` URL.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let (mime_type, payload) = match trimmed.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    SignlensError::validation("data URL is missing its ',' separator")
                })?;
                let mime = header
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_FRAME_MIME);
                (mime.to_string(), payload)
            }
            None => (DEFAULT_FRAME_MIME.to_string(), trimmed),
        };

        if payload.is_empty() {
            return Err(SignlensError::validation("frame image is empty"));
        }

        let bytes = BASE64_STANDARD
            .decode(payload)
            .map_err(|e| SignlensError::validation(format!("frame image is not valid base64: {e}")))?;

        Ok(Self::new(bytes, mime_type))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Deterministic content fingerprint (hex SHA-256 of the bytes).
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(&self.data))
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.data)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}
