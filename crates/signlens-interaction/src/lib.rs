//! Interaction layer for Signlens: everything that talks to the inference oracle.
//!
//! - `gemini_api_agent`: REST client for Gemini `generateContent`
//! - `credential_pool`: process-wide credential rotation and client reuse
//! - `inference_client`: bounded rotate-and-retry loop and its error taxonomy
//! - `response_parser`: tolerant JSON extraction from model output
//! - `prompts`: Stage A / Stage C prompt rendering

pub mod credential_pool;
pub mod gemini_api_agent;
pub mod inference_client;
pub mod prompts;
pub mod response_parser;

pub use credential_pool::{CredentialPool, PooledClient};
pub use gemini_api_agent::{GeminiAgentFactory, GeminiApiAgent};
pub use inference_client::{InferenceClient, InferenceError};
pub use prompts::PromptRenderer;
pub use response_parser::ParseError;
