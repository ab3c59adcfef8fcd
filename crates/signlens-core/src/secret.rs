//! Secret management service trait.
//!
//! Defines the interface for loading oracle credentials from secure storage.

use crate::config::SecretConfig;
use crate::error::Result;

/// Service for loading secret configuration.
///
/// # Security Note
///
/// Implementations should ensure that:
/// - Secret files have appropriate permissions (e.g., 600 on Unix)
/// - Secrets are never logged or exposed in error messages
#[async_trait::async_trait]
pub trait SecretService: Send + Sync {
    /// Loads the secret configuration.
    async fn load_secrets(&self) -> Result<SecretConfig>;

    /// Returns the oracle API keys in rotation order.
    ///
    /// An empty list is not an error here; the composition root decides
    /// whether it can start without credentials.
    async fn api_keys(&self) -> Result<Vec<String>> {
        let secrets = self.load_secrets().await?;
        Ok(secrets.gemini.map(|g| g.keys()).unwrap_or_default())
    }
}
