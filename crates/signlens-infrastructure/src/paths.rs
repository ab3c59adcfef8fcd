//! Unified path management for signlens configuration and data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/signlens/          # Config directory
//! ├── config.toml              # Application configuration
//! └── secret.json              # Gemini API keys
//!
//! ~/.local/share/signlens/     # Data directory (overridable)
//! ├── vocabulary.json          # Sign vocabulary
//! └── sessions/                # One JSON document per translation session
//! ```

use std::path::{Path, PathBuf};

const APP_NAME: &str = "signlens";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for signlens_core::SignlensError {
    fn from(err: PathError) -> Self {
        signlens_core::SignlensError::config(err.to_string())
    }
}

pub struct SignlensPaths;

impl SignlensPaths {
    /// `~/.config/signlens` (platform equivalent elsewhere).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// `~/.local/share/signlens` (platform equivalent elsewhere).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Ensure this file has appropriate permissions (e.g., 600) to prevent
    /// unauthorized access.
    pub fn secret_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("secret.json"))
    }

    pub fn vocabulary_file(data_dir: &Path) -> PathBuf {
        data_dir.join("vocabulary.json")
    }

    pub fn sessions_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("sessions")
    }
}
