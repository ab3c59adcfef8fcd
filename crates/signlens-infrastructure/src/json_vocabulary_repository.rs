//! File-backed vocabulary store.

use async_trait::async_trait;
use signlens_core::error::{Result, SignlensError};
use signlens_core::vocabulary::{VocabularyEntry, VocabularyRepository};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SEED: &str = include_str!("seed_vocabulary.json");

/// Returns the built-in starter vocabulary.
pub fn seed_vocabulary() -> Result<Vec<VocabularyEntry>> {
    let entries: Vec<VocabularyEntry> = serde_json::from_str(SEED)?;
    Ok(normalize(entries))
}

/// Lowercases and trims names, drops blank names, keeps the first of
/// duplicate names.
fn normalize(entries: Vec<VocabularyEntry>) -> Vec<VocabularyEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .map(VocabularyEntry::normalized)
        .filter(|entry| {
            if entry.sign_name.is_empty() {
                warn!("skipping vocabulary entry without a name");
                return false;
            }
            if !seen.insert(entry.sign_name.clone()) {
                warn!(sign = %entry.sign_name, "duplicate vocabulary entry ignored");
                return false;
            }
            true
        })
        .collect()
}

/// Vocabulary stored as a JSON array of entries.
///
/// The file is created from the seed set the first time it is read.
pub struct JsonVocabularyRepository {
    path: PathBuf,
}

impl JsonVocabularyRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_seed(&self) -> Result<Vec<VocabularyEntry>> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, SEED).await?;
        info!(path = %self.path.display(), "vocabulary file created from seed set");
        seed_vocabulary()
    }
}

#[async_trait]
impl VocabularyRepository for JsonVocabularyRepository {
    async fn fetch_all(&self) -> Result<Vec<VocabularyEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.write_seed().await,
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<VocabularyEntry> = serde_json::from_str(&content).map_err(|e| {
            SignlensError::data_access(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(normalize(entries))
    }
}
