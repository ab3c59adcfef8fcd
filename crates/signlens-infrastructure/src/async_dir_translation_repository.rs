//! Directory-backed TranslationRepository implementation.

use async_trait::async_trait;
use signlens_core::error::{Result, SignlensError};
use signlens_core::translation::{
    JudgeEntry, TranslationRecord, TranslationRepository, TranslationSession,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// One JSON document per translation session.
///
/// Directory structure:
/// ```text
/// sessions_dir/
/// ├── 6f1c...-uuid-1.json
/// └── 9a2e...-uuid-2.json
/// ```
///
/// Read-modify-write cycles are serialized by a repository-wide async lock;
/// documents are replaced atomically via a temp file and rename.
pub struct AsyncDirTranslationRepository {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AsyncDirTranslationRepository {
    /// Creates the repository, creating `dir` if needed.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SignlensError::validation(format!(
                "invalid session id: {session_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    async fn load(&self, path: &Path) -> Result<Option<TranslationSession>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads (or starts) a session, applies `update` and writes it back.
    async fn modify<F>(&self, session_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut TranslationSession) + Send,
    {
        let path = self.session_path(session_id)?;
        let _guard = self.write_lock.lock().await;

        let mut session = self
            .load(&path)
            .await?
            .unwrap_or_else(|| TranslationSession::new(session_id));
        update(&mut session);
        self.save(&path, &session).await
    }

    async fn save(&self, path: &Path, session: &TranslationSession) -> Result<()> {
        let content = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl TranslationRepository for AsyncDirTranslationRepository {
    async fn create_session(&self, session_id: &str) -> Result<TranslationSession> {
        let path = self.session_path(session_id)?;
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.load(&path).await? {
            return Ok(existing);
        }
        let session = TranslationSession::new(session_id);
        self.save(&path, &session).await?;
        debug!(session_id, "translation session created");
        Ok(session)
    }

    async fn append(&self, session_id: &str, record: TranslationRecord) -> Result<()> {
        self.modify(session_id, |session| session.push(record)).await
    }

    async fn append_judge(&self, session_id: &str, entry: JudgeEntry) -> Result<()> {
        self.modify(session_id, |session| session.push_judge(entry)).await
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<TranslationSession>> {
        let path = self.session_path(session_id)?;
        self.load(&path).await
    }
}
