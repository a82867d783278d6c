//! File session handler - one JSON document per session
//!
//! Each session's data lives in `<storage_dir>/<session_id>.json`. The file's
//! modification time is its last access: writes replace the file, and a touch
//! only bumps the timestamp, so it can never put back data older than a
//! concurrent `set`.

use super::StoredSession;
use crate::{SessionData, SessionHandler};
use async_trait::async_trait;
use chrono::Utc;
use crumb_core::{handler_error, not_found_error, CrumbError, CrumbResult};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

static SESSION_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// Session ids map straight to file names, so only a safe alphabet is accepted
pub fn is_valid_session_id(session_id: &str) -> bool {
    let regex = SESSION_ID_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("static regex is valid"));
    regex.is_match(session_id)
}

/// Set the modification time of a session file without touching its content
fn set_last_access(path: &Path, at: SystemTime) -> std::io::Result<()> {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)?
        .set_modified(at)
}

/// Session handler writing JSON files into a directory
pub struct FileHandler {
    /// Base directory for session storage
    storage_dir: PathBuf,
    delta: u64,
}

impl FileHandler {
    /// Create a file handler, creating `storage_dir` if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P, delta: u64) -> CrumbResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            handler_error!(
                format!("Cannot create session directory {}", storage_dir.display()),
                "file_handler",
                e
            )
        })?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self { storage_dir, delta })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn session_file(&self, session_id: &str) -> CrumbResult<PathBuf> {
        if !is_valid_session_id(session_id) {
            return Err(CrumbError::InvalidSessionId {
                session_id: session_id.to_string(),
            });
        }
        Ok(self.storage_dir.join(format!("{}.json", session_id)))
    }

    async fn read_stored(&self, session_id: &str) -> CrumbResult<Option<StoredSession>> {
        let session_file = self.session_file(session_id)?;
        let read_error = |e: std::io::Error| {
            handler_error!(
                format!("Failed to read {}", session_file.display()),
                "file_handler",
                e
            )
        };

        let mut file = match tokio::fs::File::open(&session_file).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(e)),
        };

        // Content and timestamp come from the same open file, even if a writer
        // renames a new version into place meanwhile
        let mut json_data = String::new();
        file.read_to_string(&mut json_data).await.map_err(read_error)?;
        let modified = file
            .metadata()
            .await
            .and_then(|metadata| metadata.modified())
            .map_err(read_error)?;

        let data: SessionData = serde_json::from_str(&json_data).map_err(|e| {
            handler_error!(
                format!("Corrupt session file {}", session_file.display()),
                "file_handler",
                e
            )
        })?;

        Ok(Some(StoredSession {
            data,
            last_access: modified.into(),
        }))
    }

    async fn write_data(&self, session_id: &str, data: &SessionData) -> CrumbResult<()> {
        let session_file = self.session_file(session_id)?;
        let json_data = serde_json::to_string(data)?;

        // Every write gets its own temp file; the rename makes the last one win
        let tmp_file = self
            .storage_dir
            .join(format!("{}.{}.tmp", session_id, Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_file, json_data).await.map_err(|e| {
            handler_error!(
                format!("Failed to write {}", tmp_file.display()),
                "file_handler",
                e
            )
        })?;

        if let Err(e) = tokio::fs::rename(&tmp_file, &session_file).await {
            let _ = tokio::fs::remove_file(&tmp_file).await;
            return Err(handler_error!(
                format!("Failed to replace {}", session_file.display()),
                "file_handler",
                e
            ));
        }

        debug!("Saved session {} to {}", session_id, session_file.display());
        Ok(())
    }

    async fn list_session_files(&self) -> CrumbResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.storage_dir).await.map_err(|e| {
            handler_error!("Failed to list session directory", "file_handler", e)
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_session_id(stem) {
                    files.push((stem.to_string(), path));
                }
            }
        }

        Ok(files)
    }

    /// Get storage statistics
    pub async fn storage_stats(&self) -> CrumbResult<StorageStats> {
        let mut total_sessions = 0;
        let mut total_size_bytes = 0;

        for (_, path) in self.list_session_files().await? {
            total_sessions += 1;
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                total_size_bytes += metadata.len();
            }
        }

        Ok(StorageStats {
            total_sessions,
            total_size_bytes,
            storage_dir: self.storage_dir.clone(),
        })
    }
}

#[async_trait]
impl SessionHandler for FileHandler {
    fn delta(&self) -> u64 {
        self.delta
    }

    async fn get(&self, session_id: &str) -> CrumbResult<SessionData> {
        match self.read_stored(session_id).await? {
            Some(stored) if !stored.is_expired(self.delta, Utc::now()) => Ok(stored.data),
            _ => Err(not_found_error!(session_id, "file_handler")),
        }
    }

    async fn set(&self, session_id: &str, data: &SessionData) -> CrumbResult<()> {
        self.write_data(session_id, data).await
    }

    async fn clear(&self, session_id: &str) -> CrumbResult<()> {
        let session_file = self.session_file(session_id)?;
        match tokio::fs::remove_file(&session_file).await {
            Ok(()) => {
                debug!("Deleted session file: {}", session_file.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(handler_error!(
                format!("Failed to delete {}", session_file.display()),
                "file_handler",
                e
            )),
        }
    }

    async fn touch(&self, session_id: &str) -> CrumbResult<()> {
        let session_file = self.session_file(session_id)?;
        let path = session_file.clone();
        let touched =
            tokio::task::spawn_blocking(move || set_last_access(&path, SystemTime::now()))
                .await
                .map_err(|e| handler_error!("Touch task failed", "file_handler", e))?;

        match touched {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(handler_error!(
                format!("Failed to touch {}", session_file.display()),
                "file_handler",
                e
            )),
        }
    }

    async fn flush_expired_sessions(&self) -> CrumbResult<usize> {
        let now = Utc::now();
        let mut cleaned_count = 0;

        for (session_id, path) in self.list_session_files().await? {
            match self.read_stored(&session_id).await {
                Ok(Some(stored)) if stored.is_expired(self.delta, now) => {
                    if let Err(e) = self.clear(&session_id).await {
                        warn!("Failed to delete expired session {}: {}", session_id, e);
                    } else {
                        cleaned_count += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Skipping unreadable session file {}: {}", path.display(), e);
                }
            }
        }

        info!("Cleaned up {} expired sessions", cleaned_count);
        Ok(cleaned_count)
    }

    async fn session_ids(&self) -> CrumbResult<Vec<String>> {
        Ok(self
            .list_session_files()
            .await?
            .into_iter()
            .map(|(session_id, _)| session_id)
            .collect())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_sessions: usize,
    pub total_size_bytes: u64,
    pub storage_dir: PathBuf,
}

impl StorageStats {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn summary(&self) -> String {
        format!(
            "Sessions: {}, Size: {:.2} MB, Dir: {}",
            self.total_sessions,
            self.total_size_mb(),
            self.storage_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample() -> SessionData {
        let mut data = SessionData::new();
        data.insert("user".to_string(), json!("alice"));
        data.insert("cart".to_string(), json!([1, 2, 3]));
        data
    }

    fn backdate(handler: &FileHandler, session_id: &str, seconds: u64) {
        let path = handler.session_file(session_id).unwrap();
        let at = SystemTime::now() - std::time::Duration::from_secs(seconds);
        set_last_access(&path, at).unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path(), 60).unwrap();

        handler.set("abc", &sample()).await.unwrap();
        assert!(dir.path().join("abc.json").exists());
        assert_eq!(handler.get("abc").await.unwrap(), sample());

        handler.clear("abc").await.unwrap();
        assert!(matches!(
            handler.get("abc").await,
            Err(CrumbError::SessionNotFound { .. })
        ));
        // Clearing twice is fine
        handler.clear("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path(), 60).unwrap();

        assert!(matches!(
            handler.set("../escape", &sample()).await,
            Err(CrumbError::InvalidSessionId { .. })
        ));
        assert!(!is_valid_session_id(""));
        assert!(is_valid_session_id("0f8fad5bd9cb469fa16570867728950e"));
    }

    #[tokio::test]
    async fn test_expiry_touch_and_flush() {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path(), 60).unwrap();

        handler.set("old", &sample()).await.unwrap();
        handler.set("idle", &sample()).await.unwrap();
        handler.set("fresh", &sample()).await.unwrap();
        backdate(&handler, "old", 600);
        backdate(&handler, "idle", 50);

        assert!(handler.get("old").await.is_err());

        handler.touch("idle").await.unwrap();
        let stored = handler.read_stored("idle").await.unwrap().unwrap();
        assert!(Utc::now() - stored.last_access < Duration::seconds(5));
        assert_eq!(stored.data, sample());

        // A corrupt file is skipped, not fatal
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        assert_eq!(handler.flush_expired_sessions().await.unwrap(), 1);

        let mut ids = handler.session_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["broken", "fresh", "idle"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_on_one_id() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(FileHandler::new(dir.path(), 60).unwrap());

        for round in 0..20 {
            let writes: Vec<_> = (0..8)
                .map(|writer| {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        let mut data = SessionData::new();
                        data.insert("writer".to_string(), json!(writer));
                        data.insert("round".to_string(), json!(round));
                        handler.set("same", &data).await
                    })
                })
                .collect();

            for write in writes {
                write.await.unwrap().unwrap();
            }

            let data = handler.get("same").await.unwrap();
            assert_eq!(data["round"], json!(round));
            assert!(data["writer"].as_u64().unwrap() < 8);
        }

        // Temp files never outlive a write and are not listed as sessions
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(handler.session_ids().await.unwrap(), vec!["same".to_string()]);
    }

    #[tokio::test]
    async fn test_touch_keeps_file_content() {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path(), 60).unwrap();
        handler.set("abc", &sample()).await.unwrap();
        backdate(&handler, "abc", 30);

        let path = dir.path().join("abc.json");
        let before = std::fs::read(&path).unwrap();
        handler.touch("abc").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified.elapsed().unwrap() < std::time::Duration::from_secs(5));

        // Touching a missing session is a no-op
        handler.touch("missing").await.unwrap();
        assert!(!dir.path().join("missing.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_touch_never_undoes_set() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(FileHandler::new(dir.path(), 60).unwrap());

        for round in 0..20 {
            let mut before = SessionData::new();
            before.insert("user".to_string(), json!("alice"));
            handler.set("abc", &before).await.unwrap();

            let touches: Vec<_> = (0..4)
                .map(|_| {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move { handler.touch("abc").await })
                })
                .collect();

            let mut after = SessionData::new();
            after.insert("user".to_string(), json!(format!("bob-{}", round)));
            handler.set("abc", &after).await.unwrap();

            for touch in touches {
                touch.await.unwrap().unwrap();
            }
            assert_eq!(handler.get("abc").await.unwrap(), after);
        }
    }

    #[tokio::test]
    async fn test_storage_stats() {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path(), 60).unwrap();
        handler.set("a", &sample()).await.unwrap();
        handler.set("b", &sample()).await.unwrap();

        let stats = handler.storage_stats().await.unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.summary().starts_with("Sessions: 2"));
    }
}
