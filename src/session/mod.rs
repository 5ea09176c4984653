//! Session archive
//!
//! Persists chat transcripts as one pretty-printed JSON file per session
//! under the history directory. A session with no messages is never written.
use crate::chat::ChatTurn;
use crate::error::{ArchivistError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const PREVIEW_CHARS: usize = 30;

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatTurn>,
}

/// Listing entry for one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub preview: String,
}

impl Session {
    fn summary(&self) -> SessionSummary {
        let preview = match self.messages.first() {
            Some(first) => {
                let head: String = first.content.chars().take(PREVIEW_CHARS).collect();
                format!("{}...", head)
            }
            None => "Empty Chat".to_string(),
        };
        SessionSummary {
            id: self.session_id.clone(),
            updated_at: self.updated_at,
            preview,
        }
    }
}

/// Fresh opaque session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Reject ids that could escape the history directory
fn validate_session_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ArchivistError::InvalidSessionId { id: id.to_string() })
    }
}

/// File-backed store of sessions, one file per id
pub struct SessionArchive {
    history_dir: PathBuf,
}

impl SessionArchive {
    pub fn new(history_dir: impl Into<PathBuf>) -> Self {
        Self {
            history_dir: history_dir.into(),
        }
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    fn session_file(&self, id: &str) -> Result<PathBuf> {
        validate_session_id(id)?;
        Ok(self.history_dir.join(format!("{}.json", id)))
    }

    /// Write `turns` under `id`, replacing any previous transcript
    ///
    /// Returns `false` without touching disk when `turns` is empty.
    pub fn save(&self, id: &str, turns: &[ChatTurn]) -> Result<bool> {
        let path = self.session_file(id)?;
        if turns.is_empty() {
            debug!("Not persisting empty session {}", id);
            return Ok(false);
        }

        std::fs::create_dir_all(&self.history_dir).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!(
                "Failed to create history directory: {}",
                self.history_dir.display()
            ),
        })?;

        let session = Session {
            session_id: id.to_string(),
            updated_at: Utc::now(),
            messages: turns.to_vec(),
        };
        let content = serde_json::to_string_pretty(&session).map_err(|e| ArchivistError::Json {
            source: e,
            context: "Failed to serialize session".to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!("Failed to write session file: {}", path.display()),
        })?;

        debug!("Saved session {} ({} messages)", id, turns.len());
        Ok(true)
    }

    /// Load a full session by id
    pub fn load_session(&self, id: &str) -> Result<Session> {
        let path = self.session_file(id)?;
        if !path.exists() {
            return Err(ArchivistError::SessionNotFound { id: id.to_string() });
        }
        read_session(&path)
    }

    /// Load the turns of a session by id
    pub fn load(&self, id: &str) -> Result<Vec<ChatTurn>> {
        Ok(self.load_session(id)?.messages)
    }

    /// All sessions, most recently updated first
    ///
    /// Files that cannot be parsed are skipped with a warning.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        if !self.history_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.history_dir).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!(
                "Failed to read history directory: {}",
                self.history_dir.display()
            ),
        })?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchivistError::Io {
                source: e,
                context: "Failed to read directory entry".to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_session(&path) {
                Ok(session) => sessions.push(session.summary()),
                Err(e) => warn!("Skipping unreadable session file {}: {}", path.display(), e),
            }
        }

        // Sort by updated_at descending (newest first)
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));

        Ok(sessions)
    }

    /// Delete a session
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.session_file(id)?;
        if !path.exists() {
            return Err(ArchivistError::SessionNotFound { id: id.to_string() });
        }

        std::fs::remove_file(&path).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!("Failed to delete session file: {}", path.display()),
        })?;
        debug!("Deleted session {}", id);
        Ok(())
    }
}

fn read_session(path: &Path) -> Result<Session> {
    let content = std::fs::read_to_string(path).map_err(|e| ArchivistError::Io {
        source: e,
        context: format!("Failed to read session file: {}", path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| ArchivistError::Json {
        source: e,
        context: format!("Failed to deserialize session: {}", path.display()),
    })
}
