//! Audio file layout: `<root>/<session-id>/<turn>-<uuid>.<ext>`.
//!
//! Names are unique per session and per turn, so concurrent sessions that
//! share a directory never overwrite each other's replies.

use std::path::PathBuf;

use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
    extension: String,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn session_dir(&self, session: Uuid) -> PathBuf {
        self.root.join(session.to_string())
    }

    /// Fresh path for the reply at transcript index `turn`.
    pub fn allocate(&self, session: Uuid, turn: usize) -> PathBuf {
        self.session_dir(session)
            .join(format!("{turn:04}-{}.{}", Uuid::new_v4().simple(), self.extension))
    }

    /// Resolve a served file name, rejecting anything that could leave the
    /// session directory.
    pub fn resolve(&self, session: Uuid, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && !file_name.starts_with('.')
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        valid.then(|| self.session_dir(session).join(file_name))
    }

    /// Delete every audio file written for `session`.
    pub async fn remove_session(&self, session: Uuid) {
        let dir = self.session_dir(session);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Removed audio dir {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove audio dir {}: {e}", dir.display()),
        }
    }
}
