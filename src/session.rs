//! Per-user session state.
//!
//! A session owns an append-only transcript and its settings. The registry
//! hands out one `Mutex` per session, so a turn holds exclusive access to
//! its transcript from start to finish.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::message::Message;

/// Append-only, chronological transcript.
#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    messages: Vec<Message>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the index of the new entry.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub voice: String,
    /// Overrides the configured Gemini key for this session only.
    pub api_key: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub settings: SessionSettings,
    pub log: SessionLog,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            log: SessionLog::new(),
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// All live sessions of a server process.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, settings: SessionSettings) -> (Uuid, SharedSession) {
        let session = Session::new(settings);
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        info!("Session {id} opened");
        (id, shared)
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            info!("Session {id} closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            voice: "zh-CN-XiaoxiaoNeural".into(),
            api_key: None,
        }
    }

    #[test]
    fn test_log_appends_in_order() {
        let mut log = SessionLog::new();
        assert!(log.is_empty());
        assert_eq!(log.append(Message::user("a")), 0);
        assert_eq!(log.append(Message::assistant("b")), 1);

        let snapshot = log.snapshot();
        log.append(Message::user("c"));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.messages()[2].content, "c");
    }

    #[tokio::test]
    async fn test_registry_isolates_sessions() {
        let registry = SessionRegistry::new();
        let (a, shared_a) = registry.create(settings()).await;
        let (b, _) = registry.create(settings()).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);

        shared_a.lock().await.log.append(Message::user("only in a"));
        let session_b = registry.get(b).await.unwrap();
        assert!(session_b.lock().await.log.is_empty());

        assert!(registry.remove(a).await.is_some());
        assert!(registry.get(a).await.is_none());
        assert!(registry.remove(a).await.is_none());
        assert_eq!(registry.len().await, 1);
    }
}
