//! Transcript records shared by the session log, the history adapter and the API.

use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name in the Gemini `contents` vocabulary.
    pub fn remote(self) -> RemoteRole {
        match self {
            Self::User => RemoteRole::User,
            Self::Assistant => RemoteRole::Model,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteRole {
    User,
    Model,
}

impl RemoteRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One entry of the replayed history sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: RemoteRole,
    pub text: String,
}

/// A single transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub is_emergency: bool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().to_rfc3339(),
            audio_path: None,
            duration_seconds: None,
            is_emergency: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_duration(mut self, seconds: Option<f64>) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_audio(mut self, path: Option<PathBuf>) -> Self {
        self.audio_path = path;
        self
    }

    pub fn emergency(mut self) -> Self {
        self.is_emergency = true;
        self
    }

    /// Caption shown under a reply, e.g. "⏱️ 1.23s".
    pub fn latency_caption(&self) -> Option<String> {
        self.duration_seconds.map(|s| format!("⏱️ {s:.2}s"))
    }
}
