//! Speech replies.
//!
//! Components:
//! - `http`: OpenAI-compatible `/v1/audio/speech` backend
//! - `store`: per-session audio file layout and cleanup
//! - `voices`: selectable voice catalog

pub mod http;
pub mod store;
pub mod voices;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("cannot reach TTS backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("TTS backend returned status {0}")]
    Status(u16),
    #[error("TTS backend returned no audio")]
    EmptyAudio,
    #[error("cannot write audio file: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and write the audio to `output`.
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError>;
}
