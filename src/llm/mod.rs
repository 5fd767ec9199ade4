//! Chat model seam.
//!
//! - `gemini`: Google Gemini `generateContent` REST client

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::ChatTurn;

/// Everything one model call needs. The history never contains `input`.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub api_key: &'a str,
    pub system_instruction: Option<&'a str>,
    pub history: &'a [ChatTurn],
    pub input: &'a str,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot reach model API: {0}")]
    Transport(reqwest::Error),
    #[error("model API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
    #[error("model returned no text")]
    Empty,
}

impl From<reqwest::Error> for ModelError {
    // Request URLs may carry credentials; never keep them in the message.
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url())
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one turn and wait for the complete reply.
    async fn generate(&self, request: ChatRequest<'_>) -> Result<String, ModelError>;
}
