//! HTTP text-to-speech backend.
//!
//! Speaks the OpenAI `/v1/audio/speech` contract, which Edge-TTS bridges
//! and most local TTS servers expose. The response body is the raw audio.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{SpeechError, SpeechSynthesizer};
use crate::config::TTSConfig;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct HttpSpeechSynthesizer {
    endpoint: String,
    model: String,
    format: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: &TTSConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            format: config.format.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SpeechError> {
        let t_start = Instant::now();
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: &self.format,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            warn!("TTS backend returned status {}", resp.status());
            return Err(SpeechError::Status(resp.status().as_u16()));
        }

        let audio = resp.bytes().await?;
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, &audio).await?;

        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;
        debug!("Wrote {} bytes to {}", audio.len(), output.display());
        info!(
            "Synthesized {} chars with {voice} ({latency_ms:.0}ms)",
            text.chars().count()
        );
        Ok(())
    }
}
