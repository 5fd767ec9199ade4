//! Configuration management for honghong-rs.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a partial file (or no file at all) is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::persona::PersonaMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-3-flash-preview".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TTSConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub default_voice: String,
    pub format: String,
    pub audio_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:5050/v1/audio/speech".into(),
            model: "tts-1".into(),
            api_key: None,
            default_voice: "zh-CN-XiaoxiaoNeural".into(),
            format: "mp3".into(),
            audio_dir: std::env::temp_dir().join("honghong-audio"),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub name: String,
    pub avatar: String,
    pub prompt: String,
    pub mode: PersonaMode,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "哄哄".into(),
            avatar: "🧸".into(),
            prompt: crate::persona::DEFAULT_PERSONA.into(),
            mode: PersonaMode::Prefix,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub min_messages: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { min_messages: 4 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub tts: TTSConfig,
    pub persona: PersonaConfig,
    pub summary: SummaryConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/honghong/config.yaml
    /// 3. /etc/honghong/config.yaml
    ///
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::load_file(path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/honghong/config.yaml")),
                Some(PathBuf::from("/etc/honghong/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// `GOOGLE_API_KEY` only fills a key the file left empty.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let file_key_missing = self
            .gemini
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty());
        if file_key_missing {
            if let Some(key) = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty()) {
                info!("Using Gemini API key from GOOGLE_API_KEY");
                self.gemini.api_key = Some(key);
            }
        }

        if let Some(endpoint) = lookup("HONGHONG_TTS_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            self.tts.endpoint = endpoint;
        }
    }
}
