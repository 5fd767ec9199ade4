//! Turn engine: the one call path shared by normal turns, the emergency
//! shortcut and the mood summary.
//!
//! Remote failures never leave this module as errors. They are logged and
//! turned into reply text that is appended to the transcript like any other
//! answer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::history::{adapt, split_pending};
use crate::llm::{ChatModel, ChatRequest};
use crate::message::{ChatTurn, Message};
use crate::persona::Persona;
use crate::session::{Session, SessionSettings};
use crate::summary;
use crate::tts::store::AudioStore;
use crate::tts::SpeechSynthesizer;

pub const MISSING_KEY_REPLY: &str = "请先配置 API Key 也就是你的大脑链接密码哦～";
pub const UNAVAILABLE_REPLY: &str = "哄哄的大脑连接断开啦，请稍后再试试～";
pub const EMERGENCY_MARKER: &str = "🆘 我现在很难受，需要帮助";

const EMERGENCY_PROMPT: &str = "用户刚刚按下了紧急求助按钮，情绪可能非常崩溃。请立刻用最温柔、最坚定的语气安抚用户：先带着用户做几次缓慢的深呼吸，再告诉用户你一直都在。如果用户有伤害自己的念头，请温柔地建议用户马上联系身边信任的人或拨打当地的心理援助热线。";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyInput,
}

/// Messages appended by one turn, in transcript order.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub prompt: Message,
    pub reply: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum SummaryOutcome {
    Report(String),
    TooShort,
    MissingKey,
    Unavailable,
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Report(text) => text,
            Self::TooShort => summary::TOO_SHORT_WARNING,
            Self::MissingKey => MISSING_KEY_REPLY,
            Self::Unavailable => UNAVAILABLE_REPLY,
        }
    }
}

struct Reply {
    text: String,
    duration_seconds: Option<f64>,
    succeeded: bool,
}

pub struct Companion {
    model: Arc<dyn ChatModel>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    audio: AudioStore,
    persona: Persona,
    default_api_key: Option<String>,
    default_voice: String,
    summary_min_messages: usize,
}

impl Companion {
    pub fn new(
        config: &Config,
        model: Arc<dyn ChatModel>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            model,
            speech,
            audio: AudioStore::new(&config.tts.audio_dir, &config.tts.format),
            persona: Persona::from_config(&config.persona),
            default_api_key: non_empty(config.gemini.api_key.as_deref()),
            default_voice: config.tts.default_voice.clone(),
            summary_min_messages: config.summary.min_messages,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech.is_some()
    }

    pub fn audio_store(&self) -> &AudioStore {
        &self.audio
    }

    pub fn has_default_key(&self) -> bool {
        self.default_api_key.is_some()
    }

    /// Settings for a new session; blank values fall back to the defaults.
    pub fn session_settings(&self, voice: Option<String>, api_key: Option<String>) -> SessionSettings {
        SessionSettings {
            voice: voice
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| self.default_voice.clone()),
            api_key: non_empty(api_key.as_deref()),
        }
    }

    /// Handle one typed user message.
    pub async fn submit(&self, session: &mut Session, input: &str) -> Result<Turn, TurnError> {
        if input.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let index = session.log.append(Message::user(input));
        let (history, _pending) = split_pending(session.log.messages());
        let turns = adapt(history);

        let api_key = self.api_key_for(session);
        let outbound = self.persona.outbound(input);
        let reply = self.generate(api_key.as_deref(), &turns, &outbound).await;
        let reply = self.finish(session, api_key.is_some(), reply, false).await;

        Ok(Turn {
            prompt: session.log.messages()[index].clone(),
            reply,
        })
    }

    /// Emergency shortcut: append the marker, then answer a fixed distress
    /// prompt with the whole transcript (marker included) as history.
    pub async fn panic(&self, session: &mut Session) -> Turn {
        info!("Session {}: emergency shortcut triggered", session.id);
        let index = session.log.append(Message::user(EMERGENCY_MARKER));
        let turns = adapt(session.log.messages());

        let api_key = self.api_key_for(session);
        let outbound = self.persona.instruction(EMERGENCY_PROMPT);
        let reply = self.generate(api_key.as_deref(), &turns, &outbound).await;
        let reply = self.finish(session, api_key.is_some(), reply, true).await;

        Turn {
            prompt: session.log.messages()[index].clone(),
            reply,
        }
    }

    /// Mood report over the whole transcript, from a fresh history-less call.
    pub async fn summarize(&self, session: &Session) -> SummaryOutcome {
        let messages = session.log.messages();
        if messages.len() < self.summary_min_messages {
            return SummaryOutcome::TooShort;
        }
        let Some(api_key) = self.api_key_for(session) else {
            return SummaryOutcome::MissingKey;
        };

        let prompt = summary::build_prompt(messages, &self.persona.name);
        let request = ChatRequest {
            api_key: &api_key,
            system_instruction: None,
            history: &[],
            input: &prompt,
        };
        match self.model.generate(request).await {
            Ok(report) => {
                info!("Session {}: mood report generated", session.id);
                SummaryOutcome::Report(report)
            }
            Err(e) => {
                warn!("Mood report failed: {e}");
                SummaryOutcome::Unavailable
            }
        }
    }

    fn api_key_for(&self, session: &Session) -> Option<String> {
        non_empty(session.settings.api_key.as_deref()).or_else(|| self.default_api_key.clone())
    }

    /// `outbound` is the new turn exactly as the model should see it.
    async fn generate(&self, api_key: Option<&str>, history: &[ChatTurn], outbound: &str) -> Reply {
        let Some(api_key) = api_key else {
            return Reply {
                text: MISSING_KEY_REPLY.to_string(),
                duration_seconds: None,
                succeeded: false,
            };
        };

        let request = ChatRequest {
            api_key,
            system_instruction: self.persona.system_instruction(),
            history,
            input: outbound,
        };

        let t_start = Instant::now();
        let result = self.model.generate(request).await;
        let elapsed = t_start.elapsed().as_secs_f64();

        match result {
            Ok(text) => {
                info!("Reply generated in {elapsed:.2}s ({} history turns)", history.len());
                Reply {
                    text,
                    duration_seconds: Some(elapsed),
                    succeeded: true,
                }
            }
            Err(e) => {
                warn!("Reply generation failed after {elapsed:.2}s: {e}");
                Reply {
                    text: UNAVAILABLE_REPLY.to_string(),
                    duration_seconds: Some(elapsed),
                    succeeded: false,
                }
            }
        }
    }

    /// Speak a successful reply, then append it to the transcript.
    async fn finish(&self, session: &mut Session, has_key: bool, reply: Reply, emergency: bool) -> Message {
        let audio = if reply.succeeded && has_key {
            self.speak(session, &reply.text).await
        } else {
            None
        };

        let mut message = Message::assistant(reply.text)
            .with_duration(reply.duration_seconds)
            .with_audio(audio);
        if emergency {
            message = message.emergency();
        }

        let index = session.log.append(message);
        session.log.messages()[index].clone()
    }

    async fn speak(&self, session: &Session, text: &str) -> Option<PathBuf> {
        let speech = self.speech.as_ref()?;
        let path = self.audio.allocate(session.id, session.log.len());
        match speech.synthesize(text, &session.settings.voice, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Speech synthesis failed, reply kept without audio: {e}");
                None
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
