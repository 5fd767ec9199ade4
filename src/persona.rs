//! Persona instruction and how it reaches the model.

use serde::Deserialize;

use crate::config::PersonaConfig;

pub const DEFAULT_PERSONA: &str = "你叫哄哄，是一个超级温柔、有同理心的情感支持AI。你的任务是无条件站在用户这边，倾听他们的烦恼，并用温暖、可爱的语气安慰他们。多使用“乖乖”、“抱抱”、“别怕”等词汇。回复不要太长，要像朋友聊天一样自然。";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaMode {
    /// Prepend the persona to every outbound user message.
    Prefix,
    /// Send the persona once as the model's system instruction.
    System,
}

#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub avatar: String,
    pub prompt: String,
    pub mode: PersonaMode,
}

impl Persona {
    pub fn from_config(config: &PersonaConfig) -> Self {
        Self {
            name: config.name.clone(),
            avatar: config.avatar.clone(),
            prompt: config.prompt.clone(),
            mode: config.mode,
        }
    }

    /// Text sent as the new turn for `input`.
    pub fn outbound(&self, input: &str) -> String {
        match self.mode {
            PersonaMode::Prefix => format!("{}\n\n用户说：{input}", self.prompt),
            PersonaMode::System => input.to_string(),
        }
    }

    /// Text sent for a turn the app writes itself rather than the user.
    /// Prefix mode keeps the persona but drops the `用户说：` label.
    pub fn instruction(&self, text: &str) -> String {
        match self.mode {
            PersonaMode::Prefix => format!("{}\n\n{text}", self.prompt),
            PersonaMode::System => text.to_string(),
        }
    }

    pub fn system_instruction(&self) -> Option<&str> {
        match self.mode {
            PersonaMode::Prefix => None,
            PersonaMode::System => Some(&self.prompt),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::from_config(&PersonaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mode_wraps_input() {
        let persona = Persona::default();
        let text = persona.outbound("我今天很难过");
        assert!(text.starts_with(DEFAULT_PERSONA));
        assert!(text.ends_with("\n\n用户说：我今天很难过"));
        assert!(persona.system_instruction().is_none());
    }

    #[test]
    fn test_system_mode_passes_input_through() {
        let persona = Persona {
            mode: PersonaMode::System,
            ..Persona::default()
        };
        assert_eq!(persona.outbound("hello"), "hello");
        assert_eq!(persona.system_instruction(), Some(DEFAULT_PERSONA));
        assert_eq!(persona.instruction("calm down"), "calm down");
    }

    #[test]
    fn test_instruction_is_not_labelled_as_user_speech() {
        let persona = Persona::default();
        let text = persona.instruction("请安慰用户");
        assert!(text.starts_with(DEFAULT_PERSONA));
        assert!(text.ends_with("\n\n请安慰用户"));
        assert!(!text.contains("用户说："));
    }
}
