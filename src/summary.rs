//! Mood report prompt.
//!
//! The transcript is flattened into speaker-labelled lines and embedded in a
//! one-off prompt. The model's answer is shown verbatim; its sections are
//! never parsed.

use crate::message::{Message, Role};

const REPORT_PROMPT: &str = r#"下面是用户和情感陪伴AI「{name}」的一段聊天记录。请根据记录为用户写一份简短的心情小报告，严格使用以下格式：

### 🌡️ 心情指数
（1-10 分，并用一句话说明）

### 💭 主要情绪
（列出 1-3 个情绪关键词）

### 🔑 烦恼关键词
（列出让用户困扰的事情）

### 🧸 {name}的小建议
（2-3 条温柔、具体、可执行的建议）

聊天记录：
{transcript}
"#;

pub const TOO_SHORT_WARNING: &str = "聊得还不够多哦，再多和我说几句，我才能帮你总结心情～";

/// One line per message: `用户: …` / `{assistant_name}: …`.
pub fn serialize_transcript(messages: &[Message], assistant_name: &str) -> String {
    messages
        .iter()
        .map(|m| match m.role {
            Role::User => format!("用户: {}", m.content),
            Role::Assistant => format!("{assistant_name}: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(messages: &[Message], assistant_name: &str) -> String {
    REPORT_PROMPT
        .replace("{name}", assistant_name)
        .replace("{transcript}", &serialize_transcript(messages, assistant_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_lines_are_labelled() {
        let messages = vec![Message::user("我今天很难过"), Message::assistant("抱抱")];
        assert_eq!(
            serialize_transcript(&messages, "哄哄"),
            "用户: 我今天很难过\n哄哄: 抱抱"
        );
    }

    #[test]
    fn test_prompt_embeds_sections_and_transcript() {
        let messages = vec![Message::user("考试没考好")];
        let prompt = build_prompt(&messages, "哄哄");
        assert!(prompt.contains("### 🌡️ 心情指数"));
        assert!(prompt.contains("### 🧸 哄哄的小建议"));
        assert!(prompt.ends_with("用户: 考试没考好\n"));
        assert!(!prompt.contains("{name}"));
    }
}
