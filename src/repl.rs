//! Terminal chat: one in-process session driven from stdin.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::companion::{Companion, Turn, TurnError};
use crate::message::Message;
use crate::session::Session;
use crate::tts::voices::{label_for, VOICES};

const HELP: &str = "命令: /panic 紧急求助 · /summary 心情报告 · /voice <id> 换声音 · /voices 声音列表 · /quit 退出";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Say(&'a str),
    Panic,
    Summary,
    Voice(&'a str),
    Voices,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line);
    };
    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match name {
        "panic" | "sos" => Command::Panic,
        "summary" => Command::Summary,
        "voice" => Command::Voice(arg.trim()),
        "voices" => Command::Voices,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

fn render(name: &str, avatar: &str, message: &Message) -> String {
    let mut out = if message.is_emergency {
        format!("🚨 {avatar} {name}: {}", message.content)
    } else {
        format!("{avatar} {name}: {}", message.content)
    };
    if let Some(caption) = message.latency_caption() {
        out.push_str(&format!("\n   {caption}"));
    }
    if let Some(path) = &message.audio_path {
        out.push_str(&format!("\n   🔊 {}", path.display()));
    }
    out
}

/// Chat over `input` and `output` until end of input or `/quit`. The session's
/// audio is removed however the loop ends.
pub async fn run<R, W>(companion: &Companion, mut session: Session, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = chat_loop(companion, &mut session, input, &mut output).await;
    debug!("Chat ended after {} messages", session.log.len());
    companion.audio_store().remove_session(session.id).await;
    result
}

async fn chat_loop<R, W>(companion: &Companion, session: &mut Session, input: R, out: &mut W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let persona = companion.persona().clone();
    let mut lines = input.lines();

    out.write_all(format!("{} {} - 你的专属情绪搭档\n{HELP}\n", persona.avatar, persona.name).as_bytes())
        .await?;
    if !companion.has_default_key() && session.settings.api_key.is_none() {
        out.write_all("⚠️ 请设置 GOOGLE_API_KEY 才能启动哄哄哦\n".as_bytes()).await?;
    }

    loop {
        out.write_all("> ".as_bytes()).await?;
        out.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let text = match parse(&line) {
            Command::Say(text) => match companion.submit(session, text).await {
                Ok(Turn { reply, .. }) => render(&persona.name, &persona.avatar, &reply),
                Err(TurnError::EmptyInput) => continue,
            },
            Command::Panic => {
                let turn = companion.panic(session).await;
                format!(
                    "{}\n{}",
                    turn.prompt.content,
                    render(&persona.name, &persona.avatar, &turn.reply)
                )
            }
            Command::Summary => companion.summarize(session).await.text().to_string(),
            Command::Voice("") => format!("当前声音: {}", session.settings.voice),
            Command::Voice(voice) => {
                session.settings.voice = voice.to_string();
                format!("已切换声音: {}", label_for(voice).unwrap_or(voice))
            }
            Command::Voices => VOICES
                .iter()
                .map(|v| format!("{} {}", v.id, v.label))
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Help => HELP.to_string(),
            Command::Quit => break,
            Command::Unknown(name) => format!("未知命令 /{name}\n{HELP}"),
        };
        out.write_all(format!("{text}\n").as_bytes()).await?;
    }
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::tests::{test_config, StubModel, StubSpeech};
    use tokio::io::BufReader;

    fn chat_companion(audio_dir: &std::path::Path) -> Companion {
        Companion::new(
            &test_config(audio_dir),
            StubModel::replying("抱抱"),
            Some(StubSpeech::working()),
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("  我好累 "), Command::Say("我好累"));
        assert_eq!(parse("/panic"), Command::Panic);
        assert_eq!(parse("/summary"), Command::Summary);
        assert_eq!(parse("/voice zh-CN-YunxiNeural"), Command::Voice("zh-CN-YunxiNeural"));
        assert_eq!(parse("/voice"), Command::Voice(""));
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/dance"), Command::Unknown("dance"));
        assert_eq!(parse(""), Command::Say(""));
    }

    #[test]
    fn test_render_shows_caption_and_emergency() {
        let message = Message::assistant("我在").with_duration(Some(0.5)).emergency();
        let out = render("哄哄", "🧸", &message);
        assert!(out.starts_with("🚨 🧸 哄哄: 我在"));
        assert!(out.contains("⏱️ 0.50s"));
    }

    #[tokio::test]
    async fn test_run_chats_then_removes_audio() {
        let dir = tempfile::tempdir().unwrap();
        let companion = chat_companion(dir.path());
        let session = Session::new(companion.session_settings(None, None));
        let audio_dir = companion.audio_store().session_dir(session.id);
        let mut output = Vec::new();

        let input = BufReader::new("我好累\n/quit\n".as_bytes());
        run(&companion, session, input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("🧸 哄哄: 抱抱"));
        assert!(!audio_dir.exists());
    }

    #[tokio::test]
    async fn test_run_removes_audio_when_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let companion = chat_companion(dir.path());
        let session = Session::new(companion.session_settings(None, None));
        let audio_dir = companion.audio_store().session_dir(session.id);
        std::fs::create_dir_all(&audio_dir).unwrap();

        // Writes to a duplex stream fail once the reading end is gone.
        let (closed, output) = tokio::io::duplex(64);
        drop(closed);

        let result = run(&companion, session, BufReader::new(&b"/quit\n"[..]), output).await;

        assert!(result.is_err());
        assert!(!audio_dir.exists());
    }
}
