//! honghong-rs: emotional-support companion chat service.

mod api;
mod companion;
mod config;
mod history;
mod llm;
mod message;
mod persona;
mod repl;
mod session;
mod summary;
mod tts;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::companion::Companion;
use crate::session::{Session, SessionRegistry};
use crate::tts::SpeechSynthesizer;

#[derive(Parser, Debug)]
#[command(name = "honghong-rs", about = "Companion chat with Gemini replies and speech")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API for the chat widget (default)
    Serve {
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat {
        /// Voice for spoken replies
        #[arg(long)]
        voice: Option<String>,

        /// Disable spoken replies
        #[arg(long)]
        no_speech: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("honghong-rs starting");

    let config = config::Config::load(args.config.as_deref());
    info!(
        "Config loaded: model={}, persona mode={:?}, speech={}",
        config.gemini.model, config.persona.mode, config.tts.enabled
    );
    if config.gemini.api_key.is_none() {
        tracing::warn!("No Gemini API key configured; sessions must supply their own");
    }

    let command = args.command.unwrap_or(Command::Serve { port: None });
    let speech_wanted = config.tts.enabled && !matches!(command, Command::Chat { no_speech: true, .. });

    let model = Arc::new(llm::gemini::GeminiClient::new(&config.gemini)?);
    let speech: Option<Arc<dyn SpeechSynthesizer>> = if speech_wanted {
        info!("Spoken replies via {}", config.tts.endpoint);
        Some(Arc::new(tts::http::HttpSpeechSynthesizer::new(&config.tts)?))
    } else {
        info!("Spoken replies disabled");
        None
    };
    let companion = Companion::new(&config, model, speech);

    match command {
        Command::Serve { port } => {
            let addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));
            let state = api::ApiState {
                companion: Arc::new(companion),
                sessions: Arc::new(SessionRegistry::new()),
            };
            api::serve(state, &addr).await?;
        }
        Command::Chat { voice, .. } => {
            let session = Session::new(companion.session_settings(voice, None));
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            repl::run(&companion, session, input, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}
