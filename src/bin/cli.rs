//! CLI binary for beckon.

use std::path::PathBuf;
use std::sync::Arc;

use beckon::audio::capture::CpalMicrophone;
use beckon::config::AssistantConfig;
use beckon::executor::Executor;
use beckon::listener::{Listener, ListenerEvents};
use beckon::orchestrator::Orchestrator;
use beckon::planner::Planner;
use beckon::speaker::Speaker;
use beckon::stt::WhisperApi;
use beckon::tts::SayTts;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Beckon: a hands-free voice assistant for the desktop.
#[derive(Parser)]
#[command(name = "beckon", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenAI API key (falls back to the environment).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start listening for the wake phrase.
    Run,

    /// List available audio input devices.
    Devices,

    /// Write the default configuration file and exit.
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing()?;

    let config = if let Some(ref path) = cli.config {
        AssistantConfig::from_file(path)?
    } else {
        let path = AssistantConfig::default_config_path();
        if path.exists() {
            AssistantConfig::from_file(&path)?
        } else {
            AssistantConfig::default()
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, cli.api_key).await,
        Command::Devices => list_devices(),
        Command::Init => init_config(config),
    }
}

/// Log to the console and to a daily-rolled file next to the config.
/// The returned guard flushes buffered log lines on drop.
fn init_tracing() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = AssistantConfig::default_config_path()
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "beckon.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Suppress noisy dependency logs by default; RUST_LOG overrides.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("beckon=info,chromiumoxide=warn,tungstenite=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    Ok(guard)
}

async fn run(config: AssistantConfig, api_key: Option<String>) -> anyhow::Result<()> {
    println!("Beckon v{}", env!("CARGO_PKG_VERSION"));

    let api_key = api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;

    let wake_phrase = config.listener.wake_phrase.clone();

    let speaker = Speaker::new(Arc::new(SayTts::new(config.speech.clone())));
    let planner = Planner::new(config.planner.clone(), api_key.clone());
    let executor = Executor::for_macos(config.browser.clone());

    let microphone = Arc::new(CpalMicrophone::new(config.audio.clone()));
    let recognizer = Arc::new(WhisperApi::new(config.stt.clone(), api_key));
    let events = Arc::new(SpokenAck {
        speaker: speaker.clone(),
    });
    let mut listener = Listener::spawn(config.listener.clone(), microphone, recognizer, events);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    println!("\nListening for \"{wake_phrase}\"... Press Ctrl+C to quit.\n");

    let mut orchestrator = Orchestrator::new(planner, executor, speaker);
    orchestrator.run(&mut listener, cancel).await;

    listener.shutdown().await;
    orchestrator.shutdown().await;
    Ok(())
}

/// Speaks a short prompt when the wake phrase arrives bare, so the
/// user knows the assistant is waiting for the command.
struct SpokenAck {
    speaker: Speaker,
}

impl ListenerEvents for SpokenAck {
    fn on_wake(&self) {
        self.speaker.speak_async("Yes?");
    }
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalMicrophone::list_input_devices()? {
        println!("  - {name}");
    }
    Ok(())
}

fn init_config(config: AssistantConfig) -> anyhow::Result<()> {
    let path = AssistantConfig::default_config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config.save_to_file(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
