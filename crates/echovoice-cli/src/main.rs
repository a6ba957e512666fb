use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use echovoice_foundation::RecorderError;
use echovoice_session::{RecorderConfig, RecorderListener, VoiceRecorder};
use echovoice_store::{RetentionConfig, StoredClip};
use echovoice_vad::VadMode;

/// Hands-free voice clip recorder. Listens on the default microphone,
/// cuts confirmed utterances into WAV clips and drops them in a
/// retention-managed directory.
#[derive(Parser, Debug)]
#[command(name = "echovoice", version, about)]
struct Args {
    /// Directory that receives the recorded clips.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Input device name; defaults to the system microphone.
    #[arg(long)]
    device: Option<String>,

    /// Segmentation preset.
    #[arg(long, value_enum, default_value_t = Preset::Patient)]
    preset: Preset,

    /// Classifier aggressiveness.
    #[arg(long, value_enum, default_value_t = Mode::Normal)]
    mode: Mode,

    /// Maximum number of clips kept on disk.
    #[arg(long)]
    max_clips: Option<usize>,

    /// Maximum clip age in seconds before eviction.
    #[arg(long)]
    max_age_secs: Option<u64>,

    /// Stop after this many seconds; runs until Ctrl-C when omitted.
    #[arg(long)]
    duration: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Preset {
    /// Two seconds of silence close an utterance.
    Patient,
    /// 800 ms of silence close an utterance.
    Responsive,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Normal,
    Aggressive,
    VeryAggressive,
}

impl From<Mode> for VadMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => VadMode::Normal,
            Mode::Aggressive => VadMode::Aggressive,
            Mode::VeryAggressive => VadMode::VeryAggressive,
        }
    }
}

struct ConsoleListener;

impl RecorderListener for ConsoleListener {
    fn on_ready(&self) {
        println!("listening... speak to record, Ctrl-C to quit");
    }

    fn on_recording_start(&self) {
        println!("* recording");
    }

    fn on_recording_complete(&self, clip: &StoredClip) {
        println!("  saved {} ({} bytes)", clip.path.display(), clip.size_bytes);
    }

    fn on_error(&self, error: &RecorderError) {
        eprintln!("recorder error: {error}");
    }
}

fn build_config(args: &Args) -> RecorderConfig {
    let mut config = match args.preset {
        Preset::Patient => RecorderConfig::patient(),
        Preset::Responsive => RecorderConfig::responsive(),
    };
    config.vad.mode = args.mode.into();
    config.device = args.device.clone();
    if let Some(dir) = &args.dir {
        config.store_dir = dir.clone();
    }
    let defaults = RetentionConfig::default();
    config.retention = RetentionConfig {
        max_file_count: args.max_clips.unwrap_or(defaults.max_file_count),
        max_file_age_ms: args
            .max_age_secs
            .map(|s| s * 1000)
            .unwrap_or(defaults.max_file_age_ms),
    };
    config
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = build_config(&args);
    info!(
        dir = %config.store_dir.display(),
        silence_ms = config.vad.silence_duration_ms,
        "starting echovoice"
    );

    let mut recorder = VoiceRecorder::new(config);
    recorder.set_listener(Arc::new(ConsoleListener));

    recorder
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("failed to start listening session")?;

    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                r = tokio::signal::ctrl_c() => { r.context("failed to wait for Ctrl-C")?; }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for Ctrl-C")?;
        }
    }

    info!("shutting down");
    recorder.release().await;
    Ok(())
}
