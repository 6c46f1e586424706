//! usbtronica - play a sample from the computer keyboard or any MIDI device
//!
//! Run with: cargo run -- --sample path/to/sound.wav

mod app;
mod input;
mod ui;

use std::{fs::File, path::PathBuf, sync::Mutex, time::Duration};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use app::App;
use usbtronica::{
    config::{EngineConfig, KeyboardConfig, MidiConfig},
    synth::RetriggerPolicy,
    Config,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Retrigger {
    /// Let the previous voice ring out
    Abandon,
    /// Cut the previous voice
    Stop,
}

impl From<Retrigger> for RetriggerPolicy {
    fn from(value: Retrigger) -> Self {
        match value {
            Retrigger::Abandon => RetriggerPolicy::Abandon,
            Retrigger::Stop => RetriggerPolicy::Stop,
        }
    }
}

/// Pitch-shifting sample player for keyboards and MIDI controllers
#[derive(Parser)]
#[command(name = "usbtronica")]
struct Args {
    /// WAV file to load as the initial sample
    #[arg(short, long)]
    sample: Option<PathBuf>,

    /// Size of the voice pool
    #[arg(long, default_value_t = 32)]
    voices: usize,

    /// What a repeated note does to the voice still playing
    #[arg(long, value_enum, default_value_t = Retrigger::Abandon)]
    retrigger: Retrigger,

    /// Delay before the computer keyboard reports as connected (ms)
    #[arg(long, default_value_t = 100)]
    settle_ms: u64,

    /// Release a key after this long without a repeat, on terminals that
    /// cannot report key releases (ms)
    #[arg(long, default_value_t = 600)]
    hold_timeout_ms: u64,

    /// Client name announced to the system MIDI service
    #[arg(long, default_value = "usbtronica")]
    midi_client: String,

    /// Log level filter
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Where to write logs (the terminal belongs to the UI)
    #[arg(long, default_value = "usbtronica.log")]
    log_file: PathBuf,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_file = File::create(&args.log_file)
        .wrap_err_with(|| format!("failed to create log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let config = Config::default()
        .keyboard(KeyboardConfig::default().settle(Duration::from_millis(args.settle_ms)))
        .engine(
            EngineConfig::default()
                .max_voices(args.voices)
                .retrigger(args.retrigger.into()),
        )
        .midi(MidiConfig::default().client_name(args.midi_client));

    App::new(config)
        .sample(args.sample)
        .hold_timeout(Duration::from_millis(args.hold_timeout_ms))
        .run()
}
