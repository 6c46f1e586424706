// Purpose - external audio interfaces: files, input capture, output stream

#[cfg(feature = "rtrb")]
pub mod output;
#[cfg(feature = "rtrb")]
pub mod recorder;
pub mod wav;

pub use wav::{load_wav, read_wav};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("no default {0} device available")]
    NoDevice(&'static str),

    #[error("failed to fetch default stream config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}
