pub mod config; // Startup settings for controllers and the engine
pub mod control; // Device abstraction and event normalization
pub mod io;
pub mod synth; // Voice management and sample playback

pub use config::Config;
pub use control::{ControlEvent, Controller, ControllerRegistry, MessageKind, Notification};
pub use synth::{SampleBuffer, VoiceEngine};

pub const MAX_BLOCK_SIZE: usize = 2048;
