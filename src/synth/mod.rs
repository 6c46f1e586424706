// Purpose: Voice management and sample playback
// The engine maps notes to voices; the sampler renders them on the audio thread

pub mod buffer;
pub mod engine;
pub mod message;
pub mod sampler;
pub mod voice;

pub use buffer::SampleBuffer;
pub use engine::{playback_rate, PlaybackSink, RetriggerPolicy, VoiceEngine};
pub use sampler::{Sampler, SamplerHandle};
