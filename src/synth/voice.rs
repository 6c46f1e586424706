use std::sync::Arc;

use crate::synth::{buffer::SampleBuffer, message::VoiceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,    // Available for allocation
    Playing, // Reading through the buffer
}

/// One playing instance of a sample at a fixed playback rate.
///
/// Sample voices are one-shot: they free themselves at the end of the buffer
/// whether or not a stop ever arrives.
pub struct Voice {
    id: Option<VoiceId>,
    state: VoiceState,
    age: u64,
    buffer: Option<Arc<SampleBuffer>>,
    position: f64,
    step: f64,
}

impl Voice {
    pub fn new() -> Self {
        Self {
            id: None,
            state: VoiceState::Free,
            age: 0,
            buffer: None,
            position: 0.0,
            step: 0.0,
        }
    }

    /// `rate` is the pitch factor (1.0 = as recorded); the buffer's own
    /// sample rate is folded in against `output_rate`.
    pub fn start(
        &mut self,
        id: VoiceId,
        buffer: Arc<SampleBuffer>,
        rate: f32,
        output_rate: f32,
        age: u64,
    ) {
        self.step = rate as f64 * buffer.sample_rate() as f64 / output_rate as f64;
        self.id = Some(id);
        self.state = VoiceState::Playing;
        self.age = age;
        self.buffer = Some(buffer);
        self.position = 0.0;
    }

    /// Mix this voice into `out`. Once the voice runs off the end of its
    /// buffer it frees itself and hands the buffer back.
    pub fn render(&mut self, out: &mut [f32]) -> Option<Arc<SampleBuffer>> {
        let Some(buffer) = self.buffer.as_deref() else {
            return None;
        };

        let end = buffer.len() as f64;
        let mut finished = false;
        for o in out.iter_mut() {
            if self.position >= end {
                finished = true;
                break;
            }
            *o += buffer.sample_at(self.position);
            self.position += self.step;
        }

        if finished || self.position >= end {
            return self.free();
        }
        None
    }

    /// Returns the buffer the voice was reading, if any. Dropping it may
    /// free the sample data, so the audio thread must not.
    pub fn free(&mut self) -> Option<Arc<SampleBuffer>> {
        self.state = VoiceState::Free;
        self.id = None;
        self.position = 0.0;
        self.buffer.take()
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn id(&self) -> Option<VoiceId> {
        self.id
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}
