/// Decoded mono PCM that every voice plays back from.
///
/// Buffers are immutable once built and shared behind an `Arc`; replacing the
/// engine's buffer swaps the whole `Arc`, so a voice never sees a partially
/// written sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: f32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1.0),
        }
    }

    /// Mix interleaved frames down to mono by averaging the channels.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: f32) -> Self {
        let channels = channels.max(1);
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }

    /// Linearly interpolated sample at a fractional position.
    /// Positions outside the buffer read as silence.
    #[inline]
    pub fn sample_at(&self, position: f64) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let index = position as usize;
        let Some(&a) = self.samples.get(index) else {
            return 0.0;
        };
        let b = self.samples.get(index + 1).copied().unwrap_or(0.0);
        let frac = (position - index as f64) as f32;
        a + (b - a) * frac
    }
}
