//! Audio output: runs a [`Sampler`] inside the cpal output callback.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream,
};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info, trace};

use super::AudioError;
use crate::{
    config::EngineConfig,
    synth::{message::SamplerMessage, SampleBuffer, Sampler, SamplerHandle},
    MAX_BLOCK_SIZE,
};

pub type OutputHandle = SamplerHandle<Producer<SamplerMessage>>;

/// A running output stream. Audio stops when this is dropped.
///
/// Buffers the sampler has finished with come back through `returned` and
/// must be released regularly with [`AudioOutput::release_returned`].
pub struct AudioOutput {
    _stream: Stream,
    returned: Consumer<Arc<SampleBuffer>>,
    sample_rate: f32,
    channels: usize,
}

impl AudioOutput {
    /// Open the default output device and start rendering. The returned
    /// handle is the engine's playback sink.
    pub fn start(config: &EngineConfig) -> Result<(Self, OutputHandle), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice("output"))?;
        let supported = device.default_output_config()?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "output device wants {:?}",
                supported.sample_format()
            )));
        }

        let sample_rate = supported.sample_rate().0 as f32;
        let channels = supported.channels() as usize;

        let (tx, rx) = RingBuffer::new(config.queue_capacity);
        let (mut return_tx, returned) =
            RingBuffer::<Arc<SampleBuffer>>::new(config.queue_capacity + config.max_voices);
        let mut sampler = Sampler::new(sample_rate, config.max_voices, rx);
        let mut block = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device.build_output_stream(
            &supported.into(),
            move |data: &mut [f32], _| {
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let block = &mut block[..frames];
                    sampler.render_block(block);
                    sampler.return_buffers(&mut return_tx);

                    // Copy to output (mono to all channels)
                    let out_off = frames_written * channels;
                    for (i, &s) in block.iter().enumerate() {
                        let s = s.clamp(-1.0, 1.0);
                        for ch in 0..channels {
                            data[out_off + i * channels + ch] = s;
                        }
                    }

                    frames_written += frames;
                }
            },
            |err| error!("audio output error: {err}"),
            None,
        )?;
        stream.play()?;

        info!(sample_rate, channels, "audio output started");
        Ok((
            Self {
                _stream: stream,
                returned,
                sample_rate,
                channels,
            },
            SamplerHandle::new(tx),
        ))
    }

    /// Drop the buffers the audio thread handed back. Returns how many.
    pub fn release_returned(&mut self) -> usize {
        let mut released = 0;
        while let Ok(buffer) = self.returned.pop() {
            drop(buffer);
            released += 1;
        }
        if released > 0 {
            trace!(released, "released sample buffers");
        }
        released
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
