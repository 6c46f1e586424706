//! Capture from the default input device into a [`SampleBuffer`].
//!
//! The input callback only copies samples into a ring buffer; the owner
//! calls [`Recorder::drain`] regularly to move them into the take, and
//! [`Recorder::finish`] to close the stream and get the buffer.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info};

use super::AudioError;
use crate::synth::SampleBuffer;

/// Seconds of audio the ring buffer can hold between drains.
const RING_SECONDS: usize = 2;

pub struct Recorder {
    stream: Stream,
    rx: Consumer<f32>,
    take: Vec<f32>,
    sample_rate: f32,
    channels: usize,
}

impl Recorder {
    pub fn start() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDevice("input"))?;
        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let sample_rate = config.sample_rate.0 as f32;
        let channels = config.channels as usize;
        let capacity = config.sample_rate.0 as usize * channels * RING_SECONDS;
        let (tx, rx) = RingBuffer::new(capacity);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, tx)?,
            other => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "input device delivers {other:?}"
                )))
            }
        };
        stream.play()?;

        info!(sample_rate, channels, "recording started");
        Ok(Self {
            stream,
            rx,
            take: Vec::new(),
            sample_rate,
            channels,
        })
    }

    /// Move captured samples out of the ring buffer. Returns how many.
    pub fn drain(&mut self) -> usize {
        let available = self.rx.slots();
        let Ok(chunk) = self.rx.read_chunk(available) else {
            return 0;
        };
        let (first, second) = chunk.as_slices();
        self.take.extend_from_slice(first);
        self.take.extend_from_slice(second);
        chunk.commit_all();
        available
    }

    pub fn recorded_secs(&self) -> f32 {
        self.take.len() as f32 / (self.sample_rate * self.channels as f32)
    }

    /// Stop capturing and return the take as a mono buffer.
    pub fn finish(mut self) -> SampleBuffer {
        if let Err(err) = self.stream.pause() {
            error!("failed to pause input stream: {err}");
        }
        self.drain();
        info!(secs = self.recorded_secs(), "recording finished");
        SampleBuffer::from_interleaved(&self.take, self.channels, self.sample_rate)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut tx: Producer<f32>,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for &sample in data {
                // A full ring drops input; the owner stopped draining.
                if tx.push(f32::from_sample(sample)).is_err() {
                    break;
                }
            }
        },
        |err| error!("audio input error: {err}"),
        None,
    )?;
    Ok(stream)
}
