use std::{io::Read, path::Path};

use hound::{SampleFormat, WavReader};
use tracing::debug;

use super::AudioError;
use crate::synth::SampleBuffer;

/// Decode a WAV file into a mono sample buffer.
pub fn load_wav(path: impl AsRef<Path>) -> Result<SampleBuffer, AudioError> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let buffer = decode(reader)?;
    debug!(
        path = %path.display(),
        samples = buffer.len(),
        secs = buffer.duration_secs(),
        "loaded wav"
    );
    Ok(buffer)
}

/// Decode WAV data from any reader (in-memory assets, network bodies).
pub fn read_wav<R: Read>(source: R) -> Result<SampleBuffer, AudioError> {
    decode(WavReader::new(source)?)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<SampleBuffer, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat(
            "wav file declares zero channels".to_string(),
        ));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{bits}-bit {format:?}"
            )))
        }
    };

    Ok(SampleBuffer::from_interleaved(
        &interleaved,
        spec.channels as usize,
        spec.sample_rate as f32,
    ))
}
