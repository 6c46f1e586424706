use std::sync::Arc;

use tracing::warn;

use crate::synth::{
    buffer::SampleBuffer,
    engine::PlaybackSink,
    message::{BufferReturn, MessageReceiver, MessageSender, SamplerMessage, VoiceId},
    voice::Voice,
};

/// Polyphonic sample player, owned by the audio thread.
///
/// Commands arrive through `rx` and are applied at the top of every block,
/// so starts and stops land with block granularity.
///
/// The sampler never drops a buffer itself. Buffers released by voices are
/// parked in `retired` and handed off with [`Sampler::return_buffers`].
pub struct Sampler<R: MessageReceiver> {
    voices: Vec<Voice>,
    rx: R,
    retired: Vec<Arc<SampleBuffer>>,
    output_rate: f32,
    frame_counter: u64,
}

impl<R: MessageReceiver> Sampler<R> {
    pub fn new(output_rate: f32, max_voices: usize, rx: R) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: (0..max_voices).map(|_| Voice::new()).collect(),
            rx,
            retired: Vec::with_capacity(max_voices * 4),
            output_rate,
            frame_counter: 0,
        }
    }

    pub fn render_block(&mut self, out: &mut [f32]) {
        while let Some(msg) = self.rx.pop() {
            self.apply(msg);
        }

        out.fill(0.0);
        for voice in &mut self.voices {
            if !voice.is_free() {
                self.retired.extend(voice.render(out));
            }
        }

        self.frame_counter += out.len() as u64;
    }

    pub fn apply(&mut self, msg: SamplerMessage) {
        match msg {
            SamplerMessage::Start { id, buffer, rate } => {
                // Without a buffer the voice exists only on the control side.
                let buffer = match buffer {
                    Some(buffer) if !buffer.is_empty() => buffer,
                    Some(empty) => {
                        self.retired.push(empty);
                        return;
                    }
                    None => return,
                };
                let age = self.frame_counter;
                let output_rate = self.output_rate;
                let idx = self.allocate_voice();
                let voice = &mut self.voices[idx];
                self.retired.extend(voice.free());
                voice.start(id, buffer, rate, output_rate, age);
            }
            SamplerMessage::Stop { id } => {
                if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == Some(id)) {
                    self.retired.extend(voice.free());
                }
            }
            SamplerMessage::StopAll => {
                for voice in &mut self.voices {
                    self.retired.extend(voice.free());
                }
            }
        }
    }

    /// Hand released buffers to `to`. Whatever does not fit stays parked for
    /// the next call.
    pub fn return_buffers(&mut self, to: &mut impl BufferReturn) {
        while let Some(buffer) = self.retired.pop() {
            if let Err(buffer) = to.give_back(buffer) {
                self.retired.push(buffer);
                break;
            }
        }
    }

    /// Buffers released but not yet returned.
    pub fn retired_buffers(&self) -> usize {
        self.retired.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }

    /// Index of a free voice, or of the oldest playing one when all are busy.
    fn allocate_voice(&self) -> usize {
        match self.voices.iter().position(|v| v.is_free()) {
            Some(idx) => idx,
            None => self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.age())
                .map(|(idx, _)| idx)
                .unwrap_or(0),
        }
    }
}

/// Control-side end of the sampler queue. This is the engine's audio sink.
pub struct SamplerHandle<S: MessageSender> {
    tx: S,
    next_id: u64,
}

impl<S: MessageSender> SamplerHandle<S> {
    pub fn new(tx: S) -> Self {
        Self { tx, next_id: 0 }
    }

    pub fn stop_all(&mut self) {
        self.send(SamplerMessage::StopAll);
    }

    pub fn sender(&self) -> &S {
        &self.tx
    }

    fn send(&mut self, msg: SamplerMessage) {
        if !self.tx.push(msg) {
            warn!("sampler queue full, message dropped");
        }
    }
}

impl<S: MessageSender> PlaybackSink for SamplerHandle<S> {
    type Voice = VoiceId;

    fn start(&mut self, buffer: Option<Arc<SampleBuffer>>, rate: f32) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.send(SamplerMessage::Start { id, buffer, rate });
        id
    }

    fn stop(&mut self, voice: VoiceId) {
        self.send(SamplerMessage::Stop { id: voice });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn ramp(len: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(
            (0..len).map(|i| i as f32 / len as f32).collect(),
            48_000.0,
        ))
    }

    fn start(id: u64, buffer: Option<Arc<SampleBuffer>>) -> SamplerMessage {
        SamplerMessage::Start {
            id: VoiceId(id),
            buffer,
            rate: 1.0,
        }
    }

    #[test]
    fn renders_silence_when_idle() {
        let mut sampler = Sampler::new(48_000.0, 4, VecDeque::new());
        let mut out = vec![1.0f32; 64];
        sampler.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn start_then_stop() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 1024], 48_000.0));
        let queue = VecDeque::from(vec![start(1, Some(buffer))]);
        let mut sampler = Sampler::new(48_000.0, 4, queue);

        let mut out = vec![0.0f32; 64];
        sampler.render_block(&mut out);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(sampler.active_voices(), 1);

        sampler.apply(SamplerMessage::Stop { id: VoiceId(1) });
        sampler.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(sampler.active_voices(), 0);
    }

    #[test]
    fn voices_mix_additively() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.25; 256], 48_000.0));
        let queue = VecDeque::from(vec![start(1, Some(buffer.clone())), start(2, Some(buffer))]);
        let mut sampler = Sampler::new(48_000.0, 4, queue);

        let mut out = vec![0.0f32; 32];
        sampler.render_block(&mut out);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn start_without_buffer_is_silent() {
        let queue = VecDeque::from(vec![start(1, None)]);
        let mut sampler = Sampler::new(48_000.0, 4, queue);

        let mut out = vec![0.0f32; 32];
        sampler.render_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(sampler.active_voices(), 0);
    }

    #[test]
    fn unknown_stop_is_ignored() {
        let queue = VecDeque::from(vec![start(1, Some(ramp(512)))]);
        let mut sampler = Sampler::new(48_000.0, 2, queue);
        let mut out = vec![0.0f32; 16];
        sampler.render_block(&mut out);

        sampler.apply(SamplerMessage::Stop { id: VoiceId(99) });
        assert_eq!(sampler.active_voices(), 1);
    }

    #[test]
    fn steals_oldest_voice_when_full() {
        let mut sampler = Sampler::new(48_000.0, 2, VecDeque::new());
        let mut out = vec![0.0f32; 16];

        sampler.apply(start(1, Some(ramp(4096))));
        sampler.render_block(&mut out);
        sampler.apply(start(2, Some(ramp(4096))));
        sampler.render_block(&mut out);
        sampler.apply(start(3, Some(ramp(4096))));

        let ids: Vec<_> = sampler.voices.iter().filter_map(|v| v.id()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&VoiceId(2)));
        assert!(ids.contains(&VoiceId(3)));
    }

    #[test]
    fn finished_voice_keeps_buffer_alive_until_returned() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 16], 48_000.0));
        let weak = Arc::downgrade(&buffer);
        let mut sampler = Sampler::new(48_000.0, 2, VecDeque::from(vec![start(1, Some(buffer))]));

        // The sampler holds the only strong reference, and the voice runs off
        // the end of the buffer inside this block.
        let mut out = vec![0.0f32; 64];
        sampler.render_block(&mut out);
        assert_eq!(sampler.active_voices(), 0);
        assert!(weak.upgrade().is_some());
        assert_eq!(sampler.retired_buffers(), 1);

        let mut returned: VecDeque<Arc<SampleBuffer>> = VecDeque::new();
        sampler.return_buffers(&mut returned);
        assert_eq!(sampler.retired_buffers(), 0);
        assert_eq!(returned.len(), 1);

        drop(returned);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn stop_steal_and_stop_all_retire_buffers() {
        let mut sampler = Sampler::new(48_000.0, 1, VecDeque::new());
        let mut out = vec![0.0f32; 16];

        let first = ramp(4096);
        let weak_first = Arc::downgrade(&first);
        sampler.apply(start(1, Some(first)));
        sampler.render_block(&mut out);

        // Only one voice, so this steals it.
        sampler.apply(start(2, Some(ramp(4096))));
        assert!(weak_first.upgrade().is_some());
        assert_eq!(sampler.retired_buffers(), 1);

        sampler.apply(SamplerMessage::Stop { id: VoiceId(2) });
        assert_eq!(sampler.retired_buffers(), 2);

        sampler.apply(start(3, Some(ramp(4096))));
        sampler.apply(SamplerMessage::StopAll);
        assert_eq!(sampler.retired_buffers(), 3);
        assert_eq!(sampler.active_voices(), 0);
    }

    #[test]
    fn empty_buffer_is_retired_not_played() {
        let empty = Arc::new(SampleBuffer::new(Vec::new(), 48_000.0));
        let weak = Arc::downgrade(&empty);
        let mut sampler = Sampler::new(48_000.0, 2, VecDeque::from(vec![start(1, Some(empty))]));

        let mut out = vec![0.0f32; 16];
        sampler.render_block(&mut out);
        assert_eq!(sampler.active_voices(), 0);
        assert!(weak.upgrade().is_some());
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn full_return_queue_keeps_the_rest_parked() {
        let mut sampler = Sampler::new(48_000.0, 2, VecDeque::new());
        sampler.apply(start(1, Some(ramp(64))));
        sampler.apply(start(2, Some(ramp(64))));
        sampler.apply(SamplerMessage::StopAll);
        assert_eq!(sampler.retired_buffers(), 2);

        let (mut tx, mut rx) = rtrb::RingBuffer::<Arc<SampleBuffer>>::new(1);
        sampler.return_buffers(&mut tx);
        assert_eq!(sampler.retired_buffers(), 1);

        assert!(rx.pop().is_ok());
        sampler.return_buffers(&mut tx);
        assert_eq!(sampler.retired_buffers(), 0);
    }

    #[test]
    fn handle_assigns_fresh_ids() {
        let mut handle = SamplerHandle::new(VecDeque::new());
        let a = handle.start(None, 1.0);
        let b = handle.start(Some(ramp(8)), 2.0);
        handle.stop(a);

        assert_ne!(a, b);
        let sent: Vec<_> = handle.sender().iter().cloned().collect();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[2], SamplerMessage::Stop { id } if id == a));
    }
}
