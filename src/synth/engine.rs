#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, trace};

use crate::{
    control::{ControlEvent, MessageKind},
    synth::buffer::SampleBuffer,
};

/// Equal-tempered semitone, 2^(1/12).
pub const TONE_RATIO: f64 = 1.059_463_094_359_295_3;

/// Note that plays the sample unchanged (middle C).
pub const ROOT_NOTE: u8 = 60;

/// Playback-rate factor for a note: one semitone per step away from
/// [`ROOT_NOTE`], so 72 plays twice as fast and 48 half as fast.
pub fn playback_rate(note: u8) -> f32 {
    TONE_RATIO.powi(note as i32 - ROOT_NOTE as i32) as f32
}

/// Where voices actually sound. The engine decides *what* plays; the sink
/// owns the audio device.
pub trait PlaybackSink {
    type Voice;

    /// Start playing `buffer` at `rate` right away. `None` is a silent voice.
    fn start(&mut self, buffer: Option<Arc<SampleBuffer>>, rate: f32) -> Self::Voice;

    fn stop(&mut self, voice: Self::Voice);
}

/// What happens to a still-sounding voice when its note is struck again.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetriggerPolicy {
    /// Forget the old voice and let it ring out to the end of the sample.
    #[default]
    Abandon,
    /// Stop the old voice before starting the new one.
    Stop,
}

/// Maps note events onto sample voices: one voice per sounding note, all
/// reading the same shared buffer at a note-dependent rate.
pub struct VoiceEngine<S: PlaybackSink> {
    sink: S,
    active: HashMap<u8, S::Voice>,
    buffer: Option<Arc<SampleBuffer>>,
    retrigger: RetriggerPolicy,
}

impl<S: PlaybackSink> VoiceEngine<S> {
    pub fn new(sink: S, retrigger: RetriggerPolicy) -> Self {
        Self {
            sink,
            active: HashMap::new(),
            buffer: None,
            retrigger,
        }
    }

    /// Replace the buffer used by voices started from now on. Voices that
    /// are already playing keep the buffer they started with.
    pub fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) {
        debug!(
            samples = buffer.len(),
            rate = buffer.sample_rate(),
            "sample buffer loaded"
        );
        self.buffer = Some(buffer);
    }

    pub fn clear_buffer(&mut self) {
        self.buffer = None;
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let rate = playback_rate(note);
        trace!(note, velocity, rate, "note on");

        let voice = self.sink.start(self.buffer.clone(), rate);
        if let Some(previous) = self.active.insert(note, voice) {
            if self.retrigger == RetriggerPolicy::Stop {
                self.sink.stop(previous);
            }
        }
    }

    /// Stop the voice for `note`. Releasing a note that is not sounding
    /// does nothing.
    pub fn note_off(&mut self, note: u8) {
        if let Some(voice) = self.active.remove(&note) {
            trace!(note, "note off");
            self.sink.stop(voice);
        }
    }

    /// Route a normalized event. Kinds other than note on/off are ignored.
    pub fn handle(&mut self, event: &ControlEvent) {
        match (event.kind, event.note()) {
            (MessageKind::NoteOn, Some(note)) => {
                self.note_on(note, event.velocity().unwrap_or(0));
            }
            (MessageKind::NoteOff, Some(note)) => self.note_off(note),
            _ => {}
        }
    }

    pub fn all_notes_off(&mut self) {
        for (_, voice) in self.active.drain() {
            self.sink.stop(voice);
        }
    }

    pub fn is_active(&self, note: u8) -> bool {
        self.active.contains_key(&note)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Sounding notes, lowest first.
    pub fn active_notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.active.keys().copied().collect();
        notes.sort_unstable();
        notes
    }

    pub fn voice(&self, note: u8) -> Option<&S::Voice> {
        self.active.get(&note)
    }

    pub fn retrigger(&self) -> RetriggerPolicy {
        self.retrigger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start { id: u32, rate: f32, has_buffer: bool },
        Stop(u32),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<Call>,
        next: u32,
    }

    impl PlaybackSink for RecordingSink {
        type Voice = u32;

        fn start(&mut self, buffer: Option<Arc<SampleBuffer>>, rate: f32) -> u32 {
            let id = self.next;
            self.next += 1;
            self.calls.push(Call::Start {
                id,
                rate,
                has_buffer: buffer.is_some(),
            });
            id
        }

        fn stop(&mut self, voice: u32) {
            self.calls.push(Call::Stop(voice));
        }
    }

    fn engine(policy: RetriggerPolicy) -> VoiceEngine<RecordingSink> {
        VoiceEngine::new(RecordingSink::default(), policy)
    }

    #[test]
    fn middle_c_is_unpitched() {
        assert_eq!(playback_rate(60), 1.0);
    }

    #[test]
    fn octaves_double_and_halve() {
        assert!((playback_rate(72) - 2.0).abs() < 1e-5);
        assert!((playback_rate(48) - 0.5).abs() < 1e-6);
        assert!((playback_rate(84) - 4.0).abs() < 1e-4);
    }

    #[test]
    fn semitones_follow_tone_ratio() {
        for note in 0..=127u8 {
            let expected = (2f64.powf(1.0 / 12.0)).powi(note as i32 - 60) as f32;
            let actual = playback_rate(note);
            assert!(
                (actual - expected).abs() <= expected * 1e-5,
                "note {note}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn note_on_starts_a_pitched_voice() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.set_buffer(Arc::new(SampleBuffer::new(vec![0.0; 16], 48_000.0)));

        engine.note_on(72, 127);

        assert!(engine.is_active(72));
        match &engine.sink().calls[..] {
            [Call::Start { id: 0, rate, has_buffer: true }] => {
                assert!((rate - 2.0).abs() < 1e-5)
            }
            calls => panic!("unexpected calls {calls:?}"),
        }
    }

    #[test]
    fn note_off_stops_and_forgets() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.note_on(60, 100);
        engine.note_off(60);

        assert!(!engine.is_active(60));
        assert_eq!(engine.sink().calls.last(), Some(&Call::Stop(0)));
    }

    #[test]
    fn stray_note_off_is_a_no_op() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.note_on(64, 100);

        engine.note_off(65);
        engine.note_off(65);

        assert_eq!(engine.active_notes(), vec![64]);
        assert_eq!(engine.sink().calls.len(), 1);
    }

    #[test]
    fn retrigger_abandons_previous_voice() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.note_on(60, 100);
        engine.note_on(60, 100);

        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.voice(60), Some(&1));
        assert!(!engine.sink().calls.contains(&Call::Stop(0)));

        engine.note_off(60);
        let stops: Vec<_> = engine
            .sink()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Stop(_)))
            .collect();
        assert_eq!(stops, vec![&Call::Stop(1)]);
    }

    #[test]
    fn retrigger_can_stop_previous_voice() {
        let mut engine = engine(RetriggerPolicy::Stop);
        engine.note_on(60, 100);
        engine.note_on(60, 100);

        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.voice(60), Some(&1));
        assert_eq!(engine.sink().calls.last(), Some(&Call::Stop(0)));
    }

    #[test]
    fn missing_buffer_gives_silent_voice() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.note_on(60, 100);

        assert!(engine.is_active(60));
        assert!(matches!(
            engine.sink().calls[0],
            Call::Start { has_buffer: false, .. }
        ));
    }

    #[test]
    fn handle_routes_note_events_only() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        engine.handle(&ControlEvent::note_on(0, 62, 127));
        engine.handle(&ControlEvent::decode(&[0xB0, 1, 64]).unwrap());
        assert_eq!(engine.active_notes(), vec![62]);

        engine.handle(&ControlEvent::note_off(0, 62, 127));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn all_notes_off_stops_everything() {
        let mut engine = engine(RetriggerPolicy::Abandon);
        for note in [60, 64, 67] {
            engine.note_on(note, 100);
        }
        engine.all_notes_off();

        assert_eq!(engine.active_count(), 0);
        let stops = engine
            .sink()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Stop(_)))
            .count();
        assert_eq!(stops, 3);
    }
}
