#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::fmt;

/*
Message Vocabulary
==================

Every controller speaks the same small vocabulary, borrowed from MIDI channel
voice messages. A status byte carries the kind in its high nibble and the
channel in its low nibble:

  status = kind code | channel      e.g. 0x93 = NOTE_ON on channel 3

  code   name                 data bytes
  0x80   NOTE_OFF             note, velocity
  0x90   NOTE_ON              note, velocity
  0xA0   KEY_PRESSURE         note, pressure
  0xB0   CONTROL_CHANGE       controller, value
  0xC0   PROGRAM_CHANGE       program
  0xD0   CHANNEL_PRESSURE     pressure
  0xE0   PITCH_BEND_CHANGE    lsb, msb

Only note on/off carry a typed payload. The other kinds keep their raw data
bytes so consumers can still log or forward them.

Channels are zero-based here (0-15) even though players count 1-16.
*/

/// Highest MIDI channel index (zero-based).
pub const MAX_CHANNEL: u8 = 15;

/// The closed set of message kinds a controller may emit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    KeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBendChange,
}

impl MessageKind {
    /// Every kind, in code order.
    pub const ALL: [MessageKind; 7] = [
        MessageKind::NoteOff,
        MessageKind::NoteOn,
        MessageKind::KeyPressure,
        MessageKind::ControlChange,
        MessageKind::ProgramChange,
        MessageKind::ChannelPressure,
        MessageKind::PitchBendChange,
    ];

    pub const fn code(self) -> u8 {
        match self {
            MessageKind::NoteOff => 0x80,
            MessageKind::NoteOn => 0x90,
            MessageKind::KeyPressure => 0xA0,
            MessageKind::ControlChange => 0xB0,
            MessageKind::ProgramChange => 0xC0,
            MessageKind::ChannelPressure => 0xD0,
            MessageKind::PitchBendChange => 0xE0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::NoteOff => "NOTE_OFF",
            MessageKind::NoteOn => "NOTE_ON",
            MessageKind::KeyPressure => "KEY_PRESSURE",
            MessageKind::ControlChange => "CONTROL_CHANGE",
            MessageKind::ProgramChange => "PROGRAM_CHANGE",
            MessageKind::ChannelPressure => "CHANNEL_PRESSURE",
            MessageKind::PitchBendChange => "PITCH_BEND_CHANGE",
        }
    }

    /// Look up a kind by its exact code. Anything else is not part of the
    /// vocabulary and yields `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Kind of a full status byte (channel nibble ignored).
    pub fn from_status(status: u8) -> Option<Self> {
        Self::from_code(status & 0xF0)
    }

    /// Number of data bytes following the status byte on the wire.
    pub const fn data_len(self) -> usize {
        match self {
            MessageKind::ProgramChange | MessageKind::ChannelPressure => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific part of a [`ControlEvent`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Note { note: u8, velocity: u8 },
    /// Raw data bytes for kinds without a typed payload. Single-byte kinds
    /// leave the second byte at zero.
    Data([u8; 2]),
}

/// A normalized event, identical in shape whatever device produced it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub kind: MessageKind,
    pub channel: u8,
    pub payload: Payload,
}

impl ControlEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: MessageKind::NoteOn,
            channel: channel.min(MAX_CHANNEL),
            payload: Payload::Note { note, velocity },
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: MessageKind::NoteOff,
            channel: channel.min(MAX_CHANNEL),
            payload: Payload::Note { note, velocity },
        }
    }

    pub fn note(&self) -> Option<u8> {
        match self.payload {
            Payload::Note { note, .. } => Some(note),
            Payload::Data(_) => None,
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match self.payload {
            Payload::Note { velocity, .. } => Some(velocity),
            Payload::Data(_) => None,
        }
    }

    /// Normalize a raw MIDI channel message.
    ///
    /// Returns `None` for anything outside the vocabulary: system messages,
    /// running status, truncated input. A NOTE_ON with zero velocity is a
    /// release by MIDI convention and comes out as NOTE_OFF.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let kind = MessageKind::from_status(status)?;
        if data.len() < kind.data_len() {
            return None;
        }
        let data = &data[..kind.data_len()];
        if data.iter().any(|b| b & 0x80 != 0) {
            return None;
        }
        let channel = status & 0x0F;

        let event = match kind {
            MessageKind::NoteOn if data[1] == 0 => Self::note_off(channel, data[0], 0),
            MessageKind::NoteOn => Self::note_on(channel, data[0], data[1]),
            MessageKind::NoteOff => Self::note_off(channel, data[0], data[1]),
            _ => {
                let mut raw = [0u8; 2];
                raw[..data.len()].copy_from_slice(data);
                Self {
                    kind,
                    channel,
                    payload: Payload::Data(raw),
                }
            }
        };
        Some(event)
    }

    /// Wire bytes for this event.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![self.kind.code() | (self.channel & 0x0F)];
        match self.payload {
            Payload::Note { note, velocity } => bytes.extend([note & 0x7F, velocity & 0x7F]),
            Payload::Data(raw) => bytes.extend(&raw[..self.kind.data_len()]),
        }
        bytes
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::Note { note, velocity } => write!(
                f,
                "{} ch {} note {} vel {}",
                self.kind, self.channel, note, velocity
            ),
            Payload::Data([a, b]) => write!(f, "{} ch {} [{a} {b}]", self.kind, self.channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn vocabulary_is_closed_and_bijective() {
        let codes: HashSet<u8> = MessageKind::ALL.iter().map(|k| k.code()).collect();
        let names: HashSet<&str> = MessageKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(codes.len(), 7);
        assert_eq!(names.len(), 7);

        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_code(kind.code()), Some(kind));
            assert_eq!(MessageKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn known_codes() {
        assert_eq!(MessageKind::from_code(0x90), Some(MessageKind::NoteOn));
        assert_eq!(MessageKind::from_code(0x80).map(|k| k.name()), Some("NOTE_OFF"));
        assert_eq!(MessageKind::from_name("PITCH_BEND_CHANGE").map(|k| k.code()), Some(0xE0));
    }

    #[test]
    fn unknown_code_is_not_a_kind() {
        assert_eq!(MessageKind::from_code(0xF0), None);
        assert_eq!(MessageKind::from_code(0x91), None);
        assert_eq!(MessageKind::from_code(0x00), None);
        assert_eq!(MessageKind::from_name("SYSEX"), None);
    }

    #[test]
    fn decode_note_on_with_channel() {
        let event = ControlEvent::decode(&[0x93, 60, 100]).unwrap();
        assert_eq!(event, ControlEvent::note_on(3, 60, 100));
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.velocity(), Some(100));
    }

    #[test]
    fn zero_velocity_note_on_is_a_release() {
        let event = ControlEvent::decode(&[0x90, 64, 0]).unwrap();
        assert_eq!(event.kind, MessageKind::NoteOff);
        assert_eq!(event.note(), Some(64));
    }

    #[test]
    fn decode_keeps_raw_data_for_other_kinds() {
        let cc = ControlEvent::decode(&[0xB1, 7, 90]).unwrap();
        assert_eq!(cc.kind, MessageKind::ControlChange);
        assert_eq!(cc.channel, 1);
        assert_eq!(cc.payload, Payload::Data([7, 90]));
        assert_eq!(cc.note(), None);

        let program = ControlEvent::decode(&[0xC0, 5]).unwrap();
        assert_eq!(program.payload, Payload::Data([5, 0]));
        assert_eq!(program.encode(), vec![0xC0, 5]);
    }

    #[test]
    fn decode_ignores_out_of_vocabulary_input() {
        assert_eq!(ControlEvent::decode(&[]), None);
        assert_eq!(ControlEvent::decode(&[0xF8]), None); // clock
        assert_eq!(ControlEvent::decode(&[0xF0, 1, 2, 0xF7]), None);
        assert_eq!(ControlEvent::decode(&[60, 100]), None); // running status
        assert_eq!(ControlEvent::decode(&[0x90, 60]), None); // truncated
        assert_eq!(ControlEvent::decode(&[0x90, 0x90, 1]), None);
    }

    #[test]
    fn channel_is_clamped_to_zero_based_range() {
        assert_eq!(ControlEvent::note_on(16, 60, 1).channel, 15);
    }

    #[test]
    fn display_uses_kind_name() {
        let event = ControlEvent::note_on(0, 60, 127);
        assert_eq!(event.to_string(), "NOTE_ON ch 0 note 60 vel 127");
    }
}
