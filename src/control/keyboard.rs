//! Computer keyboard as a one-octave note controller.
//!
//! Two rows of the keyboard play a chromatic octave starting at middle C,
//! laid out like a piano: the letter row holds the white keys and the digit
//! row above it the black keys.
//!
//! ```text
//!   2   3       5   6   7
//! Q   W   E   R   T   Y   U   I
//! C4  D4  E4  F4  G4  A4  B4  C5
//! ```

use std::{
    collections::HashSet,
    sync::mpsc::{self, Receiver, Sender},
    time::{Duration, Instant},
};

use tracing::{debug, info};

use super::{ControlEvent, Controller, DeviceId, Emitter, Notification, Startup};
use crate::config::KeyboardConfig;

pub const KEYBOARD_KIND: &str = "KeyboardControl";

/// Notes are played at full velocity; keys have no touch sensitivity.
pub const MAX_VELOCITY: u8 = 127;

/// There is only ever one logical computer keyboard.
pub const KEYBOARD_DEVICE: DeviceId = DeviceId(0);

/// Physical key (W3C `KeyboardEvent.code`) → MIDI note.
const KEY_NOTES: [(&str, u8); 13] = [
    ("KeyQ", 60),
    ("Digit2", 61),
    ("KeyW", 62),
    ("Digit3", 63),
    ("KeyE", 64),
    ("KeyR", 65),
    ("Digit5", 66),
    ("KeyT", 67),
    ("Digit6", 68),
    ("KeyY", 69),
    ("Digit7", 70),
    ("KeyU", 71),
    ("KeyI", 72),
];

/// Note bound to a key code, if the key is musical at all.
pub fn note_for_key(code: &str) -> Option<u8> {
    KEY_NOTES
        .iter()
        .find(|(key, _)| *key == code)
        .map(|&(_, note)| note)
}

/// Raw key signal as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Press,
    /// Auto-repeat while the key is held down.
    Repeat,
    Release,
}

/// Sending side for raw key signals. Signals are applied, in order, on the
/// controller's next `poll`.
#[derive(Clone)]
pub struct KeyInput {
    tx: Sender<(String, KeyTransition)>,
}

impl KeyInput {
    pub fn send(&self, code: impl Into<String>, transition: KeyTransition) {
        // The controller outlives every input in practice; a closed channel
        // only means nobody is listening any more.
        let _ = self.tx.send((code.into(), transition));
    }
}

pub struct KeyboardController {
    channel: u8,
    settle: Duration,
    connect_at: Option<Instant>,
    devices: Vec<DeviceId>,
    held: HashSet<&'static str>,
    emitter: Emitter,
    input_tx: Sender<(String, KeyTransition)>,
    input_rx: Receiver<(String, KeyTransition)>,
}

impl KeyboardController {
    pub fn new(config: &KeyboardConfig) -> Self {
        let (input_tx, input_rx) = mpsc::channel();
        Self {
            channel: config.channel.min(super::message::MAX_CHANNEL),
            settle: config.settle,
            connect_at: None,
            devices: Vec::new(),
            held: HashSet::new(),
            emitter: Emitter::new(),
            input_tx,
            input_rx,
        }
    }

    /// A handle for platform code to queue key signals.
    pub fn input(&self) -> KeyInput {
        KeyInput {
            tx: self.input_tx.clone(),
        }
    }

    /// Feed one key signal. Returns the event that was emitted, if any.
    ///
    /// Only edges produce events: the first press of a key and the release
    /// that ends it. Repeats, double presses and stray releases are dropped.
    pub fn handle_key(&mut self, code: &str, transition: KeyTransition) -> Option<ControlEvent> {
        let Some(&(key, note)) = KEY_NOTES.iter().find(|(key, _)| *key == code) else {
            if transition == KeyTransition::Press {
                debug!(code, "pressed unmapped key");
            }
            return None;
        };

        let event = match transition {
            KeyTransition::Press if self.held.insert(key) => {
                ControlEvent::note_on(self.channel, note, MAX_VELOCITY)
            }
            KeyTransition::Release if self.held.remove(key) => {
                ControlEvent::note_off(self.channel, note, MAX_VELOCITY)
            }
            _ => return None,
        };

        self.emitter.emit(Notification::Control {
            device_id: KEYBOARD_DEVICE,
            event,
        });
        Some(event)
    }

    pub fn press(&mut self, code: &str) -> Option<ControlEvent> {
        self.handle_key(code, KeyTransition::Press)
    }

    pub fn release(&mut self, code: &str) -> Option<ControlEvent> {
        self.handle_key(code, KeyTransition::Release)
    }

    /// Codes of the keys currently held down.
    pub fn held_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.held.iter().copied()
    }

    fn announce(&mut self) {
        self.connect_at = None;
        self.devices.push(KEYBOARD_DEVICE);
        info!(device = %KEYBOARD_DEVICE, "keyboard connected");
        self.emitter.emit(Notification::Connected {
            device_id: KEYBOARD_DEVICE,
        });
    }
}

impl Controller for KeyboardController {
    fn kind(&self) -> &'static str {
        KEYBOARD_KIND
    }

    fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    /// The keyboard is always there; it announces itself once the settle
    /// delay has passed.
    fn start(&mut self, now: Instant) -> Startup {
        if self.is_connected() {
            return Startup::Ready;
        }
        if let Some(ready_at) = self.connect_at {
            return Startup::Pending { ready_at };
        }
        if self.settle.is_zero() {
            self.announce();
            return Startup::Ready;
        }

        let ready_at = now + self.settle;
        self.connect_at = Some(ready_at);
        Startup::Pending { ready_at }
    }

    fn poll(&mut self, now: Instant) {
        if self.connect_at.is_some_and(|at| now >= at) {
            self.announce();
        }
        while let Ok((code, transition)) = self.input_rx.try_recv() {
            self.handle_key(&code, transition);
        }
    }
}
