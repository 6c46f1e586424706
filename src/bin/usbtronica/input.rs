//! Terminal key events → W3C key codes for the keyboard controller

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use usbtronica::control::{KeyInput, KeyTransition};

/// Physical key code for a terminal key, as `KeyboardEvent.code` names it.
pub fn key_code(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Char(c) if c.is_ascii_alphabetic() => {
            Some(format!("Key{}", c.to_ascii_uppercase()))
        }
        KeyCode::Char(c) if c.is_ascii_digit() => Some(format!("Digit{c}")),
        KeyCode::Char(' ') => Some("Space".to_string()),
        _ => None,
    }
}

/// Forwards terminal keys to the keyboard controller.
///
/// Terminals with the kitty keyboard protocol report presses, repeats and
/// releases. Others only report presses (auto-repeat arrives as more
/// presses), so a key counts as released once it has been quiet for
/// `hold_timeout`.
pub struct KeyForwarder {
    input: KeyInput,
    reports_release: bool,
    hold_timeout: Duration,
    last_seen: HashMap<String, Instant>,
}

impl KeyForwarder {
    pub fn new(input: KeyInput, reports_release: bool, hold_timeout: Duration) -> Self {
        Self {
            input,
            reports_release,
            hold_timeout,
            last_seen: HashMap::new(),
        }
    }

    pub fn forward(&mut self, key: KeyEvent, now: Instant) {
        let Some(code) = key_code(key.code) else {
            return;
        };

        if self.reports_release {
            let transition = match key.kind {
                KeyEventKind::Press => KeyTransition::Press,
                KeyEventKind::Repeat => KeyTransition::Repeat,
                KeyEventKind::Release => KeyTransition::Release,
            };
            self.input.send(code, transition);
            return;
        }

        let transition = if self.last_seen.contains_key(&code) {
            KeyTransition::Repeat
        } else {
            KeyTransition::Press
        };
        self.input.send(code.clone(), transition);
        self.last_seen.insert(code, now);
    }

    /// Release keys that went quiet. No-op when the terminal reports releases.
    pub fn expire(&mut self, now: Instant) {
        let timeout = self.hold_timeout;
        let input = &self.input;
        self.last_seen.retain(|code, seen| {
            let held = now.duration_since(*seen) < timeout;
            if !held {
                input.send(code.clone(), KeyTransition::Release);
            }
            held
        });
    }
}
