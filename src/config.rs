//! Startup configuration for controllers and the voice engine.
//!
//! Every section has working defaults and consuming builder methods:
//!
//! ```
//! use std::time::Duration;
//! use usbtronica::config::{Config, KeyboardConfig};
//!
//! let config = Config::default()
//!     .keyboard(KeyboardConfig::default().settle(Duration::from_millis(20)));
//! assert_eq!(config.keyboard.channel, 0);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::synth::engine::RetriggerPolicy;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub keyboard: KeyboardConfig,
    pub engine: EngineConfig,
    pub midi: MidiConfig,
}

impl Config {
    pub fn keyboard(mut self, keyboard: KeyboardConfig) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn midi(mut self, midi: MidiConfig) -> Self {
        self.midi = midi;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct KeyboardConfig {
    /// Delay before the keyboard announces itself as connected
    pub settle: Duration,
    /// Zero-based MIDI channel for emitted notes
    pub channel: u8,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            channel: 0,
        }
    }
}

impl KeyboardConfig {
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of the sampler's voice pool
    pub max_voices: usize,
    pub retrigger: RetriggerPolicy,
    /// Capacity of the queue between the engine and the audio thread
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_voices: 32,
            retrigger: RetriggerPolicy::default(),
            queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = max_voices.max(1);
        self
    }

    pub fn retrigger(mut self, retrigger: RetriggerPolicy) -> Self {
        self.retrigger = retrigger;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct MidiConfig {
    /// Client name shown to the system MIDI service
    pub client_name: String,
    /// Per-port capacity of the raw message queue
    pub queue_capacity: usize,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: "usbtronica".to_string(),
            queue_capacity: 256,
        }
    }
}

impl MidiConfig {
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }
}
