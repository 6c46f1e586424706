// Purpose: turn every kind of input device into one stream of ControlEvents
// Controllers sit below the application and above raw device input

pub mod emitter;
pub mod keyboard;
pub mod message;
#[cfg(feature = "midi")]
pub mod midi;
pub mod registry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::{fmt, time::Instant};

pub use emitter::{Emitter, Listener};
pub use keyboard::{KeyInput, KeyTransition, KeyboardController};
pub use message::{ControlEvent, MessageKind, Payload};
#[cfg(feature = "midi")]
pub use midi::MidiController;
pub use registry::ControllerRegistry;

/// Identifies one physical unit among the devices a controller tracks.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a controller tells its subscribers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Emitted once per device when the controller starts tracking it.
    Connected { device_id: DeviceId },
    Control {
        device_id: DeviceId,
        event: ControlEvent,
    },
}

impl Notification {
    pub fn device_id(&self) -> DeviceId {
        match self {
            Notification::Connected { device_id } | Notification::Control { device_id, .. } => {
                *device_id
            }
        }
    }
}

/// Result of [`Controller::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Devices known at start were connected (and announced) immediately.
    Ready,
    /// Connect notifications will be delivered by the first `poll` at or after
    /// `ready_at`.
    Pending { ready_at: Instant },
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to initialize {backend} input: {reason}")]
    Init {
        backend: &'static str,
        reason: String,
    },

    #[error("failed to connect to port '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("failed to query port info: {0}")]
    PortInfo(String),
}

/// Optional capability: probe for devices that appeared since the last scan.
pub trait Scan {
    /// Returns how many new devices are now tracked.
    fn scan(&mut self) -> Result<usize, ControlError>;
}

/// Any input source that emits normalized control events.
///
/// Controllers are single-threaded: subscription, `poll` and all listener
/// calls happen on the thread that owns the registry.
pub trait Controller {
    /// Stable type identifier, used as the registry key.
    fn kind(&self) -> &'static str;

    /// Devices that have been announced with a `Connected` notification.
    fn devices(&self) -> &[DeviceId];

    fn emitter_mut(&mut self) -> &mut Emitter;

    /// Begin the connect lifecycle.
    fn start(&mut self, now: Instant) -> Startup;

    /// Deliver whatever became due since the last call.
    fn poll(&mut self, now: Instant);

    fn scanner(&mut self) -> Option<&mut dyn Scan> {
        None
    }

    fn is_connected(&self) -> bool {
        !self.devices().is_empty()
    }

    fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static)
    where
        Self: Sized,
    {
        self.emitter_mut().subscribe(listener);
    }
}

impl<'a> dyn Controller + 'a {
    /// Listen for `Connected` notifications only.
    pub fn on_connect(&mut self, mut f: impl FnMut(DeviceId) + 'static) {
        self.emitter_mut().subscribe(move |n| {
            if let Notification::Connected { device_id } = n {
                f(*device_id);
            }
        });
    }

    /// Listen for control events only.
    pub fn on_control(&mut self, mut f: impl FnMut(DeviceId, &ControlEvent) + 'static) {
        self.emitter_mut().subscribe(move |n| {
            if let Notification::Control { device_id, event } = n {
                f(*device_id, event);
            }
        });
    }
}
