use std::time::Instant;

use tracing::{debug, warn};

use super::{
    keyboard::{KeyInput, KeyboardController},
    Controller, Startup,
};
use crate::config::Config;

/// Every known controller, keyed by kind, in registration order.
///
/// Built once at startup and owned by the application; iteration is the
/// only way to reach the controllers for subscribing and scanning.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: Vec<(&'static str, Box<dyn Controller>)>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The keyboard, then hardware MIDI when it is compiled in. Also returns
    /// the keyboard's input handle, since the registry only exposes
    /// controllers through the `Controller` trait.
    pub fn with_defaults(config: &Config) -> (Self, KeyInput) {
        let keyboard = KeyboardController::new(&config.keyboard);
        let input = keyboard.input();

        let mut registry = Self::new();
        registry.register(Box::new(keyboard));
        #[cfg(feature = "midi")]
        registry.register(Box::new(super::midi::MidiController::new(&config.midi)));
        (registry, input)
    }

    /// Add a controller under its kind. Registering a kind twice replaces the
    /// earlier instance but keeps its position.
    pub fn register(&mut self, controller: Box<dyn Controller>) -> &mut Self {
        let kind = controller.kind();
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = controller,
            None => self.entries.push((kind, controller)),
        }
        debug!(kind, "controller registered");
        self
    }

    pub fn for_each(&self, mut f: impl FnMut(&'static str, &dyn Controller)) {
        for (kind, controller) in &self.entries {
            f(*kind, controller.as_ref());
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&'static str, &mut dyn Controller)) {
        for (kind, controller) in &mut self.entries {
            f(*kind, controller.as_mut());
        }
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Controller> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| c.as_ref())
    }

    pub fn get_mut(&mut self, kind: &str) -> Option<&mut (dyn Controller + 'static)> {
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| c.as_mut())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start every controller. Returns the latest pending connect deadline,
    /// if any controller is still settling.
    pub fn start_all(&mut self, now: Instant) -> Option<Instant> {
        let mut latest = None;
        self.for_each_mut(|_, controller| {
            if let Startup::Pending { ready_at } = controller.start(now) {
                latest = latest.max(Some(ready_at));
            }
        });
        latest
    }

    pub fn poll_all(&mut self, now: Instant) {
        self.for_each_mut(|_, controller| controller.poll(now));
    }

    /// Scan every controller that can scan. Failures are logged and skipped.
    /// Returns the number of newly tracked devices.
    pub fn scan_all(&mut self) -> usize {
        let mut added = 0;
        self.for_each_mut(|kind, controller| {
            if let Some(scanner) = controller.scanner() {
                match scanner.scan() {
                    Ok(n) => added += n,
                    Err(err) => warn!(kind, "scan failed: {err}"),
                }
            }
        });
        added
    }
}
