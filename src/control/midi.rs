//! Hardware MIDI input through `midir`.
//!
//! Each connected input port gets its own lock-free queue: midir calls back
//! on a driver thread, the callback copies the raw bytes into the queue, and
//! `poll` drains every queue on the owning thread, decodes, and emits. This
//! keeps listener calls on one thread and in arrival order per port.

use std::time::Instant;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, trace, warn};

use super::{
    ControlError, ControlEvent, Controller, DeviceId, Emitter, Notification, Scan, Startup,
};
use crate::config::MidiConfig;

pub const MIDI_KIND: &str = "MidiControl";

/// Channel messages are at most three bytes; longer input (sysex) is dropped
/// before it reaches the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    len: u8,
    bytes: [u8; 3],
}

impl RawMessage {
    pub fn from_slice(msg: &[u8]) -> Option<Self> {
        if msg.is_empty() || msg.len() > 3 {
            return None;
        }
        let mut bytes = [0u8; 3];
        bytes[..msg.len()].copy_from_slice(msg);
        Some(Self {
            len: msg.len() as u8,
            bytes,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

struct Port {
    name: String,
    device_id: DeviceId,
    rx: Consumer<RawMessage>,
    _connection: MidiInputConnection<Producer<RawMessage>>,
}

pub struct MidiController {
    config: MidiConfig,
    ports: Vec<Port>,
    devices: Vec<DeviceId>,
    next_id: u32,
    emitter: Emitter,
}

impl MidiController {
    pub fn new(config: &MidiConfig) -> Self {
        Self {
            config: config.clone(),
            ports: Vec::new(),
            devices: Vec::new(),
            next_id: 0,
            emitter: Emitter::new(),
        }
    }

    /// Names of the connected input ports, in connection order.
    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }

    fn client(&self) -> Result<MidiInput, ControlError> {
        let mut input = MidiInput::new(&self.config.client_name).map_err(|e| ControlError::Init {
            backend: "midi",
            reason: e.to_string(),
        })?;
        input.ignore(Ignore::All);
        Ok(input)
    }

    fn is_tracked(&self, name: &str) -> bool {
        self.ports.iter().any(|p| p.name == name)
    }

    /// midir consumes the client on connect, so every port gets a fresh one.
    fn connect_port(&mut self, name: &str) -> Result<DeviceId, ControlError> {
        let input = self.client()?;
        let port = find_port(&input, name)?.ok_or_else(|| ControlError::Connect {
            port: name.to_string(),
            reason: "port disappeared during scan".to_string(),
        })?;

        let (tx, rx) = RingBuffer::new(self.config.queue_capacity);
        let connection = input
            .connect(
                &port,
                &format!("{}-in", self.config.client_name),
                |_stamp, msg, tx: &mut Producer<RawMessage>| {
                    if let Some(raw) = RawMessage::from_slice(msg) {
                        // A full queue drops the message; the owner is not polling.
                        let _ = tx.push(raw);
                    }
                },
                tx,
            )
            .map_err(|e| ControlError::Connect {
                port: name.to_string(),
                reason: e.to_string(),
            })?;

        let device_id = DeviceId(self.next_id);
        self.next_id += 1;
        self.ports.push(Port {
            name: name.to_string(),
            device_id,
            rx,
            _connection: connection,
        });
        Ok(device_id)
    }
}

fn find_port(input: &MidiInput, name: &str) -> Result<Option<MidiInputPort>, ControlError> {
    for port in input.ports() {
        let port_name = input
            .port_name(&port)
            .map_err(|e| ControlError::PortInfo(e.to_string()))?;
        if port_name == name {
            return Ok(Some(port));
        }
    }
    Ok(None)
}

/// Decode and emit everything queued for one device.
fn drain(rx: &mut Consumer<RawMessage>, device_id: DeviceId, emitter: &mut Emitter) {
    while let Ok(raw) = rx.pop() {
        match ControlEvent::decode(raw.as_slice()) {
            Some(event) => emitter.emit(Notification::Control { device_id, event }),
            None => trace!(device = %device_id, bytes = ?raw.as_slice(), "ignored midi message"),
        }
    }
}

/// Remove and return the items whose name is not in `present`, keeping the
/// order of the rest.
fn take_missing<T>(items: &mut Vec<T>, present: &[String], name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut missing = Vec::new();
    let mut i = 0;
    while i < items.len() {
        if present.iter().any(|p| p.as_str() == name(&items[i])) {
            i += 1;
        } else {
            missing.push(items.remove(i));
        }
    }
    missing
}

impl MidiController {
    /// Forget ports that are no longer enumerated. Their devices leave
    /// `devices`, so a port that comes back is connected again under a new id.
    fn prune(&mut self, present: &[String]) {
        let gone = take_missing(&mut self.ports, present, |p| p.name.as_str());
        for mut port in gone {
            drain(&mut port.rx, port.device_id, &mut self.emitter);
            self.devices.retain(|d| *d != port.device_id);
            info!(device = %port.device_id, port = %port.name, "midi device gone");
        }
    }
}

impl Scan for MidiController {
    fn scan(&mut self) -> Result<usize, ControlError> {
        let probe = self.client()?;
        let mut present = Vec::new();
        for port in probe.ports() {
            let name = probe
                .port_name(&port)
                .map_err(|e| ControlError::PortInfo(e.to_string()))?;
            if !present.contains(&name) {
                present.push(name);
            }
        }
        drop(probe);

        self.prune(&present);
        let fresh: Vec<String> = present
            .into_iter()
            .filter(|name| !self.is_tracked(name))
            .collect();

        let mut added = 0;
        for name in fresh {
            match self.connect_port(&name) {
                Ok(device_id) => {
                    info!(device = %device_id, port = %name, "midi device connected");
                    self.devices.push(device_id);
                    self.emitter.emit(Notification::Connected { device_id });
                    added += 1;
                }
                Err(err) => warn!("{err}"),
            }
        }
        debug!(added, tracked = self.ports.len(), "midi scan finished");
        Ok(added)
    }
}

impl Controller for MidiController {
    fn kind(&self) -> &'static str {
        MIDI_KIND
    }

    fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    /// Connects every port present right now.
    fn start(&mut self, _now: Instant) -> Startup {
        if let Err(err) = self.scan() {
            warn!("midi unavailable: {err}");
        }
        Startup::Ready
    }

    fn poll(&mut self, _now: Instant) {
        for port in &mut self.ports {
            drain(&mut port.rx, port.device_id, &mut self.emitter);
        }
    }

    fn scanner(&mut self) -> Option<&mut dyn Scan> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::MessageKind;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn raw_message_keeps_channel_messages_only() {
        assert_eq!(
            RawMessage::from_slice(&[0x90, 60, 1]).map(|r| r.as_slice().to_vec()),
            Some(vec![0x90, 60, 1])
        );
        assert_eq!(
            RawMessage::from_slice(&[0xC2, 9]).map(|r| r.as_slice().to_vec()),
            Some(vec![0xC2, 9])
        );
        assert_eq!(RawMessage::from_slice(&[]), None);
        assert_eq!(RawMessage::from_slice(&[0xF0, 1, 2, 3, 0xF7]), None);
    }

    #[test]
    fn drain_emits_decoded_events_in_arrival_order() {
        let (mut tx, mut rx) = RingBuffer::new(8);
        for msg in [&[0x90, 60, 100][..], &[0xF8][..], &[0x80, 60, 0][..], &[0xB0, 1, 64][..]] {
            tx.push(RawMessage::from_slice(msg).unwrap()).unwrap();
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();
        let sink = seen.clone();
        emitter.subscribe(move |n| sink.borrow_mut().push(*n));

        drain(&mut rx, DeviceId(2), &mut emitter);

        let kinds: Vec<_> = seen
            .borrow()
            .iter()
            .map(|n| match n {
                Notification::Control { device_id, event } => {
                    assert_eq!(*device_id, DeviceId(2));
                    event.kind
                }
                Notification::Connected { .. } => panic!("unexpected connect"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::NoteOn,
                MessageKind::NoteOff,
                MessageKind::ControlChange
            ]
        );
        assert!(rx.is_empty());
    }

    #[test]
    fn missing_ports_are_taken_out_in_order() {
        let mut tracked = vec![
            ("Keystation".to_string(), DeviceId(0)),
            ("nanoKONTROL".to_string(), DeviceId(1)),
            ("Launchpad".to_string(), DeviceId(2)),
        ];
        let present = vec!["Launchpad".to_string(), "Keystation".to_string()];

        let gone = take_missing(&mut tracked, &present, |(name, _)| name.as_str());

        assert_eq!(gone, vec![("nanoKONTROL".to_string(), DeviceId(1))]);
        assert_eq!(
            tracked.iter().map(|(_, id)| *id).collect::<Vec<_>>(),
            vec![DeviceId(0), DeviceId(2)]
        );
    }

    #[test]
    fn replugged_port_is_offered_for_connection_again() {
        let mut tracked = vec![("Keystation".to_string(), DeviceId(0))];
        let untracked = |tracked: &Vec<(String, DeviceId)>, present: &[String]| -> Vec<String> {
            present
                .iter()
                .filter(|name| !tracked.iter().any(|(t, _)| t == *name))
                .cloned()
                .collect()
        };

        // Unplugged: the scan sees no ports.
        let gone = take_missing(&mut tracked, &[], |(name, _)| name.as_str());
        assert_eq!(gone, vec![("Keystation".to_string(), DeviceId(0))]);

        // Plugged back in: the name is no longer tracked.
        let present = vec!["Keystation".to_string()];
        assert!(take_missing(&mut tracked, &present, |(name, _)| name.as_str()).is_empty());
        assert_eq!(untracked(&tracked, &present), present);
    }

    #[test]
    fn new_controller_tracks_nothing() {
        let mut midi = MidiController::new(&MidiConfig::default());
        assert_eq!(midi.kind(), MIDI_KIND);
        assert!(midi.devices().is_empty());
        assert!(midi.scanner().is_some());
        assert_eq!(midi.port_names().count(), 0);
    }
}
