use super::Notification;

/// A subscriber to controller notifications.
pub type Listener = Box<dyn FnMut(&Notification)>;

/// Ordered publish/subscribe list owned by a controller.
///
/// Each emitted notification is handed to every listener in subscription
/// order before `emit` returns, so a listener always runs to completion
/// before the next notification is delivered.
#[derive(Default)]
pub struct Emitter {
    listeners: Vec<Listener>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, notification: Notification) {
        for listener in &mut self.listeners {
            listener(&notification);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::DeviceId;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn delivers_in_subscription_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();

        for tag in ["first", "second"] {
            let seen = seen.clone();
            emitter.subscribe(move |n| seen.borrow_mut().push((tag, n.device_id())));
        }

        emitter.emit(Notification::Connected {
            device_id: DeviceId(3),
        });

        assert_eq!(
            *seen.borrow(),
            vec![("first", DeviceId(3)), ("second", DeviceId(3))]
        );
    }

    #[test]
    fn emit_without_listeners_is_fine() {
        let mut emitter = Emitter::new();
        emitter.emit(Notification::Connected {
            device_id: DeviceId(0),
        });
        assert_eq!(emitter.listener_count(), 0);
    }
}
