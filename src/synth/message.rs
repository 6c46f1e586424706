#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer, PushError};

use std::{collections::VecDeque, sync::Arc};

use crate::synth::buffer::SampleBuffer;

/// Handle to one playing sampler voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Commands from the control thread to the audio thread.
#[derive(Debug, Clone)]
pub enum SamplerMessage {
    Start {
        id: VoiceId,
        buffer: Option<Arc<SampleBuffer>>,
        rate: f32,
    },
    Stop {
        id: VoiceId,
    },
    StopAll,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SamplerMessage>;
}

pub trait MessageSender {
    /// Returns `false` when the queue is full and the message was dropped.
    fn push(&mut self, msg: SamplerMessage) -> bool;
}

/// Where the audio thread sends buffers it is done with, so the last
/// reference is dropped off the audio thread.
pub trait BufferReturn {
    /// Hands the buffer back when there is no room.
    fn give_back(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), Arc<SampleBuffer>>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SamplerMessage> {
    fn pop(&mut self) -> Option<SamplerMessage> {
        Consumer::pop(self).ok()
    }
}

#[cfg(feature = "rtrb")]
impl MessageSender for Producer<SamplerMessage> {
    fn push(&mut self, msg: SamplerMessage) -> bool {
        Producer::push(self, msg).is_ok()
    }
}

#[cfg(feature = "rtrb")]
impl BufferReturn for Producer<Arc<SampleBuffer>> {
    fn give_back(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), Arc<SampleBuffer>> {
        Producer::push(self, buffer).map_err(|PushError::Full(buffer)| buffer)
    }
}

impl MessageReceiver for VecDeque<SamplerMessage> {
    fn pop(&mut self) -> Option<SamplerMessage> {
        self.pop_front()
    }
}

impl MessageSender for VecDeque<SamplerMessage> {
    fn push(&mut self, msg: SamplerMessage) -> bool {
        self.push_back(msg);
        true
    }
}

impl BufferReturn for VecDeque<Arc<SampleBuffer>> {
    fn give_back(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), Arc<SampleBuffer>> {
        self.push_back(buffer);
        Ok(())
    }
}
