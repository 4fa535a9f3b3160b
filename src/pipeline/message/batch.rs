//! Capacity-bounded message batch for the pull hot path.
//!
//! A message iterator's `next` fills one `MessageBatch`. The batch is reused
//! across calls; its capacity is fixed when the iterator is created.

use crate::pipeline::message::Message;

/// Default number of messages one `next` call may return.
pub const DEFAULT_BATCH_CAPACITY: usize = 15;

/// An ordered batch of messages with a hard upper bound.
pub struct MessageBatch {
    messages: Vec<Message>,
    capacity: usize,
}

impl MessageBatch {
    /// Create an empty batch. Panics on zero capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "message batch capacity must be at least 1");
        Self {
            messages: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Drop every message (returning them to their pools).
    #[inline]
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    /// Free slots left.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.messages.len()
    }

    /// Append a message. Panics when the batch is full.
    #[inline]
    pub fn push(&mut self, message: Message) {
        assert!(
            !self.is_full(),
            "message batch is full ({} messages)",
            self.capacity
        );
        self.messages.push(message);
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    /// Move every message out, leaving the batch empty and reusable.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Message> {
        self.messages.drain(..)
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl Default for MessageBatch {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BATCH_CAPACITY)
    }
}

impl std::fmt::Debug for MessageBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBatch")
            .field("len", &self.messages.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::message::{ClockClass, ClockSnapshot, MessageBody};
    use std::rc::Rc;

    fn inactivity(value: u64) -> Message {
        Message::unpooled(MessageBody::MessageIteratorInactivity {
            clock_snapshot: ClockSnapshot::new(Rc::new(ClockClass::new()), value),
        })
    }

    #[test]
    fn test_batch_push_and_drain() {
        let mut batch = MessageBatch::with_capacity(3);
        assert!(batch.is_empty());

        batch.push(inactivity(1));
        batch.push(inactivity(2));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.remaining(), 1);

        let values: Vec<u64> = batch
            .drain()
            .map(|m| m.default_clock_snapshot().unwrap().value())
            .collect();
        assert_eq!(values, vec![1, 2]);
        assert!(batch.is_empty());
        assert_eq!(batch.capacity(), 3);
    }

    #[test]
    fn test_batch_full() {
        let mut batch = MessageBatch::with_capacity(1);
        batch.push(inactivity(0));
        assert!(batch.is_full());
        assert_eq!(batch.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "message batch is full")]
    fn test_batch_overflow_panics() {
        let mut batch = MessageBatch::with_capacity(1);
        batch.push(inactivity(0));
        batch.push(inactivity(1));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(MessageBatch::default().capacity(), DEFAULT_BATCH_CAPACITY);
    }
}
