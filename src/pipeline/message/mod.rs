//! Messages: the unit flowing through the graph.
//!
//! A [`Message`] is an immutable [`MessageBody`] in a pooled box. The handle
//! has exactly one owner at a time and moves along the pull chain; when the
//! last holder drops it, the box goes back to its graph's per-kind pool, or
//! is freed if the graph no longer exists.

pub mod batch;
pub mod clock;
pub mod trace;

pub use batch::MessageBatch;
pub use clock::{ClockClass, ClockExpectation, ClockSnapshot};
pub use trace::{Event, EventClass, LogLevel, Packet, Stream, StreamClass, Trace};

use crate::pipeline::error::GraphResult;
use crate::pipeline::pool::{MessagePools, Slot};
use std::fmt;
use std::rc::{Rc, Weak};

/// Message kinds, declared in muxing priority order: when two messages share
/// a timestamp, the kind declared first is emitted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    StreamBeginning,
    PacketBeginning,
    Event,
    DiscardedEvents,
    PacketEnd,
    MessageIteratorInactivity,
    DiscardedPackets,
    StreamEnd,
}

impl MessageKind {
    pub const COUNT: usize = 8;

    pub const ALL: [MessageKind; Self::COUNT] = [
        MessageKind::StreamBeginning,
        MessageKind::PacketBeginning,
        MessageKind::Event,
        MessageKind::DiscardedEvents,
        MessageKind::PacketEnd,
        MessageKind::MessageIteratorInactivity,
        MessageKind::DiscardedPackets,
        MessageKind::StreamEnd,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageKind::StreamBeginning => "stream-beginning",
            MessageKind::PacketBeginning => "packet-beginning",
            MessageKind::Event => "event",
            MessageKind::DiscardedEvents => "discarded-events",
            MessageKind::PacketEnd => "packet-end",
            MessageKind::MessageIteratorInactivity => "message-iterator-inactivity",
            MessageKind::DiscardedPackets => "discarded-packets",
            MessageKind::StreamEnd => "stream-end",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Range of discarded events or packets within a stream.
#[derive(Debug, Clone)]
pub struct DiscardedItems {
    pub stream: Rc<Stream>,
    pub beginning: Option<ClockSnapshot>,
    pub end: Option<ClockSnapshot>,
    pub count: Option<u64>,
}

/// Payload of a message.
#[derive(Debug, Clone)]
pub enum MessageBody {
    StreamBeginning {
        stream: Rc<Stream>,
        clock_snapshot: Option<ClockSnapshot>,
    },
    PacketBeginning {
        packet: Rc<Packet>,
        clock_snapshot: Option<ClockSnapshot>,
    },
    Event {
        event: Event,
        clock_snapshot: Option<ClockSnapshot>,
    },
    DiscardedEvents(DiscardedItems),
    PacketEnd {
        packet: Rc<Packet>,
        clock_snapshot: Option<ClockSnapshot>,
    },
    MessageIteratorInactivity {
        clock_snapshot: ClockSnapshot,
    },
    DiscardedPackets(DiscardedItems),
    StreamEnd {
        stream: Rc<Stream>,
        clock_snapshot: Option<ClockSnapshot>,
    },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::StreamBeginning { .. } => MessageKind::StreamBeginning,
            MessageBody::PacketBeginning { .. } => MessageKind::PacketBeginning,
            MessageBody::Event { .. } => MessageKind::Event,
            MessageBody::DiscardedEvents(_) => MessageKind::DiscardedEvents,
            MessageBody::PacketEnd { .. } => MessageKind::PacketEnd,
            MessageBody::MessageIteratorInactivity { .. } => {
                MessageKind::MessageIteratorInactivity
            }
            MessageBody::DiscardedPackets(_) => MessageKind::DiscardedPackets,
            MessageBody::StreamEnd { .. } => MessageKind::StreamEnd,
        }
    }

    /// Stream this message belongs to; `None` only for inactivity messages.
    pub fn stream(&self) -> Option<&Rc<Stream>> {
        match self {
            MessageBody::StreamBeginning { stream, .. } | MessageBody::StreamEnd { stream, .. } => {
                Some(stream)
            }
            MessageBody::PacketBeginning { packet, .. } | MessageBody::PacketEnd { packet, .. } => {
                Some(&packet.stream)
            }
            MessageBody::Event { event, .. } => Some(&event.stream),
            MessageBody::DiscardedEvents(items) | MessageBody::DiscardedPackets(items) => {
                Some(&items.stream)
            }
            MessageBody::MessageIteratorInactivity { .. } => None,
        }
    }

    /// The snapshot that places this message in time. Discarded-item
    /// messages are placed at the beginning of their range.
    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        match self {
            MessageBody::StreamBeginning { clock_snapshot, .. }
            | MessageBody::PacketBeginning { clock_snapshot, .. }
            | MessageBody::Event { clock_snapshot, .. }
            | MessageBody::PacketEnd { clock_snapshot, .. }
            | MessageBody::StreamEnd { clock_snapshot, .. } => clock_snapshot.as_ref(),
            MessageBody::DiscardedEvents(items) | MessageBody::DiscardedPackets(items) => {
                items.beginning.as_ref()
            }
            MessageBody::MessageIteratorInactivity { clock_snapshot } => Some(clock_snapshot),
        }
    }

    /// Clock class this message's lineage is checked against.
    pub fn clock_class(&self) -> Option<&Rc<ClockClass>> {
        match self {
            MessageBody::MessageIteratorInactivity { clock_snapshot } => {
                Some(clock_snapshot.class())
            }
            other => other
                .stream()
                .and_then(|stream| stream.default_clock_class()),
        }
    }

    /// Nanoseconds from origin of the default clock snapshot, if any.
    pub fn ns_from_origin(&self) -> GraphResult<Option<i64>> {
        self.default_clock_snapshot()
            .map(ClockSnapshot::try_ns_from_origin)
            .transpose()
    }
}

/// Owned handle to a (possibly pooled) message.
pub struct Message {
    /// Taken on drop to hand the allocation back to its pool.
    slot: Option<Slot<MessageBody>>,
    pools: Weak<MessagePools>,
}

impl Message {
    /// A message outside any pool, freed when dropped.
    pub fn unpooled(body: MessageBody) -> Self {
        Self {
            slot: Some(Box::new(Some(body))),
            pools: Weak::new(),
        }
    }

    pub(crate) fn pooled(slot: Slot<MessageBody>, pools: Weak<MessagePools>) -> Self {
        Self {
            slot: Some(slot),
            pools,
        }
    }

    pub fn body(&self) -> &MessageBody {
        self.slot
            .as_deref()
            .and_then(Option::as_ref)
            .expect("message body is present until the message is dropped")
    }

    pub fn kind(&self) -> MessageKind {
        self.body().kind()
    }

    pub fn stream(&self) -> Option<&Rc<Stream>> {
        self.body().stream()
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.body().default_clock_snapshot()
    }

    pub fn clock_class(&self) -> Option<&Rc<ClockClass>> {
        self.body().clock_class()
    }

    pub fn ns_from_origin(&self) -> GraphResult<Option<i64>> {
        self.body().ns_from_origin()
    }

    /// A copy of the payload, e.g. to rebuild a modified message.
    pub fn to_body(&self) -> MessageBody {
        self.body().clone()
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let (Some(slot), Some(pools)) = (self.slot.take(), self.pools.upgrade()) {
            pools.recycle(slot);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind())
            .field(
                "clock_snapshot",
                &self.default_clock_snapshot().map(ClockSnapshot::value),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with_clock(clock: Option<Rc<ClockClass>>) -> Rc<Stream> {
        let mut class = StreamClass::new(0);
        class.default_clock_class = clock;
        Rc::new(Stream::new(0, Rc::new(class), Rc::new(Trace::new())))
    }

    #[test]
    fn test_kind_priority_order() {
        assert!(MessageKind::StreamBeginning < MessageKind::PacketBeginning);
        assert!(MessageKind::Event < MessageKind::DiscardedEvents);
        assert!(MessageKind::MessageIteratorInactivity < MessageKind::DiscardedPackets);
        assert!(MessageKind::DiscardedPackets < MessageKind::StreamEnd);
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_discarded_uses_beginning_snapshot() {
        let clock = Rc::new(ClockClass::new());
        let stream = stream_with_clock(Some(Rc::clone(&clock)));
        let msg = Message::unpooled(MessageBody::DiscardedEvents(DiscardedItems {
            stream,
            beginning: Some(ClockSnapshot::new(Rc::clone(&clock), 100)),
            end: Some(ClockSnapshot::new(clock, 200)),
            count: Some(3),
        }));
        assert_eq!(msg.ns_from_origin().unwrap(), Some(100));
        assert_eq!(msg.kind(), MessageKind::DiscardedEvents);
    }

    #[test]
    fn test_clock_class_comes_from_stream_class() {
        let clock = Rc::new(ClockClass::new().with_name("monotonic"));
        let stream = stream_with_clock(Some(clock));
        let msg = Message::unpooled(MessageBody::StreamBeginning {
            stream,
            clock_snapshot: None,
        });
        assert_eq!(msg.clock_class().and_then(|cc| cc.name()), Some("monotonic"));
        assert_eq!(msg.ns_from_origin().unwrap(), None);
    }

    #[test]
    fn test_inactivity_has_no_stream() {
        let clock = Rc::new(ClockClass::new());
        let msg = Message::unpooled(MessageBody::MessageIteratorInactivity {
            clock_snapshot: ClockSnapshot::new(clock, 42),
        });
        assert!(msg.stream().is_none());
        assert!(msg.clock_class().is_some());
        assert_eq!(msg.ns_from_origin().unwrap(), Some(42));
    }
}
