//! Test data builders for streams and message sequences

use std::rc::Rc;
use tracegraph_rs::pipeline::{
    ClockClass, ClockSnapshot, DiscardedItems, Event, EventClass, MessageBody, Packet, Stream,
    StreamClass, Trace,
};
use uuid::Uuid;

/// Builder for creating test streams
pub struct StreamBuilder {
    id: u64,
    class_id: u64,
    trace_name: Option<String>,
    trace_uuid: Option<Uuid>,
    clock: Option<Rc<ClockClass>>,
}

impl StreamBuilder {
    /// A stream on a 1 GHz clock whose origin is the Unix epoch
    pub fn new(id: u64) -> Self {
        Self {
            id,
            class_id: 0,
            trace_name: None,
            trace_uuid: None,
            clock: Some(Rc::new(ClockClass::new())),
        }
    }

    pub fn class_id(mut self, class_id: u64) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn trace_name(mut self, name: &str) -> Self {
        self.trace_name = Some(name.to_string());
        self
    }

    pub fn trace_uuid(mut self, uuid: Uuid) -> Self {
        self.trace_uuid = Some(uuid);
        self
    }

    pub fn clock(mut self, clock: Rc<ClockClass>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn no_clock(mut self) -> Self {
        self.clock = None;
        self
    }

    pub fn build(self) -> Rc<Stream> {
        let mut class = StreamClass::new(self.class_id)
            .with_packets(true)
            .with_discarded_events(true);
        if let Some(clock) = self.clock {
            class = class.with_default_clock_class(clock);
        }
        let mut trace = Trace::new();
        if let Some(name) = self.trace_name {
            trace = trace.with_name(name);
        }
        if let Some(uuid) = self.trace_uuid {
            trace = trace.with_uuid(uuid);
        }
        Rc::new(Stream::new(self.id, Rc::new(class), Rc::new(trace)))
    }
}

/// Builder for the message sequence of one stream
pub struct SequenceBuilder {
    stream: Rc<Stream>,
    packet: Option<Rc<Packet>>,
    bodies: Vec<MessageBody>,
}

impl SequenceBuilder {
    pub fn new(stream: Rc<Stream>) -> Self {
        Self {
            stream,
            packet: None,
            bodies: Vec::new(),
        }
    }

    fn snapshot(&self, value: Option<u64>) -> Option<ClockSnapshot> {
        let clock = self.stream.default_clock_class()?;
        value.map(|v| ClockSnapshot::new(Rc::clone(clock), v))
    }

    pub fn begin(mut self, value: Option<u64>) -> Self {
        let clock_snapshot = self.snapshot(value);
        self.bodies.push(MessageBody::StreamBeginning {
            stream: Rc::clone(&self.stream),
            clock_snapshot,
        });
        self
    }

    pub fn end(mut self, value: Option<u64>) -> Self {
        let clock_snapshot = self.snapshot(value);
        self.bodies.push(MessageBody::StreamEnd {
            stream: Rc::clone(&self.stream),
            clock_snapshot,
        });
        self
    }

    pub fn packet_begin(mut self, value: Option<u64>) -> Self {
        let packet = Rc::new(Packet::new(Rc::clone(&self.stream)));
        let clock_snapshot = self.snapshot(value);
        self.bodies.push(MessageBody::PacketBeginning {
            packet: Rc::clone(&packet),
            clock_snapshot,
        });
        self.packet = Some(packet);
        self
    }

    pub fn packet_end(mut self, value: Option<u64>) -> Self {
        let packet = self
            .packet
            .take()
            .expect("packet_end() without an open packet");
        let clock_snapshot = self.snapshot(value);
        self.bodies.push(MessageBody::PacketEnd {
            packet,
            clock_snapshot,
        });
        self
    }

    pub fn event(mut self, class_id: u64, value: u64) -> Self {
        let class = Rc::new(EventClass::new(class_id));
        let event = match &self.packet {
            Some(packet) => Event::in_packet(class, Rc::clone(packet)),
            None => Event::new(class, Rc::clone(&self.stream)),
        };
        let clock_snapshot = self.snapshot(Some(value));
        self.bodies.push(MessageBody::Event {
            event,
            clock_snapshot,
        });
        self
    }

    pub fn events(self, class_id: u64, values: &[u64]) -> Self {
        values
            .iter()
            .fold(self, |builder, &value| builder.event(class_id, value))
    }

    pub fn discarded_events(mut self, beginning: u64, end: u64, count: u64) -> Self {
        let items = DiscardedItems {
            stream: Rc::clone(&self.stream),
            beginning: self.snapshot(Some(beginning)),
            end: self.snapshot(Some(end)),
            count: Some(count),
        };
        self.bodies.push(MessageBody::DiscardedEvents(items));
        self
    }

    pub fn build(self) -> Vec<MessageBody> {
        self.bodies
    }
}

/// A stream beginning at the first value, one event per value, ending at the
/// last value.
pub fn event_stream(stream_id: u64, values: &[u64]) -> Vec<MessageBody> {
    let first = values.first().copied();
    let last = values.last().copied();
    SequenceBuilder::new(StreamBuilder::new(stream_id).build())
        .begin(first)
        .events(0, values)
        .end(last)
        .build()
}

/// Events only, without stream boundaries.
pub fn bare_events(stream_id: u64, values: &[u64]) -> Vec<MessageBody> {
    SequenceBuilder::new(StreamBuilder::new(stream_id).build())
        .events(0, values)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegraph_rs::pipeline::MessageKind;

    #[test]
    fn test_event_stream_shape() {
        let bodies = event_stream(1, &[3, 4]);
        let kinds: Vec<_> = bodies.iter().map(MessageBody::kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::StreamBeginning,
                MessageKind::Event,
                MessageKind::Event,
                MessageKind::StreamEnd
            ]
        );
    }
}
