//! Total order used by the muxer to break timestamp ties.
//!
//! Messages are compared by kind priority first, then by the identity of
//! their stream (trace, stream class, stream, clock class), then by the
//! payload fields specific to their kind. Two messages comparing `Equal`
//! here are indistinguishable to the muxer.

use crate::pipeline::message::{
    ClockClass, ClockSnapshot, DiscardedItems, Message, MessageBody, Stream,
};
use std::cmp::Ordering;
use std::rc::Rc;

/// Compare two messages carrying the same effective timestamp.
pub fn compare_messages(a: &Message, b: &Message) -> Ordering {
    compare_bodies(a.body(), b.body())
}

pub fn compare_bodies(a: &MessageBody, b: &MessageBody) -> Ordering {
    a.kind()
        .cmp(&b.kind())
        .then_with(|| compare_optional_streams(a.stream(), b.stream()))
        .then_with(|| compare_payloads(a, b))
}

fn compare_optional_streams(a: Option<&Rc<Stream>>, b: Option<&Rc<Stream>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_streams(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// Compare two streams by trace, class and own identity.
pub fn compare_streams(a: &Stream, b: &Stream) -> Ordering {
    if std::ptr::eq(a, b) {
        return Ordering::Equal;
    }
    a.trace
        .uuid
        .cmp(&b.trace.uuid)
        .then_with(|| a.trace.name.cmp(&b.trace.name))
        .then_with(|| a.class.id.cmp(&b.class.id))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.class.name.cmp(&b.class.name))
        .then_with(|| a.class.supports_packets.cmp(&b.class.supports_packets))
        .then_with(|| {
            a.class
                .supports_discarded_events
                .cmp(&b.class.supports_discarded_events)
        })
        .then_with(|| {
            a.class
                .supports_discarded_packets
                .cmp(&b.class.supports_discarded_packets)
        })
        .then_with(|| {
            compare_optional_clock_classes(
                a.default_clock_class().map(Rc::as_ref),
                b.default_clock_class().map(Rc::as_ref),
            )
        })
}

fn compare_optional_clock_classes(a: Option<&ClockClass>, b: Option<&ClockClass>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_clock_classes(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

pub fn compare_clock_classes(a: &ClockClass, b: &ClockClass) -> Ordering {
    a.uuid()
        .cmp(&b.uuid())
        .then_with(|| a.name().cmp(&b.name()))
        .then_with(|| a.frequency().cmp(&b.frequency()))
        .then_with(|| a.precision().cmp(&b.precision()))
        .then_with(|| a.offset().cmp(&b.offset()))
        .then_with(|| a.origin_is_unix_epoch().cmp(&b.origin_is_unix_epoch()))
}

fn compare_snapshot_values(a: Option<&ClockSnapshot>, b: Option<&ClockSnapshot>) -> Ordering {
    a.map(ClockSnapshot::value).cmp(&b.map(ClockSnapshot::value))
}

fn compare_discarded(a: &DiscardedItems, b: &DiscardedItems) -> Ordering {
    a.count
        .cmp(&b.count)
        .then_with(|| compare_snapshot_values(a.end.as_ref(), b.end.as_ref()))
        .then_with(|| compare_snapshot_values(a.beginning.as_ref(), b.beginning.as_ref()))
}

/// Kind-specific fields; only called once kinds and streams compare equal.
fn compare_payloads(a: &MessageBody, b: &MessageBody) -> Ordering {
    match (a, b) {
        (MessageBody::Event { event: ea, .. }, MessageBody::Event { event: eb, .. }) => {
            let (ca, cb) = (&ea.class, &eb.class);
            ca.id
                .cmp(&cb.id)
                .then_with(|| ca.name.cmp(&cb.name))
                .then_with(|| ca.log_level.cmp(&cb.log_level))
                .then_with(|| ca.emf_uri.cmp(&cb.emf_uri))
        }
        (MessageBody::DiscardedEvents(da), MessageBody::DiscardedEvents(db))
        | (MessageBody::DiscardedPackets(da), MessageBody::DiscardedPackets(db)) => {
            compare_discarded(da, db)
        }
        (
            MessageBody::MessageIteratorInactivity { clock_snapshot: sa },
            MessageBody::MessageIteratorInactivity { clock_snapshot: sb },
        ) => sa
            .value()
            .cmp(&sb.value())
            .then_with(|| compare_clock_classes(sa.class(), sb.class())),
        _ => Ordering::Equal,
    }
}
