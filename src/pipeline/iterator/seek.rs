//! Emulated seek to a point in time.
//!
//! For an iterator that can seek to its beginning and guarantees the same
//! message order afterwards, a time seek is: seek to the beginning, then
//! pull and drop every message before the target while tracking, per stream,
//! whether it has begun and whether a packet is open. The first message at
//! or after the target, with the rest of its batch, is queued for replay.
//! Streams still open at that point get synthesized beginning messages so
//! downstream sees well-formed sequences.

use super::{IteratorState, MessageIterator, NextStatus, Replay, SeekStatus};
use crate::pipeline::context::IteratorContext;
use crate::pipeline::error::GraphResult;
use crate::pipeline::graph::GraphInner;
use crate::pipeline::message::{
    ClockSnapshot, DiscardedItems, Message, MessageBody, Packet, Stream,
};
use crate::pipeline::pool::MessageFactory;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::rc::Rc;

/// What fast-forwarding learned about one stream.
#[derive(Debug)]
struct StreamSeekState {
    stream: Rc<Stream>,
    packet: Option<Rc<Packet>>,
    /// A real clock snapshot was seen on this stream.
    clock_seen: bool,
}

/// Streams that have begun, keyed by identity, in beginning order.
#[derive(Debug, Default)]
struct StreamStates(IndexMap<usize, StreamSeekState>);

impl StreamStates {
    fn key(stream: &Rc<Stream>) -> usize {
        Rc::as_ptr(stream) as usize
    }

    /// Account for a message dropped before the target.
    fn observe(&mut self, msg: &Message) {
        let has_snapshot = msg.default_clock_snapshot().is_some();
        match msg.body() {
            MessageBody::StreamBeginning { stream, .. } => {
                self.0.insert(
                    Self::key(stream),
                    StreamSeekState {
                        stream: Rc::clone(stream),
                        packet: None,
                        clock_seen: has_snapshot,
                    },
                );
            }
            MessageBody::StreamEnd { stream, .. } => {
                self.0.shift_remove(&Self::key(stream));
            }
            MessageBody::PacketBeginning { packet, .. } => {
                if let Some(state) = self.0.get_mut(&Self::key(&packet.stream)) {
                    state.packet = Some(Rc::clone(packet));
                    state.clock_seen |= has_snapshot;
                }
            }
            MessageBody::PacketEnd { packet, .. } => {
                if let Some(state) = self.0.get_mut(&Self::key(&packet.stream)) {
                    state.packet = None;
                    state.clock_seen |= has_snapshot;
                }
            }
            MessageBody::Event { .. }
            | MessageBody::DiscardedEvents(_)
            | MessageBody::DiscardedPackets(_) => {
                if let Some(stream) = msg.stream() {
                    if let Some(state) = self.0.get_mut(&Self::key(stream)) {
                        state.clock_seen |= has_snapshot;
                    }
                }
            }
            MessageBody::MessageIteratorInactivity { .. } => {}
        }
    }

    /// Beginning messages restoring every open stream at `target`.
    ///
    /// Snapshots are rounded down on each stream's clock, so streams on
    /// different clocks are ordered by their converted time.
    fn reconstruct(&self, factory: &MessageFactory, target: i64) -> Vec<Message> {
        let mut groups: Vec<(i64, Vec<Message>)> = Vec::with_capacity(self.0.len());
        for state in self.0.values() {
            let snapshot = || {
                if !state.clock_seen {
                    return None;
                }
                state
                    .stream
                    .default_clock_class()
                    .and_then(|cc| ClockSnapshot::at_ns_from_origin(cc, target))
            };
            let stream_beginning = factory.create(MessageBody::StreamBeginning {
                stream: Rc::clone(&state.stream),
                clock_snapshot: snapshot(),
            });
            let ns = stream_beginning
                .ns_from_origin()
                .ok()
                .flatten()
                .unwrap_or(i64::MIN);
            let mut group = vec![stream_beginning];
            if let Some(packet) = &state.packet {
                group.push(factory.create(MessageBody::PacketBeginning {
                    packet: Rc::clone(packet),
                    clock_snapshot: snapshot(),
                }));
            }
            groups.push((ns, group));
        }
        groups.sort_by_key(|(ns, _)| *ns);
        groups.into_iter().flat_map(|(_, group)| group).collect()
    }
}

/// Whether `msg` lies entirely before `target`. A discarded-items message
/// whose range straddles the target is rewritten to start at it.
fn classify(msg: Message, target: i64, factory: &MessageFactory) -> GraphResult<Classified> {
    let Some(ns) = msg.ns_from_origin()? else {
        return Ok(Classified::Before(msg));
    };
    if ns >= target {
        return Ok(Classified::AtOrAfter(msg));
    }

    let straddling = match msg.body() {
        MessageBody::DiscardedEvents(items) | MessageBody::DiscardedPackets(items) => {
            match &items.end {
                Some(end) => end.try_ns_from_origin()? >= target,
                None => false,
            }
        }
        _ => false,
    };
    if !straddling {
        return Ok(Classified::Before(msg));
    }

    let rewritten = match msg.to_body() {
        MessageBody::DiscardedEvents(items) => {
            MessageBody::DiscardedEvents(move_beginning(items, target))
        }
        MessageBody::DiscardedPackets(items) => {
            MessageBody::DiscardedPackets(move_beginning(items, target))
        }
        other => other,
    };
    Ok(Classified::AtOrAfter(factory.create(rewritten)))
}

/// Move the beginning of a straddling range to the first clock value at or
/// after `target`, never past the range's end.
fn move_beginning(mut items: DiscardedItems, target: i64) -> DiscardedItems {
    let Some(class) = items.beginning.as_ref().map(|begin| Rc::clone(begin.class())) else {
        return items;
    };
    let Some(mut value) = class.cycles_at_ns_from_origin(target) else {
        return items;
    };
    if class.ns_from_origin(value).is_some_and(|ns| ns < target) {
        value = value.saturating_add(1);
    }
    if let Some(end) = &items.end {
        value = value.min(end.value());
    }
    items.beginning = Some(ClockSnapshot::new(class, value));
    items
}

enum Classified {
    Before(Message),
    AtOrAfter(Message),
}

/// Seek `iterator` to `target` ns from origin by seeking to the beginning
/// and fast-forwarding.
pub(super) fn auto_seek(
    iterator: &mut MessageIterator,
    graph: &Rc<GraphInner>,
    target: i64,
) -> GraphResult<SeekStatus> {
    iterator.state = IteratorState::Seeking;
    let capacity = iterator.batch.capacity();
    let mut ctx = IteratorContext::new(graph, capacity);
    let factory = graph.message_factory();

    let result = match iterator.imp.as_mut() {
        Some(imp) => imp.seek_beginning(&mut ctx),
        None => unreachable!("a seekable iterator has an implementation"),
    };
    match result {
        Ok(SeekStatus::Ok) => {}
        other => return iterator.finish_seek(other, None),
    }

    let mut streams = StreamStates::default();
    let mut reached: Option<VecDeque<Message>> = None;
    let mut upstream_ended = false;

    while reached.is_none() {
        iterator.batch.clear();
        let status = match iterator.imp.as_mut() {
            Some(imp) => imp.next(&mut ctx, &mut iterator.batch),
            None => unreachable!("a seekable iterator has an implementation"),
        };
        match status {
            Ok(NextStatus::Ok) => {}
            Ok(NextStatus::Again) => {
                tracing::debug!(
                    "Upstream of {:?} answered again while seeking to {} ns",
                    iterator.component_name,
                    target
                );
                return iterator.finish_seek(Ok(SeekStatus::Again), None);
            }
            Ok(NextStatus::End) => {
                upstream_ended = true;
                break;
            }
            Err(e) => return iterator.finish_seek(Err(e), None),
        }

        let mut batch = iterator.batch.drain().collect::<VecDeque<_>>();
        while let Some(msg) = batch.pop_front() {
            match classify(msg, target, &factory) {
                Ok(Classified::Before(msg)) => streams.observe(&msg),
                Ok(Classified::AtOrAfter(msg)) => {
                    batch.push_front(msg);
                    reached = Some(batch);
                    break;
                }
                Err(e) => return iterator.finish_seek(Err(e), None),
            }
        }
    }

    let mut queue: VecDeque<Message> = streams.reconstruct(&factory, target).into();
    if let Some(rest) = reached {
        queue.extend(rest);
    }
    // Rounded reconstruction snapshots may sit just before the target.
    let queued_min = queue
        .iter()
        .filter_map(|m| m.ns_from_origin().ok().flatten())
        .min();

    iterator.reset_tracking();
    if queue.is_empty() && upstream_ended {
        iterator.state = IteratorState::Ended;
        tracing::debug!(
            "Iterator of {:?} ended before reaching {} ns",
            iterator.component_name,
            target
        );
        return Ok(SeekStatus::Ok);
    }

    iterator.last_ns_from_origin = Some(queued_min.map_or(target, |ns| ns.min(target)));
    tracing::debug!(
        "Seeked iterator of {:?} to {} ns; replaying {} message(s)",
        iterator.component_name,
        target,
        queue.len()
    );
    iterator.replay = Some(Replay {
        queue,
        then_end: upstream_ended,
    });
    iterator.state = IteratorState::Active;
    Ok(SeekStatus::Ok)
}
