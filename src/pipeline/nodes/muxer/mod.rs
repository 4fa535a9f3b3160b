//! Muxer: merges N upstream message sequences into one time-ordered sequence.
//!
//! The component starts with one input port (`in0`) and one output port
//! (`out`). Each time an input port gets connected a fresh one is added
//! (`in1`, `in2`, ...), so producers can be attached one by one.
//!
//! Each output message is chosen among the heads of the upstream queues:
//! lowest nanoseconds from origin first, then [`compare::compare_messages`]
//! on ties, then lowest input port index. A message without a clock
//! snapshot takes the time of the last emitted message.

pub mod compare;

use crate::pipeline::component::{ComponentClass, FilterComponent};
use crate::pipeline::context::{IteratorContext, IteratorInit, SelfComponent};
use crate::pipeline::error::{GraphError, GraphResult, ResultExt};
use crate::pipeline::iterator::{
    MessageIterator, MessageIteratorImpl, NextStatus, Pull, SeekCapabilities, SeekStatus,
};
use crate::pipeline::message::{ClockExpectation, Message, MessageBatch};
use crate::pipeline::port::PortInfo;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Class name of the muxer within the `utils` plugin.
pub const MUXER_CLASS_NAME: &str = "muxer";

const INPUT_PORT_PREFIX: &str = "in";
const OUTPUT_PORT_NAME: &str = "out";

/// The muxer component class.
pub fn class() -> ComponentClass {
    ComponentClass::filter(MUXER_CLASS_NAME, |ctx, _params| {
        ctx.add_input_port(&input_port_name(0))?;
        ctx.add_output_port(OUTPUT_PORT_NAME)?;
        Ok(Box::new(Muxer))
    })
    .with_description("Sort messages from multiple input ports to a single output port by time")
}

fn input_port_name(index: usize) -> String {
    format!("{}{}", INPUT_PORT_PREFIX, index)
}

/// Muxer component. Stateless: all merge state lives in its iterators.
pub struct Muxer;

impl Muxer {
    /// Keep one unconnected input port available.
    fn ensure_available_input_port(ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
        let ports = ctx.input_ports();
        if ports.iter().any(|p| !p.connected) {
            return Ok(());
        }
        let name = input_port_name(ports.len());
        ctx.add_input_port(&name)?;
        tracing::debug!("Muxer {:?} added input port {:?}", ctx.name(), name);
        Ok(())
    }
}

impl FilterComponent for Muxer {
    fn input_port_connected(
        &mut self,
        ctx: &mut SelfComponent<'_>,
        _port: &PortInfo,
    ) -> GraphResult<()> {
        Self::ensure_available_input_port(ctx)
    }

    fn create_message_iterator(
        &mut self,
        ctx: &mut IteratorInit<'_>,
        _port: &PortInfo,
    ) -> GraphResult<Box<dyn MessageIteratorImpl>> {
        let mut upstreams = Vec::new();
        for port in ctx.input_ports() {
            if !port.connected {
                continue;
            }
            let iterator = ctx.create_message_iterator(port.id)?;
            upstreams.push(Upstream {
                index: port_index(&port.name),
                iterator,
                queue: VecDeque::new(),
            });
        }
        upstreams.sort_by_key(|u| u.index);
        tracing::debug!(
            "Muxer {:?} created a message iterator over {} upstream(s)",
            ctx.component_name(),
            upstreams.len()
        );
        Ok(Box::new(MuxerIterator::new(ctx.component_name(), upstreams)))
    }
}

fn port_index(name: &str) -> usize {
    name.strip_prefix(INPUT_PORT_PREFIX)
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

/// One upstream iterator with its fetched but not yet emitted messages.
struct Upstream {
    index: usize,
    iterator: MessageIterator,
    queue: VecDeque<Message>,
}

/// Outcome of trying to produce one message.
enum Step {
    Message(Message),
    Again,
    End,
}

/// Merging iterator created on the muxer's output port.
pub struct MuxerIterator {
    component_name: String,
    /// Upstreams that may still produce, ordered by input port index.
    live: Vec<Upstream>,
    /// Upstreams that returned end; revived by a seek to the beginning.
    ended: Vec<Upstream>,
    last_ns_from_origin: i64,
    clock_expectation: ClockExpectation,
    /// Error met after messages were already batched, reported next call.
    pending_error: Option<GraphError>,
}

impl MuxerIterator {
    fn new(component_name: String, live: Vec<Upstream>) -> Self {
        Self {
            component_name,
            live,
            ended: Vec::new(),
            last_ns_from_origin: i64::MIN,
            clock_expectation: ClockExpectation::default(),
            pending_error: None,
        }
    }

    /// Pull every live upstream whose queue is empty.
    fn fill_queues(&mut self) -> GraphResult<Option<Step>> {
        let mut i = 0;
        while i < self.live.len() {
            if !self.live[i].queue.is_empty() {
                i += 1;
                continue;
            }
            let upstream = &mut self.live[i];
            match upstream.iterator.next() {
                Ok(Pull::Messages(messages)) => {
                    upstream.queue.extend(messages);
                    i += 1;
                }
                Ok(Pull::Again) => return Ok(Some(Step::Again)),
                Ok(Pull::End) => {
                    let ended = self.live.remove(i);
                    tracing::debug!(
                        "Muxer {:?}: upstream on port {} ended",
                        self.component_name,
                        input_port_name(ended.index)
                    );
                    self.ended.push(ended);
                }
                Err(e) => {
                    return Err(e.with_context(format!(
                        "Muxer {:?} failed to get messages from its upstream on port {}",
                        self.component_name,
                        input_port_name(upstream.index)
                    )))
                }
            }
        }
        if self.live.is_empty() {
            return Ok(Some(Step::End));
        }
        Ok(None)
    }

    /// Index in `live` of the upstream whose head goes out next, with the
    /// head's effective time.
    fn youngest(&mut self) -> GraphResult<(usize, i64)> {
        let mut best: Option<(usize, i64)> = None;
        for i in 0..self.live.len() {
            let head = self.live[i]
                .queue
                .front()
                .expect("live upstream queues are filled before selection");
            self.clock_expectation
                .validate(head.clock_class())
                .with_context(|| {
                    format!(
                        "Muxer {:?} got a {} message with an incompatible clock class",
                        self.component_name,
                        head.kind()
                    )
                })?;
            let ns = head.ns_from_origin()?.unwrap_or(self.last_ns_from_origin);

            let Some((b, best_ns)) = best else {
                best = Some((i, ns));
                continue;
            };
            let replace = match ns.cmp(&best_ns) {
                Ordering::Less => true,
                Ordering::Greater => false,
                Ordering::Equal => {
                    let current = &self.live[b];
                    let current_head = current.queue.front().expect("filled above");
                    match compare::compare_messages(head, current_head) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => {
                            tracing::warn!(
                                "Muxer {:?}: cannot order {} messages from ports {} and {} at {} ns; \
                                 emitting the one from {} first",
                                self.component_name,
                                head.kind(),
                                input_port_name(current.index),
                                input_port_name(self.live[i].index),
                                ns,
                                input_port_name(current.index)
                            );
                            false
                        }
                    }
                }
            };
            if replace {
                best = Some((i, ns));
            }
        }
        Ok(best.expect("at least one live upstream"))
    }

    fn next_message(&mut self) -> GraphResult<Step> {
        if let Some(step) = self.fill_queues()? {
            return Ok(step);
        }
        let (index, ns) = self.youngest()?;
        if ns < self.last_ns_from_origin {
            return Err(GraphError::NonMonotonic {
                last: self.last_ns_from_origin,
                current: ns,
            }
            .with_context(format!(
                "Muxer {:?} got a message going back in time on port {}",
                self.component_name,
                input_port_name(self.live[index].index)
            )));
        }
        self.last_ns_from_origin = ns;
        let msg = self.live[index]
            .queue
            .pop_front()
            .expect("selected upstream has a queued message");
        Ok(Step::Message(msg))
    }

    fn all_upstreams_mut(&mut self) -> impl Iterator<Item = &mut Upstream> {
        self.live.iter_mut().chain(self.ended.iter_mut())
    }
}

impl MessageIteratorImpl for MuxerIterator {
    fn next(
        &mut self,
        _ctx: &mut IteratorContext<'_>,
        batch: &mut MessageBatch,
    ) -> GraphResult<NextStatus> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }

        while !batch.is_full() {
            match self.next_message() {
                Ok(Step::Message(msg)) => batch.push(msg),
                Ok(Step::Again) if batch.is_empty() => return Ok(NextStatus::Again),
                Ok(Step::End) if batch.is_empty() => return Ok(NextStatus::End),
                Ok(Step::Again) | Ok(Step::End) => break,
                Err(e) if batch.is_empty() => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        "Muxer {:?}: delivering {} message(s) before reporting: {}",
                        self.component_name,
                        batch.len(),
                        e
                    );
                    self.pending_error = Some(e);
                    break;
                }
            }
        }
        Ok(NextStatus::Ok)
    }

    fn seek_capabilities(&self) -> SeekCapabilities {
        SeekCapabilities {
            beginning: true,
            ns_from_origin: false,
            forward: self
                .live
                .iter()
                .chain(self.ended.iter())
                .all(|u| u.iterator.can_seek_forward()),
        }
    }

    fn can_seek_beginning(&mut self) -> GraphResult<bool> {
        for upstream in self.all_upstreams_mut() {
            if !upstream.iterator.can_seek_beginning()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn seek_beginning(&mut self, _ctx: &mut IteratorContext<'_>) -> GraphResult<SeekStatus> {
        let name = self.component_name.clone();
        for upstream in self.all_upstreams_mut() {
            let index = upstream.index;
            let status = upstream.iterator.seek_beginning().with_context(|| {
                format!(
                    "Muxer {:?} failed to seek its upstream on port {} to the beginning",
                    name,
                    input_port_name(index)
                )
            })?;
            if status == SeekStatus::Again {
                return Ok(SeekStatus::Again);
            }
        }

        self.live.append(&mut self.ended);
        self.live.sort_by_key(|u| u.index);
        for upstream in &mut self.live {
            upstream.queue.clear();
        }
        self.last_ns_from_origin = i64::MIN;
        self.clock_expectation.reset();
        self.pending_error = None;
        tracing::debug!(
            "Muxer {:?} seeked {} upstream(s) to the beginning",
            self.component_name,
            self.live.len()
        );
        Ok(SeekStatus::Ok)
    }

    fn finalize(&mut self) {
        self.live.clear();
        self.ended.clear();
    }
}
