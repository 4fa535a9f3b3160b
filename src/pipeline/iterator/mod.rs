//! Message iterators: per-connection pull cursors.
//!
//! A [`MessageIterator`] wraps a user [`MessageIteratorImpl`] and enforces the
//! pull protocol around it: the state machine, the batch bound, sticky end,
//! seeking (with an emulated time seek, see [`seek`]) and finalization.
//!
//! ```text
//! NonInitialized ──► Active ──► Ended
//!                      │ ▲
//!                      ▼ │
//!                    Seeking ──► LastSeekReturnedAgain / LastSeekReturnedError
//!
//! any ──► Finalizing ──► Finalized
//! ```

pub mod seek;

use crate::pipeline::context::{IteratorContext, IteratorInit};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::graph::{GraphInner, GraphState};
use crate::pipeline::id::{ComponentId, IteratorId, PortId};
use crate::pipeline::message::{ClockExpectation, Message, MessageBatch};
use crate::pipeline::port::PortDirection;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Status of one `next` call of an iterator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStatus {
    /// The batch holds at least one message.
    Ok,
    /// Nothing available right now; the batch is empty.
    Again,
    /// No more messages, ever; the batch is empty.
    End,
}

/// Status of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    Ok,
    /// Could not complete now; seek again later.
    Again,
}

/// Seek operations an iterator implementation supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekCapabilities {
    pub beginning: bool,
    pub ns_from_origin: bool,
    /// After seeking to the beginning, the messages come back in the same
    /// order, so the engine may fast-forward to emulate a time seek.
    pub forward: bool,
}

impl SeekCapabilities {
    pub const NONE: Self = Self {
        beginning: false,
        ns_from_origin: false,
        forward: false,
    };
}

/// Messages returned by [`MessageIterator::next`].
#[derive(Debug)]
pub enum Pull {
    Messages(Vec<Message>),
    Again,
    End,
}

/// User side of a message iterator.
///
/// `next` fills `batch` (never beyond its capacity) and returns
/// [`NextStatus::Ok`], or leaves it empty and returns `Again`/`End`.
pub trait MessageIteratorImpl {
    fn next(
        &mut self,
        ctx: &mut IteratorContext<'_>,
        batch: &mut MessageBatch,
    ) -> GraphResult<NextStatus>;

    fn seek_capabilities(&self) -> SeekCapabilities {
        SeekCapabilities::NONE
    }

    /// Only consulted when `seek_capabilities().beginning` is set.
    fn can_seek_beginning(&mut self) -> GraphResult<bool> {
        Ok(true)
    }

    fn seek_beginning(&mut self, _ctx: &mut IteratorContext<'_>) -> GraphResult<SeekStatus> {
        Err(GraphError::CannotSeek("to the beginning".into()))
    }

    /// Only consulted when `seek_capabilities().ns_from_origin` is set.
    fn can_seek_ns_from_origin(&mut self, _ns_from_origin: i64) -> GraphResult<bool> {
        Ok(true)
    }

    fn seek_ns_from_origin(
        &mut self,
        _ctx: &mut IteratorContext<'_>,
        ns_from_origin: i64,
    ) -> GraphResult<SeekStatus> {
        Err(GraphError::CannotSeek(format!(
            "to {} ns from origin",
            ns_from_origin
        )))
    }

    fn finalize(&mut self) {}
}

/// State of a message iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    NonInitialized,
    Active,
    Ended,
    Seeking,
    LastSeekReturnedAgain,
    LastSeekReturnedError,
    Finalizing,
    Finalized,
}

/// Messages queued by an emulated seek, delivered before pulling upstream
/// again.
pub(crate) struct Replay {
    pub queue: VecDeque<Message>,
    /// Upstream already ended while fast-forwarding.
    pub then_end: bool,
}

/// A pull cursor on one connection.
pub struct MessageIterator {
    id: IteratorId,
    graph: Weak<GraphInner>,
    component: ComponentId,
    component_name: String,
    port_name: String,
    state: IteratorState,
    imp: Option<Box<dyn MessageIteratorImpl>>,
    batch: MessageBatch,
    last_ns_from_origin: Option<i64>,
    clock_expectation: ClockExpectation,
    replay: Option<Replay>,
}

impl MessageIterator {
    /// Create an iterator on `port`, an input port of `owner`, and run the
    /// upstream component's iterator init.
    pub(crate) fn create(
        graph: &Rc<GraphInner>,
        owner: ComponentId,
        port: PortId,
        downstream: Option<IteratorId>,
    ) -> GraphResult<Self> {
        match graph.state() {
            GraphState::Faulty => return Err(GraphError::Faulty),
            GraphState::Configuring => return Err(GraphError::NotConfigured),
            GraphState::Destroying => return Err(GraphError::Inactive),
            GraphState::PartiallyConfigured | GraphState::Configured => {}
        }
        assert_eq!(
            port.component(),
            owner,
            "a component can only create message iterators on its own ports"
        );
        assert_eq!(
            graph.port_info(port).direction,
            PortDirection::Input,
            "message iterators are created on input ports"
        );

        let connection = graph
            .port_connection(port)
            .ok_or_else(|| GraphError::PortNotConnected(graph.port_label(port)))?;
        let upstream_port = graph.connections.borrow()[connection.index()].upstream;
        let upstream = upstream_port.component();
        let upstream_info = graph.port_info(upstream_port);

        let id = graph.register_iterator(connection, upstream, downstream);
        let mut iterator = Self {
            id,
            graph: Rc::downgrade(graph),
            component: upstream,
            component_name: graph.component_name(upstream),
            port_name: upstream_info.name.clone(),
            state: IteratorState::NonInitialized,
            imp: None,
            batch: MessageBatch::with_capacity(graph.settings().batch_capacity),
            last_ns_from_origin: None,
            clock_expectation: ClockExpectation::default(),
            replay: None,
        };

        let result = graph.behaviour(upstream).and_then(|behaviour| {
            let mut component = behaviour
                .try_borrow_mut()
                .map_err(|_| GraphError::ComponentBusy(iterator.component_name.clone()))?;
            let mut ctx = IteratorInit::new(graph, upstream, id);
            component.create_message_iterator(&mut ctx, &upstream_info)
        });

        match result {
            Ok(imp) => {
                iterator.imp = Some(imp);
                iterator.state = IteratorState::Active;
                tracing::debug!(
                    "Created message iterator {} on {}.{}",
                    id,
                    iterator.component_name,
                    iterator.port_name
                );
                Ok(iterator)
            }
            Err(e) => {
                let context = format!(
                    "Component {:?} failed to initialize a message iterator on port {:?}",
                    iterator.component_name, iterator.port_name
                );
                iterator.finalize();
                Err(e.with_context(context))
            }
        }
    }

    pub fn id(&self) -> IteratorId {
        self.id
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Upstream component producing this iterator's messages.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// Most messages one `next` call returns.
    pub fn capacity(&self) -> usize {
        self.batch.capacity()
    }

    /// Time of the last returned message, as tracked for ordering checks.
    pub fn last_ns_from_origin(&self) -> Option<i64> {
        self.last_ns_from_origin
    }

    /// Pull the next batch.
    ///
    /// Panics unless the iterator is active or ended. Once `End` is returned
    /// every later call returns `End` without calling upstream.
    pub fn next(&mut self) -> GraphResult<Pull> {
        match self.state {
            IteratorState::Active => {}
            IteratorState::Ended => return Ok(Pull::End),
            state => panic!(
                "next() called on message iterator {} of component {:?} in state {:?}",
                self.id, self.component_name, state
            ),
        }
        let graph = self.graph.upgrade().ok_or(GraphError::Inactive)?;

        if let Some(messages) = self.drain_replay() {
            return Ok(messages);
        }

        let mut ctx = IteratorContext::new(&graph, self.batch.capacity());
        let imp = self
            .imp
            .as_mut()
            .expect("an active message iterator has an implementation");
        let status = imp.next(&mut ctx, &mut self.batch);

        match status {
            Ok(NextStatus::Ok) => {
                assert!(
                    !self.batch.is_empty(),
                    "message iterator of component {:?} returned Ok without messages",
                    self.component_name
                );
                let messages: Vec<Message> = self.batch.drain().collect();
                self.check_postconditions(&messages);
                tracing::trace!(
                    "Iterator {} of {:?} returned {} message(s)",
                    self.id,
                    self.component_name,
                    messages.len()
                );
                Ok(Pull::Messages(messages))
            }
            Ok(NextStatus::Again) => {
                assert!(
                    self.batch.is_empty(),
                    "message iterator of component {:?} returned Again with messages",
                    self.component_name
                );
                Ok(Pull::Again)
            }
            Ok(NextStatus::End) => {
                assert!(
                    self.batch.is_empty(),
                    "message iterator of component {:?} returned End with messages",
                    self.component_name
                );
                tracing::debug!("Iterator {} of {:?} ended", self.id, self.component_name);
                self.state = IteratorState::Ended;
                Ok(Pull::End)
            }
            Err(e) => {
                self.batch.clear();
                Err(e.with_context(format!(
                    "Message iterator of component {:?} (port {:?}) failed",
                    self.component_name, self.port_name
                )))
            }
        }
    }

    /// Serve queued replay messages, if any.
    fn drain_replay(&mut self) -> Option<Pull> {
        let replay = self.replay.as_mut()?;
        if replay.queue.is_empty() {
            let then_end = replay.then_end;
            self.replay = None;
            if then_end {
                self.state = IteratorState::Ended;
                return Some(Pull::End);
            }
            return None;
        }

        let take = replay.queue.len().min(self.batch.capacity());
        let messages: Vec<Message> = replay.queue.drain(..take).collect();
        // Keep an empty replay around when it still has to report the end.
        if replay.queue.is_empty() && !replay.then_end {
            self.replay = None;
        }
        self.check_postconditions(&messages);
        Some(Pull::Messages(messages))
    }

    /// Debug-build checks: stable clock lineage and non-decreasing time.
    fn check_postconditions(&mut self, messages: &[Message]) {
        if !cfg!(debug_assertions) {
            return;
        }
        for msg in messages {
            if let Err(e) = self.clock_expectation.validate(msg.clock_class()) {
                panic!(
                    "message iterator of component {:?} returned a {} message with an unexpected clock class: {}",
                    self.component_name,
                    msg.kind(),
                    e
                );
            }
            if let Ok(Some(ns)) = msg.ns_from_origin() {
                if let Some(last) = self.last_ns_from_origin {
                    assert!(
                        ns >= last,
                        "message iterator of component {:?} went back in time: {} ns < {} ns",
                        self.component_name,
                        ns,
                        last
                    );
                }
                self.last_ns_from_origin = Some(ns);
            }
        }
    }

    fn reset_tracking(&mut self) {
        self.last_ns_from_origin = None;
        self.clock_expectation.reset();
    }

    fn assert_seekable_state(&self, operation: &str) {
        assert!(
            matches!(
                self.state,
                IteratorState::Active
                    | IteratorState::Ended
                    | IteratorState::LastSeekReturnedAgain
                    | IteratorState::LastSeekReturnedError
            ),
            "{} called on message iterator {} of component {:?} in state {:?}",
            operation,
            self.id,
            self.component_name,
            self.state
        );
    }

    fn capabilities(&self) -> SeekCapabilities {
        self.imp
            .as_ref()
            .map_or(SeekCapabilities::NONE, |imp| imp.seek_capabilities())
    }

    pub fn can_seek_forward(&self) -> bool {
        self.capabilities().forward
    }

    pub fn can_seek_beginning(&mut self) -> GraphResult<bool> {
        self.assert_seekable_state("can_seek_beginning()");
        if !self.capabilities().beginning {
            return Ok(false);
        }
        match self.imp.as_mut() {
            Some(imp) => imp.can_seek_beginning(),
            None => Ok(false),
        }
    }

    pub fn seek_beginning(&mut self) -> GraphResult<SeekStatus> {
        self.assert_seekable_state("seek_beginning()");
        if !self.capabilities().beginning {
            return Err(GraphError::CannotSeek(format!(
                "to the beginning: component {:?} does not support it",
                self.component_name
            )));
        }
        let graph = self.graph.upgrade().ok_or(GraphError::Inactive)?;

        self.state = IteratorState::Seeking;
        self.replay = None;
        self.batch.clear();
        let mut ctx = IteratorContext::new(&graph, self.batch.capacity());
        let result = match self.imp.as_mut() {
            Some(imp) => imp.seek_beginning(&mut ctx),
            None => unreachable!("a seekable iterator has an implementation"),
        };
        self.finish_seek(result, None)
    }

    /// Whether seeking to `ns_from_origin` is possible, natively or by
    /// seeking to the beginning and fast-forwarding.
    pub fn can_seek_ns_from_origin(&mut self, ns_from_origin: i64) -> GraphResult<bool> {
        self.assert_seekable_state("can_seek_ns_from_origin()");
        let caps = self.capabilities();
        if caps.ns_from_origin {
            if let Some(imp) = self.imp.as_mut() {
                if imp.can_seek_ns_from_origin(ns_from_origin)? {
                    return Ok(true);
                }
            }
        }
        Ok(caps.forward && self.can_seek_beginning()?)
    }

    pub fn seek_ns_from_origin(&mut self, ns_from_origin: i64) -> GraphResult<SeekStatus> {
        self.assert_seekable_state("seek_ns_from_origin()");
        let graph = self.graph.upgrade().ok_or(GraphError::Inactive)?;
        let caps = self.capabilities();

        let native = caps.ns_from_origin
            && match self.imp.as_mut() {
                Some(imp) => imp.can_seek_ns_from_origin(ns_from_origin)?,
                None => false,
            };

        self.replay = None;
        self.batch.clear();
        if native {
            self.state = IteratorState::Seeking;
            let mut ctx = IteratorContext::new(&graph, self.batch.capacity());
            let result = match self.imp.as_mut() {
                Some(imp) => imp.seek_ns_from_origin(&mut ctx, ns_from_origin),
                None => unreachable!("a seekable iterator has an implementation"),
            };
            return self.finish_seek(result, Some(ns_from_origin));
        }

        if !(caps.beginning && caps.forward && self.can_seek_beginning()?) {
            return Err(GraphError::CannotSeek(format!(
                "to {} ns from origin: component {:?} supports neither that nor seeking forward from the beginning",
                ns_from_origin, self.component_name
            )));
        }
        seek::auto_seek(self, &graph, ns_from_origin)
    }

    fn finish_seek(
        &mut self,
        result: GraphResult<SeekStatus>,
        ns_from_origin: Option<i64>,
    ) -> GraphResult<SeekStatus> {
        match result {
            Ok(SeekStatus::Ok) => {
                self.reset_tracking();
                self.last_ns_from_origin = ns_from_origin;
                self.state = IteratorState::Active;
                Ok(SeekStatus::Ok)
            }
            Ok(SeekStatus::Again) => {
                self.state = IteratorState::LastSeekReturnedAgain;
                Ok(SeekStatus::Again)
            }
            Err(e) => {
                self.state = IteratorState::LastSeekReturnedError;
                Err(e.with_context(format!(
                    "Message iterator of component {:?} failed to seek",
                    self.component_name
                )))
            }
        }
    }

    /// Run the user finalizer (if init succeeded) and detach from the graph.
    /// Idempotent; also runs on drop.
    pub fn finalize(&mut self) {
        match self.state {
            IteratorState::Finalizing | IteratorState::Finalized => return,
            _ => {}
        }
        self.state = IteratorState::Finalizing;
        self.replay = None;
        self.batch.clear();

        // Dropping the implementation finalizes the upstream iterators it owns.
        if let Some(mut imp) = self.imp.take() {
            imp.finalize();
        }
        if let Some(graph) = self.graph.upgrade() {
            graph.detach_iterator(self.id);
        }
        self.state = IteratorState::Finalized;
        tracing::trace!("Finalized message iterator {}", self.id);
    }
}

impl Drop for MessageIterator {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl std::fmt::Debug for MessageIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageIterator")
            .field("id", &self.id)
            .field("component", &self.component_name)
            .field("port", &self.port_name)
            .field("state", &self.state)
            .finish()
    }
}
