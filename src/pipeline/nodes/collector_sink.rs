//! CollectorSink: stores every message it pulls from its `in` port.

use crate::pipeline::component::{ComponentClass, ConsumeStatus, SinkComponent};
use crate::pipeline::context::SelfComponent;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::iterator::{MessageIterator, Pull};
use crate::pipeline::message::{Message, MessageKind};
use std::cell::RefCell;
use std::rc::Rc;

pub const COLLECTOR_SINK_CLASS_NAME: &str = "collector";

/// Shared handle on the collected messages.
#[derive(Debug, Clone, Default)]
pub struct Collected(Rc<RefCell<Vec<Message>>>);

impl Collected {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.0.borrow().iter().map(Message::kind).collect()
    }

    /// Nanoseconds from origin of each message, `None` when it has no
    /// clock snapshot.
    pub fn timestamps(&self) -> Vec<Option<i64>> {
        self.0
            .borrow()
            .iter()
            .map(|m| m.ns_from_origin().ok().flatten())
            .collect()
    }

    /// Run `f` over the collected messages.
    pub fn with<R>(&self, f: impl FnOnce(&[Message]) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Take the collected messages, leaving the handle empty.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    fn extend(&self, messages: Vec<Message>) {
        self.0.borrow_mut().extend(messages);
    }
}

/// A collector sink class storing messages into `collected`.
pub fn class(collected: Collected) -> ComponentClass {
    ComponentClass::sink(COLLECTOR_SINK_CLASS_NAME, move |ctx, _params| {
        ctx.add_input_port("in")?;
        Ok(Box::new(CollectorSink {
            collected: collected.clone(),
            iterator: None,
        }))
    })
    .with_description("Keep every consumed message in memory")
}

pub struct CollectorSink {
    collected: Collected,
    iterator: Option<MessageIterator>,
}

impl SinkComponent for CollectorSink {
    fn graph_is_configured(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
        let port = ctx
            .input_port("in")
            .ok_or_else(|| GraphError::PortNotConnected(format!("{}.in", ctx.name())))?;
        self.iterator = Some(ctx.create_message_iterator(port.id)?);
        Ok(())
    }

    fn consume(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus> {
        let Some(iterator) = self.iterator.as_mut() else {
            return Ok(ConsumeStatus::End);
        };
        match iterator.next()? {
            Pull::Messages(messages) => {
                self.collected.extend(messages);
                Ok(ConsumeStatus::Ok)
            }
            Pull::Again => Ok(ConsumeStatus::Again),
            Pull::End => Ok(ConsumeStatus::End),
        }
    }

    fn finalize(&mut self) {
        self.iterator = None;
    }
}
