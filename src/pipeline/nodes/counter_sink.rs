//! CounterSink: counts consumed messages per kind and logs the totals.

use crate::pipeline::component::{ComponentClass, ConsumeStatus, SinkComponent};
use crate::pipeline::context::SelfComponent;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::iterator::{MessageIterator, Pull};
use crate::pipeline::message::MessageKind;
use serde::Deserialize;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub const COUNTER_SINK_CLASS_NAME: &str = "counter";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CounterSinkParams {
    /// Log a progress line every `step` messages.
    pub step: Option<u64>,
}

/// Per-kind message counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts([u64; MessageKind::COUNT]);

impl MessageCounts {
    pub fn get(&self, kind: MessageKind) -> u64 {
        self.0[kind.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    fn record(&mut self, kind: MessageKind) {
        self.0[kind.index()] += 1;
    }
}

impl fmt::Display for MessageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in MessageKind::ALL {
            let count = self.get(kind);
            if count == 0 {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", kind, count)?;
            first = false;
        }
        if first {
            f.write_str("no messages")?;
        }
        Ok(())
    }
}

/// Shared view of a counter sink's counts.
#[derive(Debug, Clone, Default)]
pub struct CounterHandle(Rc<Cell<MessageCounts>>);

impl CounterHandle {
    pub fn counts(&self) -> MessageCounts {
        self.0.get()
    }
}

pub fn class() -> ComponentClass {
    class_with_handle(CounterHandle::default())
}

/// A counter sink class publishing its counts to `handle`.
pub fn class_with_handle(handle: CounterHandle) -> ComponentClass {
    ComponentClass::sink(COUNTER_SINK_CLASS_NAME, move |ctx, params| {
        let params: CounterSinkParams = params.decode()?;
        if params.step == Some(0) {
            return Err(GraphError::Params("`step` must be greater than zero".into()));
        }
        ctx.add_input_port("in")?;
        Ok(Box::new(CounterSink {
            step: params.step,
            handle: handle.clone(),
            iterator: None,
        }))
    })
    .with_description("Count messages and print the results")
}

pub struct CounterSink {
    step: Option<u64>,
    handle: CounterHandle,
    iterator: Option<MessageIterator>,
}

impl SinkComponent for CounterSink {
    fn graph_is_configured(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
        let port = ctx
            .input_port("in")
            .ok_or_else(|| GraphError::PortNotConnected(format!("{}.in", ctx.name())))?;
        self.iterator = Some(ctx.create_message_iterator(port.id)?);
        Ok(())
    }

    fn consume(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus> {
        let Some(iterator) = self.iterator.as_mut() else {
            return Ok(ConsumeStatus::End);
        };
        match iterator.next()? {
            Pull::Messages(messages) => {
                let mut counts = self.handle.counts();
                for msg in &messages {
                    counts.record(msg.kind());
                    if let Some(step) = self.step {
                        if counts.total() % step == 0 {
                            tracing::info!(
                                "Counter {:?}: {} message(s) so far",
                                ctx.name(),
                                counts.total()
                            );
                        }
                    }
                }
                self.handle.0.set(counts);
                Ok(ConsumeStatus::Ok)
            }
            Pull::Again => Ok(ConsumeStatus::Again),
            Pull::End => {
                tracing::info!(
                    "Counter {:?} done: {} ({} total)",
                    ctx.name(),
                    self.handle.counts(),
                    self.handle.counts().total()
                );
                Ok(ConsumeStatus::End)
            }
        }
    }

    fn finalize(&mut self) {
        self.iterator = None;
    }
}
