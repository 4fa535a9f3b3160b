//! MemorySource: replays an in-memory list of messages on its `out` port.
//!
//! Each message iterator created on the port walks the list from the start.
//! Parameters shape the iterator's behaviour so graphs can be exercised
//! without a trace decoder:
//!
//! | key                | default | meaning                                      |
//! |--------------------|---------|----------------------------------------------|
//! | `seekable`         | `true`  | iterators support seeking to the beginning   |
//! | `can-seek-forward` | `true`  | messages come back in the same order         |
//! | `again-every`      | none    | answer "again" on every N-th `next` call      |
//! | `fail-at`          | none    | fail when reaching the message at this index |

use crate::pipeline::component::{ComponentClass, SourceComponent};
use crate::pipeline::context::{IteratorContext, IteratorInit};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::iterator::{MessageIteratorImpl, NextStatus, SeekCapabilities, SeekStatus};
use crate::pipeline::message::{MessageBatch, MessageBody};
use crate::pipeline::port::PortInfo;
use serde::Deserialize;
use std::cell::Cell;
use std::rc::Rc;

pub const MEMORY_SOURCE_CLASS_NAME: &str = "memory";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MemorySourceParams {
    pub seekable: bool,
    pub can_seek_forward: bool,
    pub again_every: Option<u32>,
    pub fail_at: Option<usize>,
}

impl Default for MemorySourceParams {
    fn default() -> Self {
        Self {
            seekable: true,
            can_seek_forward: true,
            again_every: None,
            fail_at: None,
        }
    }
}

/// Runtime toggle of whether iterators can currently seek to the beginning.
#[derive(Debug, Clone)]
pub struct SeekSwitch(Rc<Cell<bool>>);

impl SeekSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Rc::new(Cell::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.get()
    }
}

impl Default for SeekSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// A memory source class replaying `bodies`.
pub fn class(bodies: Vec<MessageBody>) -> ComponentClass {
    class_with_switch(bodies, SeekSwitch::default())
}

/// Like [`class`], with seeking to the beginning controlled by `switch`.
pub fn class_with_switch(bodies: Vec<MessageBody>, switch: SeekSwitch) -> ComponentClass {
    let bodies = Rc::new(bodies);
    ComponentClass::source(MEMORY_SOURCE_CLASS_NAME, move |ctx, params| {
        let params: MemorySourceParams = params.decode()?;
        if params.again_every == Some(0) {
            return Err(GraphError::Params(
                "`again-every` must be greater than zero".into(),
            ));
        }
        ctx.add_output_port("out")?;
        Ok(Box::new(MemorySource {
            bodies: Rc::clone(&bodies),
            params,
            switch: switch.clone(),
        }))
    })
    .with_description("Replay messages held in memory")
}

pub struct MemorySource {
    bodies: Rc<Vec<MessageBody>>,
    params: MemorySourceParams,
    switch: SeekSwitch,
}

impl SourceComponent for MemorySource {
    fn create_message_iterator(
        &mut self,
        ctx: &mut IteratorInit<'_>,
        _port: &PortInfo,
    ) -> GraphResult<Box<dyn MessageIteratorImpl>> {
        tracing::trace!(
            "Memory source {:?} replaying {} message(s)",
            ctx.component_name(),
            self.bodies.len()
        );
        Ok(Box::new(MemorySourceIterator {
            bodies: Rc::clone(&self.bodies),
            params: self.params.clone(),
            switch: self.switch.clone(),
            position: 0,
            calls: 0,
        }))
    }
}

struct MemorySourceIterator {
    bodies: Rc<Vec<MessageBody>>,
    params: MemorySourceParams,
    switch: SeekSwitch,
    position: usize,
    calls: u32,
}

impl MessageIteratorImpl for MemorySourceIterator {
    fn next(
        &mut self,
        ctx: &mut IteratorContext<'_>,
        batch: &mut MessageBatch,
    ) -> GraphResult<NextStatus> {
        if let Some(every) = self.params.again_every {
            self.calls = self.calls.wrapping_add(1);
            if self.calls % every == 0 {
                return Ok(NextStatus::Again);
            }
        }
        if self.position >= self.bodies.len() {
            return Ok(NextStatus::End);
        }

        let factory = ctx.messages();
        while !batch.is_full() && self.position < self.bodies.len() {
            if self.params.fail_at == Some(self.position) {
                if batch.is_empty() {
                    return Err(GraphError::callback(format!(
                        "memory source failed at message {}",
                        self.position
                    )));
                }
                break;
            }
            batch.push(factory.create(self.bodies[self.position].clone()));
            self.position += 1;
        }
        Ok(NextStatus::Ok)
    }

    fn seek_capabilities(&self) -> SeekCapabilities {
        SeekCapabilities {
            beginning: self.params.seekable,
            ns_from_origin: false,
            forward: self.params.can_seek_forward,
        }
    }

    fn can_seek_beginning(&mut self) -> GraphResult<bool> {
        Ok(self.switch.is_enabled())
    }

    fn seek_beginning(&mut self, _ctx: &mut IteratorContext<'_>) -> GraphResult<SeekStatus> {
        self.position = 0;
        self.calls = 0;
        Ok(SeekStatus::Ok)
    }
}
