//! Per-graph message object pools.
//!
//! Message bodies are boxed once and recycled through a pool per message
//! kind, so steady-state pulling does not allocate. A released slot is
//! emptied first: a free slot never keeps streams or packets alive. A slot
//! whose pool is full, or whose graph is gone, is simply freed.

use crate::pipeline::message::{
    ClockClass, ClockSnapshot, DiscardedItems, Event, Message, MessageBody, MessageKind, Packet,
    Stream,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Default upper bound of free objects kept per pool.
pub const DEFAULT_POOL_MAX_SIZE: usize = 256;

/// Counters of one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Boxes allocated because the pool was empty.
    pub allocated: u64,
    /// Boxes handed out again from the free list.
    pub reused: u64,
    /// Boxes returned to the free list.
    pub recycled: u64,
    /// Boxes freed because the pool was full.
    pub discarded: u64,
}

/// Boxed storage for one pooled object, empty while on the free list.
pub type Slot<T> = Box<Option<T>>;

/// Free list of boxed slots.
#[derive(Debug)]
pub struct ObjectPool<T> {
    free: Vec<Slot<T>>,
    max_size: usize,
    stats: PoolStats,
}

impl<T> ObjectPool<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            free: Vec::new(),
            max_size,
            stats: PoolStats::default(),
        }
    }

    /// Box `value`, reusing a free allocation when there is one.
    pub fn acquire(&mut self, value: T) -> Slot<T> {
        match self.free.pop() {
            Some(mut slot) => {
                *slot = Some(value);
                self.stats.reused += 1;
                slot
            }
            None => {
                self.stats.allocated += 1;
                Box::new(Some(value))
            }
        }
    }

    /// Drop the slot's value and keep the allocation if there is room.
    pub fn release(&mut self, mut slot: Slot<T>) {
        *slot = None;
        if self.free.len() < self.max_size {
            self.free.push(slot);
            self.stats.recycled += 1;
        } else {
            self.stats.discarded += 1;
        }
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

/// One pool per message kind.
#[derive(Debug)]
pub struct MessagePools {
    pools: [RefCell<ObjectPool<MessageBody>>; MessageKind::COUNT],
}

impl MessagePools {
    pub fn new(max_size: usize) -> Self {
        Self {
            pools: std::array::from_fn(|_| RefCell::new(ObjectPool::new(max_size))),
        }
    }

    pub fn acquire(self: &Rc<Self>, body: MessageBody) -> Message {
        let slot = self.pools[body.kind().index()].borrow_mut().acquire(body);
        Message::pooled(slot, Rc::downgrade(self))
    }

    pub(crate) fn recycle(&self, mut slot: Slot<MessageBody>) {
        let Some(kind) = (*slot).as_ref().map(MessageBody::kind) else {
            return;
        };
        // Emptied before the pool is borrowed.
        *slot = None;
        if let Ok(mut pool) = self.pools[kind.index()].try_borrow_mut() {
            pool.release(slot);
        }
    }

    pub fn stats(&self, kind: MessageKind) -> PoolStats {
        self.pools[kind.index()].borrow().stats()
    }

    pub fn free_len(&self, kind: MessageKind) -> usize {
        self.pools[kind.index()].borrow().free_len()
    }
}

/// Creates pooled messages for one graph.
///
/// Handed to components and message iterators through their contexts.
/// Clock values are raw cycles of the stream's default clock class.
#[derive(Debug, Clone)]
pub struct MessageFactory {
    pools: Rc<MessagePools>,
}

impl MessageFactory {
    pub fn new(pools: Rc<MessagePools>) -> Self {
        Self { pools }
    }

    pub fn create(&self, body: MessageBody) -> Message {
        self.pools.acquire(body)
    }

    pub fn stream_beginning(&self, stream: &Rc<Stream>, clock_value: Option<u64>) -> Message {
        self.create(MessageBody::StreamBeginning {
            stream: Rc::clone(stream),
            clock_snapshot: snapshot(stream, clock_value),
        })
    }

    pub fn stream_end(&self, stream: &Rc<Stream>, clock_value: Option<u64>) -> Message {
        self.create(MessageBody::StreamEnd {
            stream: Rc::clone(stream),
            clock_snapshot: snapshot(stream, clock_value),
        })
    }

    pub fn packet_beginning(&self, packet: &Rc<Packet>, clock_value: Option<u64>) -> Message {
        self.create(MessageBody::PacketBeginning {
            packet: Rc::clone(packet),
            clock_snapshot: snapshot(&packet.stream, clock_value),
        })
    }

    pub fn packet_end(&self, packet: &Rc<Packet>, clock_value: Option<u64>) -> Message {
        self.create(MessageBody::PacketEnd {
            packet: Rc::clone(packet),
            clock_snapshot: snapshot(&packet.stream, clock_value),
        })
    }

    pub fn event(&self, event: Event, clock_value: Option<u64>) -> Message {
        let clock_snapshot = snapshot(&event.stream, clock_value);
        self.create(MessageBody::Event {
            event,
            clock_snapshot,
        })
    }

    /// `range` is the (beginning, end) clock values of the discarded span.
    pub fn discarded_events(
        &self,
        stream: &Rc<Stream>,
        range: Option<(u64, u64)>,
        count: Option<u64>,
    ) -> Message {
        self.create(MessageBody::DiscardedEvents(discarded(stream, range, count)))
    }

    pub fn discarded_packets(
        &self,
        stream: &Rc<Stream>,
        range: Option<(u64, u64)>,
        count: Option<u64>,
    ) -> Message {
        self.create(MessageBody::DiscardedPackets(discarded(stream, range, count)))
    }

    pub fn inactivity(&self, clock_class: &Rc<ClockClass>, clock_value: u64) -> Message {
        self.create(MessageBody::MessageIteratorInactivity {
            clock_snapshot: ClockSnapshot::new(Rc::clone(clock_class), clock_value),
        })
    }

    pub fn pools(&self) -> &Rc<MessagePools> {
        &self.pools
    }
}

fn snapshot(stream: &Stream, clock_value: Option<u64>) -> Option<ClockSnapshot> {
    clock_value.map(|value| {
        let class = stream
            .default_clock_class()
            .expect("a clock value needs a stream class with a default clock class");
        ClockSnapshot::new(Rc::clone(class), value)
    })
}

fn discarded(stream: &Rc<Stream>, range: Option<(u64, u64)>, count: Option<u64>) -> DiscardedItems {
    let (beginning, end) = match range {
        Some((begin, end)) => (snapshot(stream, Some(begin)), snapshot(stream, Some(end))),
        None => (None, None),
    };
    DiscardedItems {
        stream: Rc::clone(stream),
        beginning,
        end,
        count,
    }
}
