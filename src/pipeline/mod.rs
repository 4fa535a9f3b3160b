//! Pull-based component graph.
//!
//! Sources produce messages, filters transform them, sinks consume them.
//! Components are wired into a directed acyclic graph; running the graph
//! asks one sink at a time to consume, and each sink pulls its message
//! iterators, which pull further upstream.
//!
//! # Architecture
//!
//! ```text
//! [MemorySource] ──► in0 ┐
//! [MemorySource] ──► in1 ├─ [Muxer] ──► [CollectorSink]
//!                    in2 ┘ (grows on connect)
//! ```
//!
//! # Design
//!
//! - **Closed sum of component kinds**: `AnyComponent` is a source, filter
//!   or sink, each with its own capability trait.
//! - **Single-threaded**: a `Graph` and its messages stay on one thread;
//!   an `Interrupter` cancels from elsewhere, and `GraphRunner` moves a whole
//!   graph onto a dedicated thread.
//! - **Pooled messages**: message bodies are recycled into per-kind pools
//!   owned by the graph.
//! - **IDs for back-references**: ports, connections and iterators refer to
//!   each other through IDs into graph-owned tables.

pub mod component;
pub mod connection;
pub mod context;
pub mod error;
pub mod graph;
pub mod id;
pub mod iterator;
pub mod message;
pub mod nodes;
pub mod params;
pub mod pool;
pub mod port;
pub mod registry;
pub mod runner;

pub use component::{
    AnyComponent, ComponentClass, ComponentKind, ConsumeStatus, FilterComponent, SinkComponent,
    SourceComponent,
};
pub use connection::ConnectionInfo;
pub use context::{IteratorContext, IteratorInit, SelfComponent};
pub use error::{GraphError, GraphResult, ResultExt};
pub use graph::{Graph, GraphState, Interrupter, RunStatus};
pub use id::{ComponentId, ConnectionId, IteratorId, PortId};
pub use iterator::{
    IteratorState, MessageIterator, MessageIteratorImpl, NextStatus, Pull, SeekCapabilities,
    SeekStatus,
};
pub use message::{
    ClockClass, ClockSnapshot, DiscardedItems, Event, EventClass, LogLevel, Message, MessageBatch,
    MessageBody, MessageKind, Packet, Stream, StreamClass, Trace,
};
pub use params::Params;
pub use pool::{MessageFactory, PoolStats};
pub use port::{PortDirection, PortInfo};
pub use registry::ComponentRegistry;
pub use runner::{GraphRunner, RunEvent};
