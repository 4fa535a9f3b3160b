//! Built-in component classes.

pub mod collector_sink;
pub mod counter_sink;
pub mod memory_source;
pub mod muxer;

pub use collector_sink::Collected;
pub use counter_sink::{CounterHandle, MessageCounts};
pub use memory_source::{MemorySourceParams, SeekSwitch};
pub use muxer::MuxerIterator;
