//! # tracegraph-rs: pull-based trace processing graphs
//!
//! An execution engine for time-ordered event-stream pipelines. Independently
//! written components (sources, filters, sinks) are wired into a graph; the
//! engine drives one sink at a time, pulling messages lazily upstream, and
//! guarantees every component sees a time-ordered, clock-consistent
//! sequence.
//!
//! ## Architecture
//!
//! - **Graph**: owns components and connections, schedules sink consumption
//! - **Message iterators**: per-connection pull cursors enforcing the pull
//!   protocol, including seeking (with an emulated time seek)
//! - **Muxer**: built-in filter merging N upstreams by time, deterministically
//! - **Runner**: runs a graph on a dedicated thread, reporting over crossbeam
//!   channels
//!
//! ## Example
//!
//! ```ignore
//! use tracegraph_rs::pipeline::{nodes, Graph, Params};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_component(&nodes::memory_source::class(first), "a", Params::empty())?;
//! let b = graph.add_component(&nodes::memory_source::class(second), "b", Params::empty())?;
//! let mux = graph.add_component(&nodes::muxer::class(), "mux", Params::empty())?;
//! let collected = nodes::Collected::new();
//! let sink = graph.add_component(&nodes::collector_sink::class(collected.clone()), "sink", Params::empty())?;
//!
//! graph.connect(graph.output_port(a, "out").unwrap(), graph.input_port(mux, "in0").unwrap())?;
//! graph.connect(graph.output_port(b, "out").unwrap(), graph.input_port(mux, "in1").unwrap())?;
//! graph.connect(graph.output_port(mux, "out").unwrap(), graph.input_port(sink, "in").unwrap())?;
//! graph.run()?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use config::{EngineConfig, GraphSettings, LoggingSettings};
pub use error::{Error, Result};
pub use pipeline::{Graph, GraphError, GraphResult, Message, MessageKind, RunStatus};
