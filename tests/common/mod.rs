//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracegraph_rs::pipeline::nodes::{collector_sink, memory_source, muxer, Collected};
use tracegraph_rs::pipeline::{
    ComponentClass, ComponentId, ConsumeStatus, Graph, GraphError, GraphResult, MessageBody,
    MessageIterator, MessageKind, Params, SelfComponent, SinkComponent,
};

/// Connect `upstream.out_port` to `downstream.in_port`.
pub fn connect(
    graph: &mut Graph,
    upstream: ComponentId,
    out_port: &str,
    downstream: ComponentId,
    in_port: &str,
) -> GraphResult<()> {
    let up = graph
        .output_port(upstream, out_port)
        .unwrap_or_else(|| panic!("no output port {:?}", out_port));
    let down = graph
        .input_port(downstream, in_port)
        .unwrap_or_else(|| panic!("no input port {:?}", in_port));
    graph.connect(up, down)?;
    Ok(())
}

/// Add one memory source per entry and connect each to a fresh input port
/// of a muxer. Returns the muxer.
pub fn add_muxed_sources(
    graph: &mut Graph,
    sources: Vec<(Vec<MessageBody>, Params)>,
) -> GraphResult<ComponentId> {
    let mux = graph.add_component(&muxer::class(), "mux", Params::empty())?;
    for (i, (bodies, params)) in sources.into_iter().enumerate() {
        let name = format!("src{}", i);
        let src = graph.add_component(&memory_source::class(bodies), &name, params)?;
        connect(graph, src, "out", mux, &format!("in{}", i))?;
    }
    Ok(mux)
}

/// Sources feeding a muxer feeding a collector sink.
pub fn mux_graph(sources: Vec<Vec<MessageBody>>) -> GraphResult<(Graph, Collected)> {
    mux_graph_with(
        Graph::new(),
        sources
            .into_iter()
            .map(|bodies| (bodies, Params::empty()))
            .collect(),
    )
}

pub fn mux_graph_with(
    mut graph: Graph,
    sources: Vec<(Vec<MessageBody>, Params)>,
) -> GraphResult<(Graph, Collected)> {
    let mux = add_muxed_sources(&mut graph, sources)?;
    let collected = Collected::new();
    let sink = graph.add_component(&collector_sink::class(collected.clone()), "sink", Params::empty())?;
    connect(&mut graph, mux, "out", sink, "in")?;
    Ok((graph, collected))
}

/// Times of the collected event messages.
pub fn event_times(collected: &Collected) -> Vec<i64> {
    collected.with(|messages| {
        messages
            .iter()
            .filter(|m| m.kind() == MessageKind::Event)
            .map(|m| {
                m.ns_from_origin()
                    .expect("convertible clock snapshot")
                    .expect("events carry a clock snapshot")
            })
            .collect()
    })
}

/// Slot receiving the message iterator created by a [`handle_sink_class`]
/// sink, so tests can drive the iterator directly.
#[derive(Clone, Default)]
pub struct IteratorHandle(Rc<RefCell<Option<MessageIterator>>>);

impl IteratorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the iterator. Panics before the graph is configured.
    pub fn with<R>(&self, f: impl FnOnce(&mut MessageIterator) -> R) -> R {
        let mut slot = self.0.borrow_mut();
        let iterator = slot
            .as_mut()
            .expect("the graph must be configured before using the iterator");
        f(iterator)
    }

    pub fn take(&self) -> Option<MessageIterator> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for IteratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow().as_ref().map(MessageIterator::state);
        f.debug_tuple("IteratorHandle").field(&state).finish()
    }
}

struct HandleSink {
    handle: IteratorHandle,
}

impl SinkComponent for HandleSink {
    fn graph_is_configured(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
        let port = ctx
            .input_port("in")
            .ok_or_else(|| GraphError::callback("missing input port"))?;
        let iterator = ctx.create_message_iterator(port.id)?;
        *self.handle.0.borrow_mut() = Some(iterator);
        Ok(())
    }

    fn consume(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus> {
        Ok(ConsumeStatus::End)
    }
}

/// A sink handing its input iterator over to `handle` once the graph is
/// configured. It never consumes anything itself.
pub fn handle_sink_class(handle: IteratorHandle) -> ComponentClass {
    ComponentClass::sink("handle", move |ctx, _params| {
        ctx.add_input_port("in")?;
        Ok(Box::new(HandleSink {
            handle: handle.clone(),
        }))
    })
}

/// Attach a handle sink to `upstream.out` and configure the graph.
pub fn attach_handle(graph: &mut Graph, upstream: ComponentId) -> GraphResult<IteratorHandle> {
    let handle = IteratorHandle::new();
    let sink = graph.add_component(&handle_sink_class(handle.clone()), "handle", Params::empty())?;
    connect(graph, upstream, "out", sink, "in")?;
    graph.configure()?;
    Ok(handle)
}
