//! Callback contexts.
//!
//! Callbacks never see the graph itself. They get a short-lived context
//! borrowing it, which exposes only what that callback may do.

use crate::pipeline::error::GraphResult;
use crate::pipeline::graph::GraphInner;
use crate::pipeline::id::{ComponentId, IteratorId, PortId};
use crate::pipeline::iterator::MessageIterator;
use crate::pipeline::pool::MessageFactory;
use crate::pipeline::port::{PortDirection, PortInfo};
use std::rc::Rc;

/// A component's view of itself, passed to component callbacks.
pub struct SelfComponent<'g> {
    graph: &'g Rc<GraphInner>,
    id: ComponentId,
}

impl<'g> SelfComponent<'g> {
    pub(crate) fn new(graph: &'g Rc<GraphInner>, id: ComponentId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> String {
        self.graph.component_name(self.id)
    }

    /// Add an input port. Fails once the graph is configured, unless called
    /// from a port-connected callback.
    pub fn add_input_port(&mut self, name: &str) -> GraphResult<PortId> {
        self.graph.add_port(self.id, name, PortDirection::Input)
    }

    pub fn add_output_port(&mut self, name: &str) -> GraphResult<PortId> {
        self.graph.add_port(self.id, name, PortDirection::Output)
    }

    pub fn input_ports(&self) -> Vec<PortInfo> {
        self.graph.ports(self.id, PortDirection::Input)
    }

    pub fn output_ports(&self) -> Vec<PortInfo> {
        self.graph.ports(self.id, PortDirection::Output)
    }

    pub fn input_port(&self, name: &str) -> Option<PortInfo> {
        self.input_ports().into_iter().find(|p| p.name == name)
    }

    /// Create a message iterator on one of this component's connected input
    /// ports. The iterator has no downstream iterator.
    pub fn create_message_iterator(&mut self, port: PortId) -> GraphResult<MessageIterator> {
        MessageIterator::create(self.graph, self.id, port, None)
    }

    pub fn messages(&self) -> MessageFactory {
        self.graph.message_factory()
    }

    pub fn is_interrupted(&self) -> bool {
        self.graph.is_interrupted()
    }
}

/// Context of a message iterator's initialization.
pub struct IteratorInit<'g> {
    graph: &'g Rc<GraphInner>,
    component: ComponentId,
    iterator: IteratorId,
}

impl<'g> IteratorInit<'g> {
    pub(crate) fn new(graph: &'g Rc<GraphInner>, component: ComponentId, iterator: IteratorId) -> Self {
        Self {
            graph,
            component,
            iterator,
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    pub fn component_name(&self) -> String {
        self.graph.component_name(self.component)
    }

    pub fn iterator_id(&self) -> IteratorId {
        self.iterator
    }

    pub fn input_ports(&self) -> Vec<PortInfo> {
        self.graph.ports(self.component, PortDirection::Input)
    }

    /// Create an upstream iterator on one of the component's input ports.
    /// The new iterator's downstream is the iterator being initialized.
    pub fn create_message_iterator(&mut self, port: PortId) -> GraphResult<MessageIterator> {
        MessageIterator::create(self.graph, self.component, port, Some(self.iterator))
    }

    pub fn messages(&self) -> MessageFactory {
        self.graph.message_factory()
    }

    pub fn batch_capacity(&self) -> usize {
        self.graph.settings().batch_capacity
    }
}

/// Context of a message iterator's `next` and seek callbacks.
pub struct IteratorContext<'g> {
    graph: &'g Rc<GraphInner>,
    capacity: usize,
}

impl<'g> IteratorContext<'g> {
    pub(crate) fn new(graph: &'g Rc<GraphInner>, capacity: usize) -> Self {
        Self { graph, capacity }
    }

    pub fn messages(&self) -> MessageFactory {
        self.graph.message_factory()
    }

    /// Most messages one `next` call may return.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_interrupted(&self) -> bool {
        self.graph.is_interrupted()
    }
}
