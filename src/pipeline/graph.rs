//! The component graph and its sink scheduler.
//!
//! `Graph` owns every component (and through them, their ports) and every
//! connection. Message iterators only hold a weak handle on the graph and
//! refer to components, connections and each other by ID.
//!
//! Scheduling is round-robin over a FIFO queue of sinks: the head sink
//! consumes once, then goes back to the tail unless it is exhausted.

use crate::config::GraphSettings;
use crate::pipeline::component::{AnyComponent, ComponentClass, ComponentKind, ConsumeStatus};
use crate::pipeline::connection::{Connection, ConnectionInfo};
use crate::pipeline::context::SelfComponent;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::id::{ComponentId, ConnectionId, IteratorId, PortId};
use crate::pipeline::message::MessageKind;
use crate::pipeline::params::Params;
use crate::pipeline::pool::{MessageFactory, MessagePools, PoolStats};
use crate::pipeline::port::{validate_port_name, Port, PortDirection, PortInfo};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration state of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Components and connections may be added.
    Configuring,
    /// Sinks are being told the graph is configured; iterators may be created.
    PartiallyConfigured,
    Configured,
    /// A callback failed; the graph can only be dropped.
    Faulty,
    Destroying,
}

/// Outcome of `run_once()` / `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A sink made progress.
    Ok,
    /// No sink had anything ready; try again later.
    Again,
    /// Every sink is exhausted.
    End,
    /// An interrupter was set.
    Interrupted,
}

/// Cancellation token, settable from any thread.
///
/// Polled by the graph once per scheduling round, never mid-callback.
#[derive(Debug, Clone, Default)]
pub struct Interrupter(Arc<AtomicBool>);

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A component and its ports.
pub(crate) struct ComponentSlot {
    pub name: String,
    pub class_name: String,
    pub kind: ComponentKind,
    pub ports: Vec<Port>,
    /// `None` while the init callback runs.
    pub behaviour: Option<Rc<RefCell<AnyComponent>>>,
    /// Sinks only: the graph-configured callback already ran.
    pub configured: bool,
}

/// Registry entry of a live message iterator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IteratorRecord {
    pub connection: ConnectionId,
    /// Upstream component producing this iterator's messages.
    pub component: ComponentId,
    /// Iterator that owns and pulls this one, if any.
    pub downstream: Option<IteratorId>,
}

pub(crate) struct GraphInner {
    state: Cell<GraphState>,
    components: RefCell<Vec<ComponentSlot>>,
    pub(crate) connections: RefCell<Vec<Connection>>,
    iterators: RefCell<HashMap<IteratorId, IteratorRecord>>,
    next_iterator_id: Cell<u64>,
    sinks: RefCell<Vec<ComponentId>>,
    run_queue: RefCell<VecDeque<ComponentId>>,
    pools: Rc<MessagePools>,
    settings: GraphSettings,
    interrupters: RefCell<Vec<Interrupter>>,
    default_interrupter: Interrupter,
    port_connected_depth: Cell<u32>,
    running: Cell<bool>,
}

impl GraphInner {
    fn new(settings: GraphSettings) -> Self {
        let default_interrupter = Interrupter::new();
        Self {
            state: Cell::new(GraphState::Configuring),
            components: RefCell::new(Vec::new()),
            connections: RefCell::new(Vec::new()),
            iterators: RefCell::new(HashMap::new()),
            next_iterator_id: Cell::new(0),
            sinks: RefCell::new(Vec::new()),
            run_queue: RefCell::new(VecDeque::new()),
            pools: Rc::new(MessagePools::new(settings.pool_max_size)),
            interrupters: RefCell::new(vec![default_interrupter.clone()]),
            default_interrupter,
            settings,
            port_connected_depth: Cell::new(0),
            running: Cell::new(false),
        }
    }

    pub(crate) fn state(&self) -> GraphState {
        self.state.get()
    }

    pub(crate) fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    fn set_faulty(&self) {
        if self.state.get() != GraphState::Faulty {
            tracing::warn!("Graph is now faulty");
            self.state.set(GraphState::Faulty);
        }
    }

    fn ensure_not_faulty(&self) -> GraphResult<()> {
        match self.state.get() {
            GraphState::Faulty => Err(GraphError::Faulty),
            _ => Ok(()),
        }
    }

    pub(crate) fn message_factory(&self) -> MessageFactory {
        MessageFactory::new(Rc::clone(&self.pools))
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupters.borrow().iter().any(Interrupter::is_set)
    }

    // ── Components and ports ──

    pub(crate) fn component_name(&self, id: ComponentId) -> String {
        self.components.borrow()[id.index()].name.clone()
    }

    pub(crate) fn behaviour(&self, id: ComponentId) -> GraphResult<Rc<RefCell<AnyComponent>>> {
        let components = self.components.borrow();
        let slot = &components[id.index()];
        slot.behaviour
            .clone()
            .ok_or_else(|| GraphError::ComponentBusy(slot.name.clone()))
    }

    pub(crate) fn add_port(
        &self,
        component: ComponentId,
        name: &str,
        direction: PortDirection,
    ) -> GraphResult<PortId> {
        match self.state.get() {
            GraphState::Faulty => return Err(GraphError::Faulty),
            GraphState::Configuring => {}
            _ if self.port_connected_depth.get() > 0 => {}
            _ => return Err(GraphError::NotConfiguring("add a port")),
        }

        let mut components = self.components.borrow_mut();
        let slot = &mut components[component.index()];
        assert!(
            slot.kind.allows(direction),
            "a {} component cannot have {} ports",
            slot.kind,
            direction
        );
        validate_port_name(&slot.ports, name, direction)?;

        let id = PortId::new(component, slot.ports.len() as u16);
        slot.ports.push(Port::new(name.to_string(), direction));
        tracing::debug!("Added {} port {:?} to component {:?}", direction, name, slot.name);
        Ok(id)
    }

    /// Panics on a port ID that does not belong to this graph.
    pub(crate) fn port_info(&self, port: PortId) -> PortInfo {
        let components = self.components.borrow();
        let p = components
            .get(port.component().index())
            .and_then(|slot| slot.ports.get(port.port_index() as usize))
            .unwrap_or_else(|| panic!("{:?} does not belong to this graph", port));
        PortInfo {
            id: port,
            name: p.name.clone(),
            direction: p.direction,
            connected: p.is_connected(),
        }
    }

    pub(crate) fn port_connection(&self, port: PortId) -> Option<ConnectionId> {
        self.components.borrow()[port.component().index()].ports[port.port_index() as usize]
            .connection
    }

    fn set_port_connection(&self, port: PortId, connection: Option<ConnectionId>) {
        self.components.borrow_mut()[port.component().index()].ports
            [port.port_index() as usize]
            .connection = connection;
    }

    pub(crate) fn port_label(&self, port: PortId) -> String {
        let components = self.components.borrow();
        let slot = &components[port.component().index()];
        format!("{}.{}", slot.name, slot.ports[port.port_index() as usize].name)
    }

    pub(crate) fn ports(&self, component: ComponentId, direction: PortDirection) -> Vec<PortInfo> {
        let components = self.components.borrow();
        components[component.index()]
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.direction == direction)
            .map(|(i, p)| PortInfo {
                id: PortId::new(component, i as u16),
                name: p.name.clone(),
                direction: p.direction,
                connected: p.is_connected(),
            })
            .collect()
    }

    fn notify_port_connected(self: &Rc<Self>, port: PortId) -> GraphResult<()> {
        let component = port.component();
        let behaviour = self.behaviour(component)?;
        let info = self.port_info(port);

        self.port_connected_depth.set(self.port_connected_depth.get() + 1);
        let result = match behaviour.try_borrow_mut() {
            Ok(mut c) => {
                let mut ctx = SelfComponent::new(self, component);
                c.port_connected(&mut ctx, &info)
            }
            Err(_) => Err(GraphError::ComponentBusy(self.component_name(component))),
        };
        self.port_connected_depth.set(self.port_connected_depth.get() - 1);
        result
    }

    /// Check if adding an edge from `from` to `to` would create a cycle.
    fn would_create_cycle(&self, from: ComponentId, to: ComponentId) -> bool {
        // If `to` can reach `from` through existing edges, adding from->to creates a cycle.
        let connections = self.connections.borrow();
        let mut visited = vec![false; self.components.borrow().len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            for conn in connections.iter() {
                if conn.upstream.component() == current {
                    stack.push(conn.downstream.component());
                }
            }
        }
        false
    }

    /// Undo a connection whose notification failed. Only the newest
    /// connection can be in that state.
    fn tear_down_connection(&self, id: ConnectionId) {
        let conn = {
            let mut connections = self.connections.borrow_mut();
            match connections.last() {
                Some(last) if last.id == id => connections.pop(),
                _ => None,
            }
        };
        if let Some(conn) = conn {
            self.set_port_connection(conn.upstream, None);
            self.set_port_connection(conn.downstream, None);
            tracing::debug!("Tore down connection {:?}", id);
        }
    }

    // ── Message iterator registry ──

    pub(crate) fn register_iterator(
        &self,
        connection: ConnectionId,
        component: ComponentId,
        downstream: Option<IteratorId>,
    ) -> IteratorId {
        let id = IteratorId(self.next_iterator_id.get());
        self.next_iterator_id.set(id.0 + 1);
        self.iterators.borrow_mut().insert(
            id,
            IteratorRecord {
                connection,
                component,
                downstream,
            },
        );
        self.connections.borrow_mut()[connection.index()]
            .iterators
            .push(id);
        id
    }

    /// Remove every back-reference to a finalized iterator.
    pub(crate) fn detach_iterator(&self, id: IteratorId) {
        let record = {
            let mut iterators = self.iterators.borrow_mut();
            let record = iterators.remove(&id);
            for other in iterators.values_mut() {
                if other.downstream == Some(id) {
                    other.downstream = None;
                }
            }
            record
        };
        if let Some(record) = record {
            self.connections.borrow_mut()[record.connection.index()].remove_iterator(id);
        }
    }

    pub(crate) fn iterator_record(&self, id: IteratorId) -> Option<IteratorRecord> {
        self.iterators.borrow().get(&id).copied()
    }

    // ── Configuration and scheduling ──

    fn configure(self: &Rc<Self>) -> GraphResult<()> {
        match self.state.get() {
            GraphState::Faulty => return Err(GraphError::Faulty),
            GraphState::Configured => return Ok(()),
            _ => {}
        }

        let sinks = self.sinks.borrow().clone();
        if sinks.is_empty() {
            return Err(GraphError::NoSink);
        }

        self.state.set(GraphState::PartiallyConfigured);
        for &sink in &sinks {
            if self.components.borrow()[sink.index()].configured {
                continue;
            }
            let behaviour = self.behaviour(sink)?;
            let result = match behaviour.try_borrow_mut() {
                Ok(mut c) => match c.as_sink_mut() {
                    Some(s) => s.graph_is_configured(&mut SelfComponent::new(self, sink)),
                    None => unreachable!("only sinks are registered as sinks"),
                },
                Err(_) => Err(GraphError::ComponentBusy(self.component_name(sink))),
            };
            if let Err(e) = result {
                let name = self.component_name(sink);
                tracing::warn!("Sink {:?} failed to handle graph configuration: {}", name, e);
                self.set_faulty();
                return Err(e.with_context(format!(
                    "Sink component {:?} failed to handle graph configuration",
                    name
                )));
            }
            self.components.borrow_mut()[sink.index()].configured = true;
        }

        *self.run_queue.borrow_mut() = sinks.iter().copied().collect();
        self.state.set(GraphState::Configured);
        tracing::info!("Graph configured with {} sink(s)", sinks.len());
        Ok(())
    }

    fn consume_next_sink(self: &Rc<Self>) -> GraphResult<RunStatus> {
        if self.is_interrupted() {
            tracing::info!("Graph run interrupted");
            return Ok(RunStatus::Interrupted);
        }

        let Some(sink) = self.run_queue.borrow_mut().pop_front() else {
            return Ok(RunStatus::End);
        };

        let behaviour = self.behaviour(sink)?;
        let result = match behaviour.try_borrow_mut() {
            Ok(mut c) => match c.as_sink_mut() {
                Some(s) => s.consume(&mut SelfComponent::new(self, sink)),
                None => unreachable!("only sinks are scheduled"),
            },
            Err(_) => Err(GraphError::ComponentBusy(self.component_name(sink))),
        };

        match result {
            Ok(ConsumeStatus::Ok) => {
                self.run_queue.borrow_mut().push_back(sink);
                Ok(RunStatus::Ok)
            }
            Ok(ConsumeStatus::Again) => {
                self.run_queue.borrow_mut().push_back(sink);
                Ok(RunStatus::Again)
            }
            Ok(ConsumeStatus::End) => {
                tracing::info!("Sink {:?} is exhausted", self.component_name(sink));
                if self.run_queue.borrow().is_empty() {
                    Ok(RunStatus::End)
                } else {
                    Ok(RunStatus::Ok)
                }
            }
            Err(e) => {
                let name = self.component_name(sink);
                tracing::warn!("Sink {:?} failed to consume: {}", name, e);
                self.set_faulty();
                Err(e.with_context(format!("Component {:?} failed to consume", name)))
            }
        }
    }
}

impl Drop for GraphInner {
    fn drop(&mut self) {
        self.state.set(GraphState::Destroying);
        let behaviours: Vec<_> = self
            .components
            .get_mut()
            .iter_mut()
            .filter_map(|slot| slot.behaviour.take())
            .collect();
        // Sinks are usually added last and own the iterator chains.
        for behaviour in behaviours.into_iter().rev() {
            if let Ok(mut c) = behaviour.try_borrow_mut() {
                c.finalize();
            }
        }
        tracing::debug!("Graph destroyed");
    }
}

/// Marks the graph as running for the duration of one `run`/`run_once`.
struct RunGuard<'a>(&'a GraphInner);

impl<'a> RunGuard<'a> {
    fn enter(graph: &'a GraphInner) -> Self {
        assert!(
            !graph.running.get(),
            "the graph is already running: run() and run_once() cannot be re-entered"
        );
        graph.running.set(true);
        Self(graph)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.running.set(false);
    }
}

/// A graph of source, filter and sink components.
///
/// Not `Send`: a graph lives and runs on one thread. Use an
/// [`Interrupter`] to cancel it from elsewhere.
pub struct Graph {
    inner: Rc<GraphInner>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_settings(GraphSettings::default())
    }

    pub fn with_settings(settings: GraphSettings) -> Self {
        assert!(settings.batch_capacity > 0, "batch capacity must be at least 1");
        Self {
            inner: Rc::new(GraphInner::new(settings)),
        }
    }

    // ── Graph building ──

    /// Add a component. Its init callback runs immediately with the frozen
    /// `params`; on failure the component is removed again and the graph
    /// becomes faulty.
    pub fn add_component(
        &mut self,
        class: &ComponentClass,
        name: &str,
        params: Params,
    ) -> GraphResult<ComponentId> {
        let inner = &self.inner;
        inner.ensure_not_faulty()?;
        if inner.state() != GraphState::Configuring {
            return Err(GraphError::NotConfiguring("add a component"));
        }
        if inner.components.borrow().iter().any(|slot| slot.name == name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }

        let id = {
            let mut components = inner.components.borrow_mut();
            let id = ComponentId(components.len() as u32);
            components.push(ComponentSlot {
                name: name.to_string(),
                class_name: class.name().to_string(),
                kind: class.kind(),
                ports: Vec::new(),
                behaviour: None,
                configured: false,
            });
            id
        };

        let result = class.init(&mut SelfComponent::new(inner, id), &params);
        match result {
            Ok(component) => {
                inner.components.borrow_mut()[id.index()].behaviour =
                    Some(Rc::new(RefCell::new(component)));
                if class.kind() == ComponentKind::Sink {
                    inner.sinks.borrow_mut().push(id);
                }
                tracing::debug!(
                    "Added {} component {:?} of class {:?} as {:?}",
                    class.kind(),
                    name,
                    class.name(),
                    id
                );
                Ok(id)
            }
            Err(e) => {
                inner.components.borrow_mut().pop();
                tracing::warn!("Component {:?} failed to initialize: {}", name, e);
                inner.set_faulty();
                if e.is_memory() {
                    return Err(GraphError::Memory);
                }
                Err(GraphError::Init {
                    component: name.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Connect an output port to an input port of another component.
    ///
    /// Both ports must be unconnected. The upstream component is notified
    /// first, then the downstream one; if either refuses, the connection is
    /// removed and the graph becomes faulty.
    pub fn connect(&mut self, upstream: PortId, downstream: PortId) -> GraphResult<ConnectionId> {
        let inner = &self.inner;
        inner.ensure_not_faulty()?;
        if inner.state() != GraphState::Configuring {
            return Err(GraphError::NotConfiguring("connect ports"));
        }

        let up = inner.port_info(upstream);
        let down = inner.port_info(downstream);
        assert_eq!(
            up.direction,
            PortDirection::Output,
            "upstream port {:?} is not an output port",
            up.name
        );
        assert_eq!(
            down.direction,
            PortDirection::Input,
            "downstream port {:?} is not an input port",
            down.name
        );
        if up.connected {
            return Err(GraphError::PortAlreadyConnected(inner.port_label(upstream)));
        }
        if down.connected {
            return Err(GraphError::PortAlreadyConnected(inner.port_label(downstream)));
        }

        let (from, to) = (upstream.component(), downstream.component());
        if from == to || inner.would_create_cycle(from, to) {
            return Err(GraphError::CycleDetected {
                from: inner.component_name(from),
                to: inner.component_name(to),
            });
        }

        let id = {
            let mut connections = inner.connections.borrow_mut();
            let id = ConnectionId(connections.len() as u32);
            connections.push(Connection::new(id, upstream, downstream));
            id
        };
        inner.set_port_connection(upstream, Some(id));
        inner.set_port_connection(downstream, Some(id));

        if let Err(e) = inner.notify_port_connected(upstream) {
            inner.tear_down_connection(id);
            inner.set_faulty();
            return Err(e.with_context(format!(
                "Upstream component {:?} failed to accept a connection on port {:?}",
                inner.component_name(from),
                up.name
            )));
        }
        inner.connections.borrow_mut()[id.index()].notified_upstream = true;

        if let Err(e) = inner.notify_port_connected(downstream) {
            inner.tear_down_connection(id);
            inner.set_faulty();
            return Err(e.with_context(format!(
                "Downstream component {:?} failed to accept a connection on port {:?}",
                inner.component_name(to),
                down.name
            )));
        }
        inner.connections.borrow_mut()[id.index()].notified_downstream = true;

        tracing::debug!(
            "Connected {} -> {} as {:?}",
            inner.port_label(upstream),
            inner.port_label(downstream),
            id
        );
        Ok(id)
    }

    /// Tell every sink the graph is configured. Requires at least one sink;
    /// does nothing once configured.
    pub fn configure(&mut self) -> GraphResult<()> {
        self.inner.configure()
    }

    // ── Running ──

    /// Configure if needed, then let the head sink consume once.
    pub fn run_once(&mut self) -> GraphResult<RunStatus> {
        let _guard = RunGuard::enter(&self.inner);
        self.inner.configure()?;
        self.inner.consume_next_sink()
    }

    /// Consume until every sink is exhausted, an interrupter is set, or every
    /// queued sink answered "again" in a row.
    pub fn run(&mut self) -> GraphResult<RunStatus> {
        let _guard = RunGuard::enter(&self.inner);
        self.inner.configure()?;

        let mut again_streak = 0usize;
        loop {
            match self.inner.consume_next_sink()? {
                RunStatus::Ok => again_streak = 0,
                RunStatus::Again => {
                    again_streak += 1;
                    if again_streak >= self.inner.run_queue.borrow().len() {
                        return Ok(RunStatus::Again);
                    }
                }
                status => return Ok(status),
            }
        }
    }

    /// The graph's own interrupter.
    pub fn interrupter(&self) -> Interrupter {
        self.inner.default_interrupter.clone()
    }

    /// Also stop when `interrupter` is set.
    pub fn add_interrupter(&mut self, interrupter: Interrupter) {
        self.inner.interrupters.borrow_mut().push(interrupter);
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.is_interrupted()
    }

    // ── Introspection ──

    pub fn state(&self) -> GraphState {
        self.inner.state()
    }

    pub fn settings(&self) -> &GraphSettings {
        self.inner.settings()
    }

    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.inner
            .components
            .borrow()
            .iter()
            .position(|slot| slot.name == name)
            .map(|i| ComponentId(i as u32))
    }

    pub fn component_name(&self, id: ComponentId) -> Option<String> {
        self.inner
            .components
            .borrow()
            .get(id.index())
            .map(|slot| slot.name.clone())
    }

    pub fn component_class_name(&self, id: ComponentId) -> Option<String> {
        self.inner
            .components
            .borrow()
            .get(id.index())
            .map(|slot| slot.class_name.clone())
    }

    pub fn component_kind(&self, id: ComponentId) -> Option<ComponentKind> {
        self.inner
            .components
            .borrow()
            .get(id.index())
            .map(|slot| slot.kind)
    }

    pub fn input_port(&self, component: ComponentId, name: &str) -> Option<PortId> {
        self.find_port(component, name, PortDirection::Input)
    }

    pub fn output_port(&self, component: ComponentId, name: &str) -> Option<PortId> {
        self.find_port(component, name, PortDirection::Output)
    }

    fn find_port(&self, component: ComponentId, name: &str, direction: PortDirection) -> Option<PortId> {
        let components = self.inner.components.borrow();
        components
            .get(component.index())?
            .ports
            .iter()
            .position(|p| p.direction == direction && p.name == name)
            .map(|i| PortId::new(component, i as u16))
    }

    pub fn port_count(&self, component: ComponentId) -> usize {
        self.inner
            .components
            .borrow()
            .get(component.index())
            .map_or(0, |slot| slot.ports.len())
    }

    pub fn ports(&self, component: ComponentId) -> Vec<PortInfo> {
        let mut ports = self.inner.ports(component, PortDirection::Input);
        ports.extend(self.inner.ports(component, PortDirection::Output));
        ports.sort_by_key(|p| p.id.port_index());
        ports
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.borrow().len()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.inner
            .connections
            .borrow()
            .iter()
            .map(ConnectionInfo::from)
            .collect()
    }

    /// Live message iterators created on `connection`.
    pub fn connection_iterators(&self, connection: ConnectionId) -> Vec<IteratorId> {
        self.inner
            .connections
            .borrow()
            .get(connection.index())
            .map(|c| c.iterators.clone())
            .unwrap_or_default()
    }

    /// Number of live (not yet finalized) message iterators.
    pub fn iterator_count(&self) -> usize {
        self.inner.iterators.borrow().len()
    }

    /// Upstream component a live iterator pulls from.
    pub fn iterator_component(&self, iterator: IteratorId) -> Option<ComponentId> {
        self.inner
            .iterator_record(iterator)
            .map(|record| record.component)
    }

    /// Downstream iterator of a live iterator, if it has one.
    pub fn iterator_downstream(&self, iterator: IteratorId) -> Option<IteratorId> {
        self.inner
            .iterator_record(iterator)
            .and_then(|record| record.downstream)
    }

    pub fn pool_stats(&self, kind: MessageKind) -> PoolStats {
        self.inner.pools.stats(kind)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("state", &self.state())
            .field("components", &self.component_count())
            .field("connections", &self.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::component::{SinkComponent, SourceComponent};
    use crate::pipeline::context::IteratorInit;
    use crate::pipeline::iterator::MessageIteratorImpl;

    struct Silent;

    impl SourceComponent for Silent {
        fn create_message_iterator(
            &mut self,
            _ctx: &mut IteratorInit<'_>,
            _port: &PortInfo,
        ) -> GraphResult<Box<dyn MessageIteratorImpl>> {
            Err(GraphError::callback("no iterators"))
        }
    }

    struct Done;

    impl SinkComponent for Done {
        fn graph_is_configured(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
            Ok(())
        }

        fn consume(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus> {
            Ok(ConsumeStatus::End)
        }
    }

    fn source_class() -> ComponentClass {
        ComponentClass::source("silent", |ctx, _params| {
            ctx.add_output_port("out")?;
            Ok(Box::new(Silent))
        })
    }

    fn sink_class() -> ComponentClass {
        ComponentClass::sink("done", |ctx, _params| {
            ctx.add_input_port("in")?;
            Ok(Box::new(Done))
        })
    }

    #[test]
    fn test_cycle_detection_linear() {
        let mut graph = Graph::new();
        let a = graph.add_component(&source_class(), "a", Params::empty()).unwrap();
        let b = graph.add_component(&sink_class(), "b", Params::empty()).unwrap();
        assert!(!graph.inner.would_create_cycle(a, b));
        graph
            .connect(
                graph.output_port(a, "out").unwrap(),
                graph.input_port(b, "in").unwrap(),
            )
            .unwrap();
        assert!(graph.inner.would_create_cycle(b, a));
    }

    #[test]
    fn test_run_with_only_exhausted_sink() {
        let mut graph = Graph::new();
        graph.add_component(&sink_class(), "sink", Params::empty()).unwrap();
        assert_eq!(graph.run().unwrap(), RunStatus::End);
        assert_eq!(graph.state(), GraphState::Configured);
        // Every sink is gone; later runs stay at end.
        assert_eq!(graph.run_once().unwrap(), RunStatus::End);
    }

    #[test]
    fn test_interrupter_is_polled_before_consuming() {
        let mut graph = Graph::new();
        graph.add_component(&sink_class(), "sink", Params::empty()).unwrap();
        let interrupter = Interrupter::new();
        graph.add_interrupter(interrupter.clone());
        interrupter.set();
        assert_eq!(graph.run().unwrap(), RunStatus::Interrupted);
        interrupter.reset();
        assert_eq!(graph.run().unwrap(), RunStatus::End);
    }

    #[test]
    fn test_ports_listing_keeps_declaration_order() {
        let mut graph = Graph::new();
        let src = graph.add_component(&source_class(), "src", Params::empty()).unwrap();
        let ports = graph.ports(src);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "out");
        assert_eq!(ports[0].direction, PortDirection::Output);
        assert!(!ports[0].connected);
        assert_eq!(graph.component_class_name(src).as_deref(), Some("silent"));
    }
}
