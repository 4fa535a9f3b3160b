//! Component abstraction for the graph.
//!
//! Two layers:
//! - **`ComponentClass`** describes a class: its name and an init callback
//!   resolved once to one of the three variants.
//! - **`AnyComponent`** is the closed sum of initialized components. Each
//!   variant has its own capability trait (`SourceComponent`,
//!   `FilterComponent`, `SinkComponent`), so illegal callbacks (a source
//!   consuming, a sink producing iterators) cannot be expressed.

use crate::pipeline::context::{IteratorInit, SelfComponent};
use crate::pipeline::error::GraphResult;
use crate::pipeline::iterator::MessageIteratorImpl;
use crate::pipeline::params::Params;
use crate::pipeline::port::{PortDirection, PortInfo};
use std::fmt;
use std::rc::Rc;

/// The three component variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Source,
    Filter,
    Sink,
}

impl ComponentKind {
    /// Whether a component of this kind may own a port of `direction`.
    pub fn allows(self, direction: PortDirection) -> bool {
        match (self, direction) {
            (ComponentKind::Source, PortDirection::Input) => false,
            (ComponentKind::Sink, PortDirection::Output) => false,
            _ => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Source => "source",
            ComponentKind::Filter => "filter",
            ComponentKind::Sink => "sink",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one sink consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    /// Made progress; more to do.
    Ok,
    /// Nothing ready right now.
    Again,
    /// Exhausted for good.
    End,
}

/// A component producing messages on output ports only.
pub trait SourceComponent {
    fn output_port_connected(
        &mut self,
        _ctx: &mut SelfComponent<'_>,
        _port: &PortInfo,
    ) -> GraphResult<()> {
        Ok(())
    }

    /// Create the iterator implementation for one of this component's
    /// connected output ports.
    fn create_message_iterator(
        &mut self,
        ctx: &mut IteratorInit<'_>,
        port: &PortInfo,
    ) -> GraphResult<Box<dyn MessageIteratorImpl>>;

    fn finalize(&mut self) {}
}

/// A component reading input ports and producing on output ports.
pub trait FilterComponent {
    fn input_port_connected(
        &mut self,
        _ctx: &mut SelfComponent<'_>,
        _port: &PortInfo,
    ) -> GraphResult<()> {
        Ok(())
    }

    fn output_port_connected(
        &mut self,
        _ctx: &mut SelfComponent<'_>,
        _port: &PortInfo,
    ) -> GraphResult<()> {
        Ok(())
    }

    fn create_message_iterator(
        &mut self,
        ctx: &mut IteratorInit<'_>,
        port: &PortInfo,
    ) -> GraphResult<Box<dyn MessageIteratorImpl>>;

    fn finalize(&mut self) {}
}

/// A terminal component driving the pull chain.
pub trait SinkComponent {
    fn input_port_connected(
        &mut self,
        _ctx: &mut SelfComponent<'_>,
        _port: &PortInfo,
    ) -> GraphResult<()> {
        Ok(())
    }

    /// Called exactly once, when the graph becomes configured. Sinks usually
    /// create their input message iterators here.
    fn graph_is_configured(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<()>;

    fn consume(&mut self, ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus>;

    fn finalize(&mut self) {}
}

/// An initialized component of any variant.
pub enum AnyComponent {
    Source(Box<dyn SourceComponent>),
    Filter(Box<dyn FilterComponent>),
    Sink(Box<dyn SinkComponent>),
}

impl AnyComponent {
    pub fn kind(&self) -> ComponentKind {
        match self {
            AnyComponent::Source(_) => ComponentKind::Source,
            AnyComponent::Filter(_) => ComponentKind::Filter,
            AnyComponent::Sink(_) => ComponentKind::Sink,
        }
    }

    pub(crate) fn port_connected(
        &mut self,
        ctx: &mut SelfComponent<'_>,
        port: &PortInfo,
    ) -> GraphResult<()> {
        match (self, port.direction) {
            (AnyComponent::Source(c), PortDirection::Output) => c.output_port_connected(ctx, port),
            (AnyComponent::Filter(c), PortDirection::Input) => c.input_port_connected(ctx, port),
            (AnyComponent::Filter(c), PortDirection::Output) => c.output_port_connected(ctx, port),
            (AnyComponent::Sink(c), PortDirection::Input) => c.input_port_connected(ctx, port),
            (other, direction) => unreachable!(
                "a {} component cannot own an {} port",
                other.kind(),
                direction
            ),
        }
    }

    pub(crate) fn create_message_iterator(
        &mut self,
        ctx: &mut IteratorInit<'_>,
        port: &PortInfo,
    ) -> GraphResult<Box<dyn MessageIteratorImpl>> {
        match self {
            AnyComponent::Source(c) => c.create_message_iterator(ctx, port),
            AnyComponent::Filter(c) => c.create_message_iterator(ctx, port),
            AnyComponent::Sink(_) => unreachable!("sink components have no output ports"),
        }
    }

    pub(crate) fn as_sink_mut(&mut self) -> Option<&mut dyn SinkComponent> {
        match self {
            AnyComponent::Sink(c) => Some(c.as_mut()),
            _ => None,
        }
    }

    pub(crate) fn finalize(&mut self) {
        match self {
            AnyComponent::Source(c) => c.finalize(),
            AnyComponent::Filter(c) => c.finalize(),
            AnyComponent::Sink(c) => c.finalize(),
        }
    }
}

type SourceInit = dyn Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn SourceComponent>>;
type FilterInit = dyn Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn FilterComponent>>;
type SinkInit = dyn Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn SinkComponent>>;

#[derive(Clone)]
enum ClassInit {
    Source(Rc<SourceInit>),
    Filter(Rc<FilterInit>),
    Sink(Rc<SinkInit>),
}

/// A component class: a name plus an init callback.
///
/// Init runs once per component with the frozen parameters; it typically
/// adds the component's initial ports and returns its behaviour.
#[derive(Clone)]
pub struct ComponentClass {
    name: String,
    description: Option<String>,
    init: ClassInit,
}

impl ComponentClass {
    pub fn source<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn SourceComponent>> + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            init: ClassInit::Source(Rc::new(init)),
        }
    }

    pub fn filter<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn FilterComponent>> + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            init: ClassInit::Filter(Rc::new(init)),
        }
    }

    pub fn sink<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn(&mut SelfComponent<'_>, &Params) -> GraphResult<Box<dyn SinkComponent>> + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            init: ClassInit::Sink(Rc::new(init)),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> ComponentKind {
        match self.init {
            ClassInit::Source(_) => ComponentKind::Source,
            ClassInit::Filter(_) => ComponentKind::Filter,
            ClassInit::Sink(_) => ComponentKind::Sink,
        }
    }

    pub(crate) fn init(
        &self,
        ctx: &mut SelfComponent<'_>,
        params: &Params,
    ) -> GraphResult<AnyComponent> {
        Ok(match &self.init {
            ClassInit::Source(f) => AnyComponent::Source(f(ctx, params)?),
            ClassInit::Filter(f) => AnyComponent::Filter(f(ctx, params)?),
            ClassInit::Sink(f) => AnyComponent::Sink(f(ctx, params)?),
        })
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_port_rules() {
        assert!(!ComponentKind::Source.allows(PortDirection::Input));
        assert!(ComponentKind::Source.allows(PortDirection::Output));
        assert!(ComponentKind::Filter.allows(PortDirection::Input));
        assert!(ComponentKind::Filter.allows(PortDirection::Output));
        assert!(!ComponentKind::Sink.allows(PortDirection::Output));
    }

    #[test]
    fn test_class_kind_is_resolved_at_construction() {
        struct Nothing;
        impl SinkComponent for Nothing {
            fn graph_is_configured(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<()> {
                Ok(())
            }
            fn consume(&mut self, _ctx: &mut SelfComponent<'_>) -> GraphResult<ConsumeStatus> {
                Ok(ConsumeStatus::End)
            }
        }

        let class = ComponentClass::sink("nothing", |_ctx, _params| Ok(Box::new(Nothing)))
            .with_description("consumes nothing");
        assert_eq!(class.kind(), ComponentKind::Sink);
        assert_eq!(class.name(), "nothing");
        assert_eq!(class.description(), Some("consumes nothing"));
    }
}
