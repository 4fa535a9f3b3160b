//! Ports: named connection points owned by a component.
//!
//! A port's direction never changes. Its connection is a non-owning
//! [`ConnectionId`] into the graph's connection table.

use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::id::{ConnectionId, PortId};

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// A port as stored in its component slot.
#[derive(Debug, Clone)]
pub(crate) struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub connection: Option<ConnectionId>,
}

impl Port {
    pub fn new(name: String, direction: PortDirection) -> Self {
        Self {
            name,
            direction,
            connection: None,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// Read-only view of a port handed out to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub id: PortId,
    pub name: String,
    pub direction: PortDirection,
    pub connected: bool,
}

/// Check a new port name against the existing ports of the same direction.
pub(crate) fn validate_port_name(
    ports: &[Port],
    name: &str,
    direction: PortDirection,
) -> GraphResult<()> {
    if name.is_empty() {
        return Err(GraphError::InvalidPortName {
            name: name.to_string(),
            reason: "port names cannot be empty",
        });
    }
    if ports
        .iter()
        .any(|p| p.direction == direction && p.name == name)
    {
        return Err(GraphError::InvalidPortName {
            name: name.to_string(),
            reason: "a port with this name and direction already exists",
        });
    }
    if ports.len() >= PortId::MAX_PORTS {
        return Err(GraphError::InvalidPortName {
            name: name.to_string(),
            reason: "the component has reached its port limit",
        });
    }
    Ok(())
}
