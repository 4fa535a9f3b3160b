//! Connections: graph edges joining one output port to one input port.

use crate::pipeline::id::{ConnectionId, IteratorId, PortId};

/// An edge between an upstream output port and a downstream input port.
///
/// Owned by the graph. The message iterators created on it are listed by
/// ID only; each iterator removes itself when finalized.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub upstream: PortId,
    pub downstream: PortId,
    pub iterators: Vec<IteratorId>,
    pub notified_upstream: bool,
    pub notified_downstream: bool,
}

impl Connection {
    pub fn new(id: ConnectionId, upstream: PortId, downstream: PortId) -> Self {
        Self {
            id,
            upstream,
            downstream,
            iterators: Vec::new(),
            notified_upstream: false,
            notified_downstream: false,
        }
    }

    /// Both endpoints accepted the connection.
    pub fn is_established(&self) -> bool {
        self.notified_upstream && self.notified_downstream
    }

    pub fn remove_iterator(&mut self, iterator: IteratorId) {
        self.iterators.retain(|&id| id != iterator);
    }
}

/// Public view of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub upstream: PortId,
    pub downstream: PortId,
    /// Both endpoint components accepted the connection.
    pub established: bool,
}

impl From<&Connection> for ConnectionInfo {
    fn from(conn: &Connection) -> Self {
        Self {
            id: conn.id,
            upstream: conn.upstream,
            downstream: conn.downstream,
            established: conn.is_established(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::ComponentId;

    #[test]
    fn test_connection_iterator_bookkeeping() {
        let mut conn = Connection::new(
            ConnectionId(0),
            PortId::new(ComponentId(0), 0),
            PortId::new(ComponentId(1), 0),
        );
        conn.iterators.push(IteratorId(1));
        conn.iterators.push(IteratorId(2));
        conn.remove_iterator(IteratorId(1));
        assert_eq!(conn.iterators, vec![IteratorId(2)]);
        assert!(!conn.is_established());

        conn.notified_upstream = true;
        conn.notified_downstream = true;
        assert!(conn.is_established());
    }
}
