//! Ports and connections.
//!
//! A port is just a name on a node: inputs are the node's main image slot
//! plus its connectable parameters, outputs are whatever the node produces.
//! Connections join one output port to one input port.

use super::id::{ConnectionId, NodeId};

/// The main image port every process node consumes and produces.
pub const PORT_IMAGE: &str = "image";

/// The secondary data port emitted by analysis operators.
pub const PORT_DATA: &str = "data";

/// Which side of a node a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// A named slot on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
}

impl Port {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
        }
    }
}

/// A directed edge from one node's output port to another node's input port.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub from_node: NodeId,
    pub from_output: String,
    pub to_node: NodeId,
    pub to_parameter: String,
}

impl Connection {
    pub fn new(
        from_node: NodeId,
        from_output: impl Into<String>,
        to_node: NodeId,
        to_parameter: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_output: from_output.into(),
            to_node,
            to_parameter: to_parameter.into(),
        }
    }

    /// Edge carrying the main image from one node to another.
    pub fn image(from_node: NodeId, to_node: NodeId) -> Self {
        Self::new(from_node, PORT_IMAGE, to_node, PORT_IMAGE)
    }

    /// True if this edge feeds the receiving node's main image slot.
    pub fn is_main_input(&self) -> bool {
        self.to_parameter == PORT_IMAGE
    }

    /// Two connections are duplicates when all four endpoints match,
    /// regardless of their ids.
    pub fn same_endpoints(&self, other: &Connection) -> bool {
        self.from_node == other.from_node
            && self.from_output == other.from_output
            && self.to_node == other.to_node
            && self.to_parameter == other.to_parameter
    }
}
