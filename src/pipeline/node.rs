//! Node model.
//!
//! Every pipeline carries exactly one `Input` and one `Output` node;
//! everything in between is a `Process` node backed by an operator from
//! the registry, or an `Algorithm` node wrapping a nested pipeline.

use super::id::{NodeId, PipelineIdx};
use super::param::ParamDef;
use super::port::{Port, PORT_DATA, PORT_IMAGE};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Input,
    Output,
    Process,
    Algorithm,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Process => "process",
            NodeKind::Algorithm => "algorithm",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "input" => Some(NodeKind::Input),
            "output" => Some(NodeKind::Output),
            "process" => Some(NodeKind::Process),
            "algorithm" => Some(NodeKind::Algorithm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub category: String,
    pub kind: NodeKind,
    /// Canvas placement, kept purely so saved documents round-trip.
    pub position: [f32; 2],
    pub color: [u8; 3],
    /// Stored parameter values, keyed by parameter name. Values are kept
    /// as raw JSON so documents round-trip without loss.
    pub parameters: BTreeMap<String, Value>,
    /// Parameter descriptions. Derived from the operator registry (or from
    /// the nested pipeline's wiring) rather than serialized.
    pub param_defs: Vec<ParamDef>,
    /// For algorithm nodes, the arena slot of the embedded pipeline.
    pub nested: Option<PipelineIdx>,
    /// For algorithm nodes, the output ports the node exposes.
    pub declared_outputs: Vec<String>,
}

impl Node {
    fn new(kind: NodeKind, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            category: category.into(),
            kind,
            position: [0.0, 0.0],
            color: [120, 120, 120],
            parameters: BTreeMap::new(),
            param_defs: Vec::new(),
            nested: None,
            declared_outputs: Vec::new(),
        }
    }

    /// The source singleton every pipeline starts with.
    pub fn input() -> Self {
        let mut node = Self::new(NodeKind::Input, "Input", "Source");
        node.position = [50.0, 100.0];
        node.color = [50, 180, 100];
        node
    }

    /// The sink singleton every pipeline ends with.
    pub fn output() -> Self {
        let mut node = Self::new(NodeKind::Output, "Output", "Destination");
        node.position = [500.0, 100.0];
        node.color = [180, 50, 50];
        node
    }

    /// A processing node backed by a registered operator. Parameters are
    /// seeded from the definitions' defaults.
    pub fn process(
        name: impl Into<String>,
        category: impl Into<String>,
        param_defs: Vec<ParamDef>,
    ) -> Self {
        let mut node = Self::new(NodeKind::Process, name, category);
        node.parameters = param_defs
            .iter()
            .filter(|d| !d.default.is_null())
            .map(|d| (d.name.clone(), d.default.clone()))
            .collect();
        node.param_defs = param_defs;
        node
    }

    /// An algorithm node wrapping the pipeline at `nested` in the arena.
    pub fn algorithm(
        name: impl Into<String>,
        nested: PipelineIdx,
        param_defs: Vec<ParamDef>,
        declared_outputs: Vec<String>,
    ) -> Self {
        let mut node = Self::new(NodeKind::Algorithm, name, "Algorithm");
        node.nested = Some(nested);
        node.param_defs = param_defs;
        node.declared_outputs = if declared_outputs.is_empty() {
            vec![PORT_IMAGE.to_string()]
        } else {
            declared_outputs
        };
        node
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Convenience for setting a stored parameter value.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.kind, NodeKind::Input | NodeKind::Output)
    }

    /// Names of the input ports this node accepts connections on.
    pub fn input_ports(&self) -> Vec<String> {
        match self.kind {
            NodeKind::Input => Vec::new(),
            NodeKind::Output => vec![PORT_IMAGE.to_string(), PORT_DATA.to_string()],
            NodeKind::Process | NodeKind::Algorithm => {
                let mut ports = vec![PORT_IMAGE.to_string()];
                ports.extend(
                    self.param_defs
                        .iter()
                        .filter(|d| d.connectable)
                        .map(|d| d.name.clone()),
                );
                ports
            }
        }
    }

    /// Names of the output ports this node exposes. Process nodes expose a
    /// secondary "data" port only when their operator declares one.
    pub fn output_ports(&self, emits_data: bool) -> Vec<String> {
        match self.kind {
            NodeKind::Input => vec![PORT_IMAGE.to_string()],
            NodeKind::Output => Vec::new(),
            NodeKind::Process => {
                let mut ports = vec![PORT_IMAGE.to_string()];
                if emits_data {
                    ports.push(PORT_DATA.to_string());
                }
                ports
            }
            NodeKind::Algorithm => self.declared_outputs.clone(),
        }
    }

    /// All ports of the node, inputs first.
    pub fn ports(&self, emits_data: bool) -> Vec<Port> {
        self.input_ports()
            .into_iter()
            .map(Port::input)
            .chain(self.output_ports(emits_data).into_iter().map(Port::output))
            .collect()
    }
}
