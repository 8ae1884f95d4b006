//! The pipeline graph and the arena holding nested pipelines.

use super::error::{PipelineError, PipelineResult};
use super::id::{ConnectionId, NodeId, PipelineIdx};
use super::node::{Node, NodeKind};
use super::port::Connection;
use super::scheduler;
use crate::ops::OperatorRegistry;

/// A single dataflow graph. Nodes and connections keep their insertion
/// order, which the scheduler uses to break ties deterministically.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

impl Pipeline {
    /// A fresh pipeline, pre-seeded with its Input and Output singletons.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::input(), Node::output()],
            connections: Vec::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn input_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Input)
    }

    pub fn output_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Output)
    }

    /// Add a node, rejecting a second Input or Output.
    pub fn add_node(&mut self, node: Node) -> PipelineResult<NodeId> {
        match node.kind {
            NodeKind::Input if self.input_node().is_some() => {
                return Err(PipelineError::DuplicateSingleton("Input"));
            }
            NodeKind::Output if self.output_node().is_some() => {
                return Err(PipelineError::DuplicateSingleton("Output"));
            }
            _ => {}
        }
        let id = node.id;
        self.nodes.push(node);
        Ok(id)
    }

    /// Remove a node and every connection touching it. The Input and
    /// Output singletons cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> PipelineResult<Node> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(PipelineError::UnknownNode(id))?;
        if self.nodes[pos].is_singleton() {
            return Err(PipelineError::InvalidConnection(
                "input and output nodes cannot be removed".into(),
            ));
        }
        self.connections
            .retain(|c| c.from_node != id && c.to_node != id);
        Ok(self.nodes.remove(pos))
    }

    /// Validate and add a connection.
    ///
    /// Rejects self-loops, duplicate endpoints, unknown nodes, and port
    /// names neither endpoint declares. The registry decides whether the
    /// source node exposes a secondary "data" output.
    pub fn connect(
        &mut self,
        registry: &OperatorRegistry,
        connection: Connection,
    ) -> PipelineResult<ConnectionId> {
        if connection.from_node == connection.to_node {
            return Err(PipelineError::InvalidConnection(
                "a node cannot connect to itself".into(),
            ));
        }
        if self
            .connections
            .iter()
            .any(|c| c.same_endpoints(&connection))
        {
            return Err(PipelineError::InvalidConnection(format!(
                "duplicate connection on port '{}'",
                connection.to_parameter
            )));
        }
        let from = self
            .node(connection.from_node)
            .ok_or(PipelineError::UnknownNode(connection.from_node))?;
        let to = self
            .node(connection.to_node)
            .ok_or(PipelineError::UnknownNode(connection.to_node))?;

        let emits_data = registry.emits_data(&from.name);
        if !from
            .output_ports(emits_data)
            .iter()
            .any(|p| p == &connection.from_output)
        {
            return Err(PipelineError::InvalidConnection(format!(
                "node '{}' has no output '{}'",
                from.name, connection.from_output
            )));
        }
        if !to
            .input_ports()
            .iter()
            .any(|p| p == &connection.to_parameter)
        {
            return Err(PipelineError::InvalidConnection(format!(
                "node '{}' has no input '{}'",
                to.name, connection.to_parameter
            )));
        }

        let id = connection.id;
        self.connections.push(connection);
        Ok(id)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != before
    }

    /// Connections feeding the given node.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.to_node == id)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat storage for a root pipeline and every pipeline nested inside it.
///
/// Algorithm nodes refer to their embedded pipeline by [`PipelineIdx`]
/// instead of owning it, so arbitrarily deep nesting needs no recursive
/// ownership. Slot 0 is always the root.
#[derive(Debug, Clone)]
pub struct PipelineArena {
    pipelines: Vec<Pipeline>,
}

impl PipelineArena {
    pub fn new(root: Pipeline) -> Self {
        Self {
            pipelines: vec![root],
        }
    }

    pub fn root(&self) -> &Pipeline {
        &self.pipelines[PipelineIdx::ROOT.index()]
    }

    pub fn root_mut(&mut self) -> &mut Pipeline {
        &mut self.pipelines[PipelineIdx::ROOT.index()]
    }

    pub fn set_root(&mut self, pipeline: Pipeline) {
        self.pipelines[PipelineIdx::ROOT.index()] = pipeline;
    }

    pub fn push(&mut self, pipeline: Pipeline) -> PipelineIdx {
        self.pipelines.push(pipeline);
        PipelineIdx((self.pipelines.len() - 1) as u32)
    }

    pub fn get(&self, idx: PipelineIdx) -> Option<&Pipeline> {
        self.pipelines.get(idx.index())
    }

    pub fn get_mut(&mut self, idx: PipelineIdx) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(idx.index())
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Full structural validation: singletons present, every connection
    /// endpoint resolves, every pipeline is schedulable, nested indices
    /// exist, and the nesting graph is acyclic.
    pub fn validate(&self, registry: &OperatorRegistry) -> PipelineResult<()> {
        for pipeline in &self.pipelines {
            if pipeline.input_node().is_none() {
                return Err(PipelineError::MissingSingleton("Input"));
            }
            if pipeline.output_node().is_none() {
                return Err(PipelineError::MissingSingleton("Output"));
            }
            for conn in &pipeline.connections {
                let from = pipeline
                    .node(conn.from_node)
                    .ok_or(PipelineError::UnknownNode(conn.from_node))?;
                let to = pipeline
                    .node(conn.to_node)
                    .ok_or(PipelineError::UnknownNode(conn.to_node))?;
                if !from
                    .output_ports(registry.emits_data(&from.name))
                    .contains(&conn.from_output)
                {
                    return Err(PipelineError::InvalidConnection(format!(
                        "node '{}' has no output '{}'",
                        from.name, conn.from_output
                    )));
                }
                if !to.input_ports().contains(&conn.to_parameter) {
                    return Err(PipelineError::InvalidConnection(format!(
                        "node '{}' has no input '{}'",
                        to.name, conn.to_parameter
                    )));
                }
            }
            for node in &pipeline.nodes {
                if let Some(nested) = node.nested {
                    if nested.index() >= self.pipelines.len() {
                        return Err(PipelineError::UnknownPipeline);
                    }
                }
            }
            scheduler::schedule(pipeline)?;
        }
        self.check_nesting_acyclic()?;
        Ok(())
    }

    /// DFS over the "pipeline embeds pipeline" graph. A back edge means an
    /// algorithm node transitively embeds its own pipeline, which would
    /// recurse forever at execution time.
    fn check_nesting_acyclic(&self) -> PipelineResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        fn visit(
            arena: &PipelineArena,
            idx: usize,
            marks: &mut [Mark],
        ) -> PipelineResult<()> {
            marks[idx] = Mark::Gray;
            for node in &arena.pipelines[idx].nodes {
                if let Some(nested) = node.nested {
                    let next = nested.index();
                    match marks[next] {
                        Mark::Gray => return Err(PipelineError::NestingCycle),
                        Mark::White => visit(arena, next, marks)?,
                        Mark::Black => {}
                    }
                }
            }
            marks[idx] = Mark::Black;
            Ok(())
        }

        let mut marks = vec![Mark::White; self.pipelines.len()];
        for idx in 0..self.pipelines.len() {
            if marks[idx] == Mark::White {
                visit(self, idx, &mut marks)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::port::PORT_IMAGE;

    fn registry() -> OperatorRegistry {
        OperatorRegistry::with_builtins()
    }

    #[test]
    fn test_new_pipeline_has_singletons() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.input_node().is_some());
        assert!(pipeline.output_node().is_some());
        assert!(pipeline.add_node(Node::input()).is_err());
        assert!(pipeline.add_node(Node::output()).is_err());
    }

    #[test]
    fn test_singletons_cannot_be_removed() {
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id);
        assert!(pipeline.remove_node(input.unwrap()).is_err());
    }

    #[test]
    fn test_connect_rejects_self_loop_and_duplicates() {
        let registry = registry();
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();

        assert!(pipeline
            .connect(&registry, Connection::image(input, input))
            .is_err());

        pipeline
            .connect(&registry, Connection::image(input, output))
            .unwrap();
        assert!(pipeline
            .connect(&registry, Connection::image(input, output))
            .is_err());
    }

    #[test]
    fn test_connect_rejects_undeclared_ports() {
        let registry = registry();
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let node = pipeline
            .add_node(Node::process(
                "Gaussian Blur",
                "Filter",
                registry.param_defs("Gaussian Blur"),
            ))
            .unwrap();

        // "data" only exists on operators that declare it.
        assert!(pipeline
            .connect(
                &registry,
                Connection::new(node, "data", input, PORT_IMAGE)
            )
            .is_err());
        assert!(pipeline
            .connect(
                &registry,
                Connection::new(input, PORT_IMAGE, node, "No Such Param")
            )
            .is_err());
    }

    #[test]
    fn test_remove_node_drops_its_connections() {
        let registry = registry();
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let node = pipeline
            .add_node(Node::process(
                "Grayscale",
                "Filter",
                registry.param_defs("Grayscale"),
            ))
            .unwrap();
        pipeline
            .connect(&registry, Connection::image(input, node))
            .unwrap();
        pipeline
            .connect(&registry, Connection::image(node, output))
            .unwrap();

        pipeline.remove_node(node).unwrap();
        assert!(pipeline.connections.is_empty());
    }

    #[test]
    fn test_nesting_cycle_detected() {
        let registry = registry();
        let mut arena = PipelineArena::new(Pipeline::new());
        let nested_idx = arena.push(Pipeline::new());

        // Make the nested pipeline embed the root.
        arena
            .get_mut(nested_idx)
            .unwrap()
            .add_node(Node::algorithm(
                "Loop",
                PipelineIdx::ROOT,
                Vec::new(),
                Vec::new(),
            ))
            .unwrap();
        arena
            .root_mut()
            .add_node(Node::algorithm("Algo", nested_idx, Vec::new(), Vec::new()))
            .unwrap();

        assert!(matches!(
            arena.validate(&registry),
            Err(PipelineError::NestingCycle)
        ));
    }
}
