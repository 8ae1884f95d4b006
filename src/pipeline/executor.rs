//! Pipeline execution.
//!
//! Runs a scheduled pipeline over one input frame. Per-node failures are
//! never fatal: a node without its main image input is skipped (and its
//! downstream starves in turn), an unknown or failing operator passes its
//! input through, and only structural problems abort the run.

use super::error::{PipelineError, PipelineResult};
use super::graph::{Pipeline, PipelineArena};
use super::id::NodeId;
use super::node::{Node, NodeKind};
use super::param::OpParams;
use super::port::{Connection, PORT_DATA, PORT_IMAGE};
use super::scheduler;
use crate::ops::OperatorRegistry;
use crate::types::Frame;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What a run of a pipeline produced at its Output node.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub image: Option<Frame>,
    pub data: Option<Value>,
}

impl PipelineOutput {
    pub fn into_image(self) -> Option<Frame> {
        self.image
    }
}

/// What one node produced during a run.
#[derive(Debug, Clone, Default)]
struct NodeOutputs {
    image: Option<Frame>,
    data: Option<Value>,
}

/// A value resolved over a connection.
enum Resolved {
    Image(Frame),
    Data(Value),
}

pub struct Executor<'a> {
    registry: &'a OperatorRegistry,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Run the arena's root pipeline over one frame.
    pub fn execute(
        &self,
        arena: &PipelineArena,
        input: &Frame,
    ) -> PipelineResult<PipelineOutput> {
        self.run(arena, arena.root(), input)
    }

    fn run(
        &self,
        arena: &PipelineArena,
        pipeline: &Pipeline,
        input: &Frame,
    ) -> PipelineResult<PipelineOutput> {
        let order = scheduler::schedule(pipeline)?;
        let mut results: HashMap<NodeId, NodeOutputs> = HashMap::new();
        let mut output = PipelineOutput::default();

        for id in order {
            let node = pipeline.node(id).ok_or(PipelineError::UnknownNode(id))?;
            let produced = match node.kind {
                NodeKind::Input => NodeOutputs {
                    image: Some(input.clone()),
                    data: None,
                },
                NodeKind::Output => {
                    output = self.collect_output(pipeline, node, &results);
                    NodeOutputs::default()
                }
                NodeKind::Process => self.run_process(pipeline, node, &results),
                NodeKind::Algorithm => {
                    self.run_algorithm(arena, pipeline, node, &results)?
                }
            };
            results.insert(id, produced);
        }

        Ok(output)
    }

    /// Look up what flows over a connection. `None` when the upstream node
    /// was skipped or never produced that port.
    fn resolve(
        results: &HashMap<NodeId, NodeOutputs>,
        conn: &Connection,
    ) -> Option<Resolved> {
        let upstream = results.get(&conn.from_node)?;
        if conn.from_output == PORT_DATA {
            upstream.data.clone().map(Resolved::Data)
        } else {
            upstream.image.clone().map(Resolved::Image)
        }
    }

    /// The frame arriving on the node's main image port, if any.
    fn main_input(
        pipeline: &Pipeline,
        node: &Node,
        results: &HashMap<NodeId, NodeOutputs>,
    ) -> Option<Frame> {
        pipeline
            .incoming(node.id)
            .filter(|c| c.is_main_input())
            .find_map(|c| match Self::resolve(results, c) {
                Some(Resolved::Image(frame)) => Some(frame),
                _ => None,
            })
    }

    fn run_process(
        &self,
        pipeline: &Pipeline,
        node: &Node,
        results: &HashMap<NodeId, NodeOutputs>,
    ) -> NodeOutputs {
        let Some(frame) = Self::main_input(pipeline, node, results) else {
            debug!(node = %node.name, "no image input, skipping node");
            return NodeOutputs::default();
        };

        let mut params = OpParams::from_values(node.parameters.clone());
        for conn in pipeline.incoming(node.id) {
            if conn.is_main_input() {
                continue;
            }
            match Self::resolve(results, conn) {
                Some(Resolved::Image(image)) => {
                    params.set_image(conn.to_parameter.clone(), image);
                }
                Some(Resolved::Data(value)) => {
                    params.set_value(conn.to_parameter.clone(), value);
                }
                // A starved parameter input keeps the stored value.
                None => {}
            }
        }

        match self.registry.apply(&node.name, &params, &frame) {
            Ok(out) => {
                let (image, data) = out.into_parts();
                NodeOutputs {
                    image: Some(image),
                    data,
                }
            }
            Err(err) => {
                warn!(node = %node.name, error = %err, "operator failed, passing image through");
                NodeOutputs {
                    image: Some(frame),
                    data: None,
                }
            }
        }
    }

    fn run_algorithm(
        &self,
        arena: &PipelineArena,
        pipeline: &Pipeline,
        node: &Node,
        results: &HashMap<NodeId, NodeOutputs>,
    ) -> PipelineResult<NodeOutputs> {
        let Some(frame) = Self::main_input(pipeline, node, results) else {
            debug!(node = %node.name, "no image input, skipping algorithm node");
            return Ok(NodeOutputs::default());
        };
        let Some(nested_idx) = node.nested else {
            warn!(node = %node.name, "algorithm node has no embedded pipeline, skipping");
            return Ok(NodeOutputs::default());
        };
        let nested = arena
            .get(nested_idx)
            .ok_or(PipelineError::UnknownPipeline)?;

        // Wired scalar inputs are merged into the embedded pipeline as
        // stored parameters before the recursive run.
        let mut nested = nested.clone();
        for conn in pipeline.incoming(node.id) {
            if conn.is_main_input() {
                continue;
            }
            match Self::resolve(results, conn) {
                Some(Resolved::Data(value)) => {
                    merge_scalar_input(&mut nested, &conn.to_parameter, value);
                }
                Some(Resolved::Image(_)) => {
                    warn!(
                        node = %node.name,
                        port = %conn.to_parameter,
                        "image-valued algorithm inputs are not supported, ignoring"
                    );
                }
                None => {}
            }
        }

        let out = self.run(arena, &nested, &frame)?;
        Ok(NodeOutputs {
            image: out.image,
            data: out.data,
        })
    }

    fn collect_output(
        &self,
        pipeline: &Pipeline,
        node: &Node,
        results: &HashMap<NodeId, NodeOutputs>,
    ) -> PipelineOutput {
        let mut output = PipelineOutput::default();
        for conn in pipeline.incoming(node.id) {
            match (conn.to_parameter.as_str(), Self::resolve(results, conn)) {
                (PORT_IMAGE, Some(Resolved::Image(frame))) => {
                    output.image = Some(frame);
                }
                (PORT_DATA, Some(Resolved::Data(value))) => {
                    output.data = Some(value);
                }
                _ => {}
            }
        }
        output
    }
}

/// Point a wired algorithm input at the node inside the embedded pipeline
/// that receives it: the target of the embedded Input's connection with a
/// matching parameter name.
fn merge_scalar_input(nested: &mut Pipeline, port: &str, value: Value) {
    let Some(input_id) = nested.input_node().map(|n| n.id) else {
        return;
    };
    let targets: Vec<NodeId> = nested
        .connections
        .iter()
        .filter(|c| c.from_node == input_id && c.to_parameter == port)
        .map(|c| c.to_node)
        .collect();
    for target in targets {
        if let Some(node) = nested.node_mut(target) {
            node.parameters.insert(port.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{OpOutput, OperatorSpec};
    use crate::pipeline::param::ParamDef;
    use image::Rgb;
    use serde_json::Value;

    fn frame(gray: u8) -> Frame {
        Frame::from_pixel(2, 2, Rgb([gray, gray, gray]))
    }

    fn linear_with(registry: &OperatorRegistry, node: Node) -> PipelineArena {
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let mid = pipeline.add_node(node).unwrap();
        pipeline.connect(registry, Connection::image(input, mid)).unwrap();
        pipeline.connect(registry, Connection::image(mid, output)).unwrap();
        PipelineArena::new(pipeline)
    }

    #[test]
    fn test_empty_pipeline_produces_nothing() {
        let registry = OperatorRegistry::with_builtins();
        let arena = PipelineArena::new(Pipeline::new());
        let out = Executor::new(&registry).execute(&arena, &frame(10)).unwrap();
        assert!(out.image.is_none());
        assert!(out.data.is_none());
    }

    #[test]
    fn test_input_wired_straight_to_output() {
        let registry = OperatorRegistry::with_builtins();
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        pipeline.connect(&registry, Connection::image(input, output)).unwrap();
        let arena = PipelineArena::new(pipeline);

        let out = Executor::new(&registry).execute(&arena, &frame(42)).unwrap();
        assert_eq!(out.image.unwrap(), frame(42));
    }

    #[test]
    fn test_unconnected_node_starves_downstream() {
        let registry = OperatorRegistry::with_builtins();
        let mut pipeline = Pipeline::new();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let blur = pipeline
            .add_node(Node::process(
                "Gaussian Blur",
                "Filter",
                registry.param_defs("Gaussian Blur"),
            ))
            .unwrap();
        // No edge from Input, so the blur node has no image and is skipped.
        pipeline.connect(&registry, Connection::image(blur, output)).unwrap();
        let arena = PipelineArena::new(pipeline);

        let out = Executor::new(&registry).execute(&arena, &frame(42)).unwrap();
        assert!(out.image.is_none());
    }

    #[test]
    fn test_skip_cascades_through_downstream_nodes() {
        let registry = OperatorRegistry::with_builtins();
        let mut pipeline = Pipeline::new();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let gray = pipeline
            .add_node(Node::process(
                "Grayscale",
                "Filter",
                registry.param_defs("Grayscale"),
            ))
            .unwrap();
        let binary = pipeline
            .add_node(Node::process(
                "Binary",
                "Threshold",
                registry.param_defs("Binary"),
            ))
            .unwrap();
        // No edge from Input: the first node skips, and the skip cascades
        // through its consumer even though that edge exists.
        pipeline.connect(&registry, Connection::image(gray, binary)).unwrap();
        pipeline.connect(&registry, Connection::image(binary, output)).unwrap();
        let arena = PipelineArena::new(pipeline);

        let out = Executor::new(&registry).execute(&arena, &frame(42)).unwrap();
        assert!(out.image.is_none());
        assert!(out.data.is_none());
    }

    #[test]
    fn test_failing_operator_passes_input_through() {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register(OperatorSpec {
            name: "Always Fails",
            category: "Test",
            emits_data: false,
            params: Vec::new,
            apply: |_, _| anyhow::bail!("boom"),
        });
        let node = Node::process("Always Fails", "Test", Vec::new());
        let arena = linear_with(&registry, node);

        let out = Executor::new(&registry).execute(&arena, &frame(42)).unwrap();
        assert_eq!(out.image.unwrap(), frame(42));
    }

    #[test]
    fn test_connected_parameter_overrides_stored_value() {
        // An operator that reports the value it saw for "Level".
        let mut registry = OperatorRegistry::with_builtins();
        registry.register(OperatorSpec {
            name: "Fill Level",
            category: "Test",
            emits_data: false,
            params: || vec![ParamDef::int("Level", 10, 0, 255).connectable()],
            apply: |params, frame| {
                let level = params.get_i64("Level", 10).clamp(0, 255) as u8;
                Ok(OpOutput::Image(Frame::from_pixel(
                    frame.width(),
                    frame.height(),
                    Rgb([level, level, level]),
                )))
            },
        });
        registry.register(OperatorSpec {
            name: "Emit Level",
            category: "Test",
            emits_data: true,
            params: Vec::new,
            apply: |_, frame| {
                Ok(OpOutput::WithData {
                    image: frame.clone(),
                    data: Value::from(200),
                })
            },
        });

        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let emit = pipeline
            .add_node(Node::process("Emit Level", "Test", Vec::new()))
            .unwrap();
        let fill = pipeline
            .add_node(Node::process(
                "Fill Level",
                "Test",
                registry.param_defs("Fill Level"),
            ))
            .unwrap();
        pipeline.connect(&registry, Connection::image(input, emit)).unwrap();
        pipeline.connect(&registry, Connection::image(emit, fill)).unwrap();
        pipeline
            .connect(&registry, Connection::new(emit, "data", fill, "Level"))
            .unwrap();
        pipeline.connect(&registry, Connection::image(fill, output)).unwrap();
        let arena = PipelineArena::new(pipeline);

        let out = Executor::new(&registry).execute(&arena, &frame(42)).unwrap();
        // The wired value (200) wins over the stored default (10), and the
        // node's stored parameters are untouched afterwards.
        assert_eq!(out.image.unwrap().get_pixel(0, 0).0, [200, 200, 200]);
        assert_eq!(
            arena.root().node(fill).unwrap().parameters.get("Level"),
            Some(&Value::from(10))
        );
    }

    #[test]
    fn test_data_port_reaches_output() {
        let registry = OperatorRegistry::with_builtins();
        let mut pipeline = Pipeline::new();
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let analyze = pipeline
            .add_node(Node::process(
                "Object Characteristics",
                "Analysis",
                registry.param_defs("Object Characteristics"),
            ))
            .unwrap();
        pipeline.connect(&registry, Connection::image(input, analyze)).unwrap();
        pipeline.connect(&registry, Connection::image(analyze, output)).unwrap();
        pipeline
            .connect(&registry, Connection::new(analyze, "data", output, "data"))
            .unwrap();
        let arena = PipelineArena::new(pipeline);

        let mut img = Frame::from_pixel(8, 8, Rgb([0, 0, 0]));
        img.put_pixel(3, 3, Rgb([255, 255, 255]));
        let out = Executor::new(&registry).execute(&arena, &img).unwrap();
        assert!(out.image.is_some());
        assert_eq!(out.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_algorithm_node_runs_nested_pipeline() {
        let registry = OperatorRegistry::with_builtins();

        let mut nested = Pipeline::new();
        let n_in = nested.input_node().map(|n| n.id).unwrap();
        let n_out = nested.output_node().map(|n| n.id).unwrap();
        let binary = nested
            .add_node(Node::process(
                "Binary",
                "Threshold",
                registry.param_defs("Binary"),
            ))
            .unwrap();
        nested.connect(&registry, Connection::image(n_in, binary)).unwrap();
        nested.connect(&registry, Connection::image(binary, n_out)).unwrap();

        let mut arena = PipelineArena::new(Pipeline::new());
        let nested_idx = arena.push(nested);
        let root = arena.root_mut();
        let input = root.input_node().map(|n| n.id).unwrap();
        let output = root.output_node().map(|n| n.id).unwrap();
        let algo = root
            .add_node(Node::algorithm("Threshold Algo", nested_idx, Vec::new(), Vec::new()))
            .unwrap();
        root.connect(&registry, Connection::image(input, algo)).unwrap();
        root.connect(&registry, Connection::image(algo, output)).unwrap();

        let out = Executor::new(&registry).execute(&arena, &frame(200)).unwrap();
        assert_eq!(out.image.unwrap().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_algorithm_scalar_input_merges_into_nested_node() {
        let registry = OperatorRegistry::with_builtins();

        let mut nested = Pipeline::new();
        let n_in = nested.input_node().map(|n| n.id).unwrap();
        let n_out = nested.output_node().map(|n| n.id).unwrap();
        let binary = nested
            .add_node(Node::process(
                "Binary",
                "Threshold",
                registry.param_defs("Binary"),
            ))
            .unwrap();
        nested.connect(&registry, Connection::image(n_in, binary)).unwrap();
        nested
            .connect(&registry, Connection::new(n_in, "image", binary, "Threshold"))
            .unwrap_err();
        // "Threshold" is not connectable, so merging goes through the
        // executor path instead: simulate the wiring directly.
        nested.connections.push(Connection::new(n_in, "image", binary, "Threshold"));

        let mut arena = PipelineArena::new(Pipeline::new());
        let nested_idx = arena.push(nested);

        let mut merged = arena.get(nested_idx).unwrap().clone();
        merge_scalar_input(&mut merged, "Threshold", Value::from(250));
        assert_eq!(
            merged.node(binary).unwrap().parameters.get("Threshold"),
            Some(&Value::from(250))
        );
        // The arena copy is untouched.
        assert_eq!(
            arena.get(nested_idx).unwrap().node(binary).unwrap().parameters["Threshold"],
            Value::from(127)
        );
    }
}
