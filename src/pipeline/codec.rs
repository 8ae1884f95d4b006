//! JSON document format.
//!
//! Documents store nodes under stable `node_N` ids and connections by
//! those ids plus port names. Runtime `NodeId`s are minted fresh on every
//! load. Algorithm nodes embed their pipeline as a nested document under
//! `pipeline_data`. Loading is lenient where a document can be partially
//! salvaged: connections that fail to resolve are dropped with a warning,
//! and unknown node kinds are skipped.

use super::error::{PipelineError, PipelineResult};
use super::graph::{Pipeline, PipelineArena};
use super::id::NodeId;
use super::node::{Node, NodeKind};
use super::param::ParamDef;
use super::port::{Connection, PORT_IMAGE};
use crate::ops::OperatorRegistry;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const FORMAT_VERSION: &str = "1.0";

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

fn default_port() -> String {
    PORT_IMAGE.to_string()
}

/// Older documents write an explicit `null` for the default port.
fn port_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let port = Option::<String>::deserialize(deserializer)?;
    Ok(port.unwrap_or_else(default_port))
}

#[derive(Debug, Serialize, Deserialize)]
struct PipelineFile {
    #[serde(default = "format_version")]
    version: String,
    nodes: Vec<NodeRecord>,
    connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    name: String,
    category: String,
    node_type: String,
    position: [f32; 2],
    color: [u8; 3],
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline_data: Option<Box<PipelineFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    algorithm_outputs: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionRecord {
    from_node: String,
    to_node: String,
    #[serde(default = "default_port", deserialize_with = "port_or_default")]
    to_parameter: String,
    #[serde(default = "default_port", deserialize_with = "port_or_default")]
    from_output: String,
}

/// Serialize the arena's root pipeline (and, recursively, everything it
/// embeds) to a JSON string.
pub fn to_json_string(arena: &PipelineArena) -> PipelineResult<String> {
    let file = encode_pipeline(arena, arena.root())?;
    Ok(serde_json::to_string_pretty(&file)?)
}

pub fn save_file(arena: &PipelineArena, path: &Path) -> PipelineResult<()> {
    let json = to_json_string(arena)?;
    fs::write(path, json)?;
    Ok(())
}

/// Parse a document and rebuild the arena, validating the result.
pub fn from_json_str(
    json: &str,
    registry: &OperatorRegistry,
) -> PipelineResult<PipelineArena> {
    let file: PipelineFile = serde_json::from_str(json)?;
    let mut arena = PipelineArena::new(Pipeline::new());
    let root = decode_pipeline(&file, &mut arena, registry)?;
    arena.set_root(root);
    arena.validate(registry)?;
    Ok(arena)
}

pub fn load_file(
    path: &Path,
    registry: &OperatorRegistry,
) -> PipelineResult<PipelineArena> {
    let json = fs::read_to_string(path)?;
    from_json_str(&json, registry)
}

fn encode_pipeline(
    arena: &PipelineArena,
    pipeline: &Pipeline,
) -> PipelineResult<PipelineFile> {
    let id_map: HashMap<NodeId, String> = pipeline
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, format!("node_{i}")))
        .collect();

    let mut nodes = Vec::with_capacity(pipeline.nodes.len());
    for node in &pipeline.nodes {
        let pipeline_data = match node.nested {
            Some(idx) => {
                let nested = arena.get(idx).ok_or(PipelineError::UnknownPipeline)?;
                Some(Box::new(encode_pipeline(arena, nested)?))
            }
            None => None,
        };
        nodes.push(NodeRecord {
            id: id_map[&node.id].clone(),
            name: node.name.clone(),
            category: node.category.clone(),
            node_type: node.kind.as_str().to_string(),
            position: node.position,
            color: node.color,
            parameters: node.parameters.clone(),
            pipeline_data,
            algorithm_outputs: (node.kind == NodeKind::Algorithm)
                .then(|| node.declared_outputs.clone()),
        });
    }

    let connections = pipeline
        .connections
        .iter()
        .map(|c| ConnectionRecord {
            from_node: id_map[&c.from_node].clone(),
            to_node: id_map[&c.to_node].clone(),
            to_parameter: c.to_parameter.clone(),
            from_output: c.from_output.clone(),
        })
        .collect();

    Ok(PipelineFile {
        version: FORMAT_VERSION.to_string(),
        nodes,
        connections,
    })
}

fn decode_pipeline(
    file: &PipelineFile,
    arena: &mut PipelineArena,
    registry: &OperatorRegistry,
) -> PipelineResult<Pipeline> {
    let mut pipeline = Pipeline::new();
    let mut id_map: HashMap<&str, NodeId> = HashMap::new();

    for record in &file.nodes {
        match NodeKind::from_str(&record.node_type) {
            // The singletons a fresh pipeline already carries are reused
            // rather than re-added.
            Some(NodeKind::Input) => {
                let Some(node) = pipeline.nodes.iter_mut().find(|n| n.kind == NodeKind::Input)
                else {
                    continue;
                };
                node.position = record.position;
                node.color = record.color;
                id_map.insert(&record.id, node.id);
            }
            Some(NodeKind::Output) => {
                let Some(node) = pipeline.nodes.iter_mut().find(|n| n.kind == NodeKind::Output)
                else {
                    continue;
                };
                node.position = record.position;
                node.color = record.color;
                id_map.insert(&record.id, node.id);
            }
            Some(NodeKind::Process) => {
                let mut node = Node::process(
                    &record.name,
                    &record.category,
                    registry.param_defs(&record.name),
                );
                node.position = record.position;
                node.color = record.color;
                // Stored values win over registry defaults.
                node.parameters
                    .extend(record.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
                let id = pipeline.add_node(node)?;
                id_map.insert(&record.id, id);
            }
            Some(NodeKind::Algorithm) => {
                let Some(nested_file) = &record.pipeline_data else {
                    warn!(node = %record.name, "algorithm node without pipeline_data, skipping");
                    continue;
                };
                let nested = decode_pipeline(nested_file, arena, registry)?;
                let param_defs = algorithm_inputs(&nested);
                let declared = record
                    .algorithm_outputs
                    .clone()
                    .unwrap_or_else(|| algorithm_outputs(&nested));
                let idx = arena.push(nested);
                let mut node = Node::algorithm(&record.name, idx, param_defs, declared);
                node.category = record.category.clone();
                node.position = record.position;
                node.color = record.color;
                node.parameters = record.parameters.clone();
                let id = pipeline.add_node(node)?;
                id_map.insert(&record.id, id);
            }
            None => {
                warn!(node_type = %record.node_type, "unknown node type, skipping node");
            }
        }
    }

    for record in &file.connections {
        let (Some(&from), Some(&to)) = (
            id_map.get(record.from_node.as_str()),
            id_map.get(record.to_node.as_str()),
        ) else {
            warn!(
                from = %record.from_node,
                to = %record.to_node,
                "connection references a missing node, dropping"
            );
            continue;
        };
        let conn = Connection::new(
            from,
            record.from_output.clone(),
            to,
            record.to_parameter.clone(),
        );
        if let Err(err) = pipeline.connect(registry, conn) {
            warn!(
                from = %record.from_node,
                to = %record.to_node,
                port = %record.to_parameter,
                error = %err,
                "dropping connection"
            );
        }
    }

    Ok(pipeline)
}

/// An algorithm node's input ports are whatever its embedded Input node
/// feeds besides the main image.
fn algorithm_inputs(nested: &Pipeline) -> Vec<ParamDef> {
    let Some(input_id) = nested.input_node().map(|n| n.id) else {
        return Vec::new();
    };
    let mut seen = Vec::new();
    for conn in &nested.connections {
        if conn.from_node != input_id || conn.to_parameter == PORT_IMAGE {
            continue;
        }
        if seen.iter().any(|d: &ParamDef| d.name == conn.to_parameter) {
            continue;
        }
        seen.push(ParamDef::image(conn.to_parameter.clone()));
    }
    seen
}

/// Documents without `algorithm_outputs` expose whatever the embedded
/// Output node is fed.
fn algorithm_outputs(nested: &Pipeline) -> Vec<String> {
    let Some(output_id) = nested.output_node().map(|n| n.id) else {
        return Vec::new();
    };
    let mut outputs = Vec::new();
    for conn in &nested.connections {
        if conn.to_node == output_id && !outputs.contains(&conn.to_parameter) {
            outputs.push(conn.to_parameter.clone());
        }
    }
    outputs
}
