//! Topological scheduling.
//!
//! Kahn's algorithm over the connection graph. Every connection counts as
//! one edge, so a node fed on several ports only becomes ready once all of
//! them have fired. Ready nodes are visited in insertion order, which
//! makes schedules deterministic for a given document.

use super::error::{PipelineError, PipelineResult};
use super::graph::Pipeline;
use super::id::NodeId;
use std::collections::{HashMap, VecDeque};

/// Compute an execution order for the pipeline, or fail with
/// [`PipelineError::CycleDetected`] if the graph is not a DAG.
pub fn schedule(pipeline: &Pipeline) -> PipelineResult<Vec<NodeId>> {
    let mut in_degree: HashMap<NodeId, usize> = pipeline
        .nodes
        .iter()
        .map(|n| (n.id, 0))
        .collect();
    for conn in &pipeline.connections {
        if let Some(degree) = in_degree.get_mut(&conn.to_node) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = pipeline
        .nodes
        .iter()
        .filter(|n| in_degree.get(&n.id) == Some(&0))
        .map(|n| n.id)
        .collect();

    let mut order = Vec::with_capacity(pipeline.nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for conn in &pipeline.connections {
            if conn.from_node != id {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&conn.to_node) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(conn.to_node);
                }
            }
        }
    }

    if order.len() != pipeline.nodes.len() {
        return Err(PipelineError::CycleDetected);
    }
    Ok(order)
}
