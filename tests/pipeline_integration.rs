//! End-to-end tests: documents on disk, scheduling, execution, and the
//! batch runner working together.

use image::Rgb;
use pixelflow::ops::OperatorRegistry;
use pixelflow::pipeline::{codec, scheduler, Connection, Executor, Node, Pipeline, PipelineArena};
use pixelflow::runner::{spawn_batch, BatchMessage};
use pixelflow::types::Frame;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn gray_frame_2x2(values: [[u8; 2]; 2]) -> Frame {
    let mut frame = Frame::new(2, 2);
    for (y, row) in values.iter().enumerate() {
        for (x, v) in row.iter().enumerate() {
            frame.put_pixel(x as u32, y as u32, Rgb([*v, *v, *v]));
        }
    }
    frame
}

fn threshold_document() -> String {
    json!({
        "version": "1.0",
        "nodes": [
            {"id": "node_0", "name": "Input", "category": "Source",
             "node_type": "input", "position": [50.0, 100.0], "color": [50, 180, 100]},
            {"id": "node_1", "name": "Output", "category": "Destination",
             "node_type": "output", "position": [500.0, 100.0], "color": [180, 50, 50]},
            {"id": "node_2", "name": "Binary", "category": "Threshold",
             "node_type": "process", "position": [250.0, 100.0], "color": [100, 100, 200],
             "parameters": {"Threshold": 127, "Max Value": 255}}
        ],
        "connections": [
            {"from_node": "node_0", "to_node": "node_2"},
            {"from_node": "node_2", "to_node": "node_1"}
        ]
    })
    .to_string()
}

#[test]
fn threshold_pipeline_from_document() {
    let registry = OperatorRegistry::with_builtins();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threshold.json");
    std::fs::write(&path, threshold_document()).unwrap();

    let arena = codec::load_file(&path, &registry).unwrap();

    // Scheduling is deterministic: source, threshold, sink.
    let order = scheduler::schedule(arena.root()).unwrap();
    let names: Vec<_> = order
        .iter()
        .map(|id| arena.root().node(*id).unwrap().name.as_str())
        .collect();
    assert_eq!(names, vec!["Input", "Binary", "Output"]);

    let input = gray_frame_2x2([[50, 200], [127, 255]]);
    let out = Executor::new(&registry).execute(&arena, &input).unwrap();
    let image = out.image.unwrap();
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);
    assert_eq!(image.get_pixel(0, 1).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255]);
}

#[test]
fn save_load_execute_matches_original() {
    let registry = OperatorRegistry::with_builtins();
    let mut pipeline = Pipeline::new();
    let input = pipeline.input_node().map(|n| n.id).unwrap();
    let output = pipeline.output_node().map(|n| n.id).unwrap();
    let add = pipeline
        .add_node(
            Node::process("Add", "Arithmetic", registry.param_defs("Add"))
                .with_parameter("Value", Value::from(30)),
        )
        .unwrap();
    pipeline.connect(&registry, Connection::image(input, add)).unwrap();
    pipeline.connect(&registry, Connection::image(add, output)).unwrap();
    let arena = PipelineArena::new(pipeline);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("add.json");
    codec::save_file(&arena, &path).unwrap();
    let loaded = codec::load_file(&path, &registry).unwrap();

    let frame = Frame::from_pixel(3, 3, Rgb([100, 0, 250]));
    let executor = Executor::new(&registry);
    let a = executor.execute(&arena, &frame).unwrap().image.unwrap();
    let b = executor.execute(&loaded, &frame).unwrap().image.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.get_pixel(0, 0).0, [130, 30, 255]);
}

#[test]
fn unknown_operator_node_passes_image_through() {
    let registry = OperatorRegistry::with_builtins();
    let doc = json!({
        "nodes": [
            {"id": "node_0", "name": "Input", "category": "Source",
             "node_type": "input", "position": [50.0, 100.0], "color": [50, 180, 100]},
            {"id": "node_1", "name": "Output", "category": "Destination",
             "node_type": "output", "position": [500.0, 100.0], "color": [180, 50, 50]},
            {"id": "node_2", "name": "Quantum Sharpen", "category": "Filter",
             "node_type": "process", "position": [250.0, 100.0], "color": [0, 0, 0]}
        ],
        "connections": [
            {"from_node": "node_0", "to_node": "node_2"},
            {"from_node": "node_2", "to_node": "node_1"}
        ]
    });
    let arena = codec::from_json_str(&doc.to_string(), &registry).unwrap();
    let frame = Frame::from_pixel(2, 2, Rgb([11, 22, 33]));
    let out = Executor::new(&registry).execute(&arena, &frame).unwrap();
    assert_eq!(out.image.unwrap(), frame);
}

#[test]
fn nested_algorithm_matches_flat_pipeline() {
    let registry = OperatorRegistry::with_builtins();

    let build_chain = |pipeline: &mut Pipeline| {
        let input = pipeline.input_node().map(|n| n.id).unwrap();
        let output = pipeline.output_node().map(|n| n.id).unwrap();
        let gray = pipeline
            .add_node(Node::process("Grayscale", "Filter", registry.param_defs("Grayscale")))
            .unwrap();
        let binary = pipeline
            .add_node(Node::process("Binary", "Threshold", registry.param_defs("Binary")))
            .unwrap();
        pipeline.connect(&registry, Connection::image(input, gray)).unwrap();
        pipeline.connect(&registry, Connection::image(gray, binary)).unwrap();
        pipeline.connect(&registry, Connection::image(binary, output)).unwrap();
    };

    let mut flat = Pipeline::new();
    build_chain(&mut flat);
    let flat_arena = PipelineArena::new(flat);

    let mut nested = Pipeline::new();
    build_chain(&mut nested);
    let mut nested_arena = PipelineArena::new(Pipeline::new());
    let idx = nested_arena.push(nested);
    let root = nested_arena.root_mut();
    let input = root.input_node().map(|n| n.id).unwrap();
    let output = root.output_node().map(|n| n.id).unwrap();
    let algo = root
        .add_node(Node::algorithm("Chain", idx, Vec::new(), Vec::new()))
        .unwrap();
    root.connect(&registry, Connection::image(input, algo)).unwrap();
    root.connect(&registry, Connection::image(algo, output)).unwrap();

    let mut frame = Frame::from_pixel(4, 4, Rgb([30, 90, 210]));
    frame.put_pixel(0, 0, Rgb([250, 250, 250]));
    let executor = Executor::new(&registry);
    let a = executor.execute(&flat_arena, &frame).unwrap().image.unwrap();
    let b = executor.execute(&nested_arena, &frame).unwrap().image.unwrap();
    assert_eq!(a, b);
}

#[test]
fn batch_runner_writes_every_outcome() {
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let mut pipeline = Pipeline::new();
    let input = pipeline.input_node().map(|n| n.id).unwrap();
    let output = pipeline.output_node().map(|n| n.id).unwrap();
    pipeline.connect(&registry, Connection::image(input, output)).unwrap();
    let arena = PipelineArena::new(pipeline);

    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    Frame::from_pixel(2, 2, Rgb([10, 20, 30])).save(&good).unwrap();
    let bad = dir.path().join("missing.png");

    let mut handle = spawn_batch(arena, registry, vec![good, bad]);
    assert!(handle.join_timeout(Duration::from_secs(10)));

    let messages = handle.drain();
    let complete = messages
        .iter()
        .find_map(|m| match m {
            BatchMessage::Complete { outputs, .. } => Some(outputs),
            _ => None,
        })
        .expect("batch never completed");
    assert_eq!(complete.len(), 2);
    assert!(complete[0].is_some());
    assert!(complete[1].is_none());
    assert!(messages
        .iter()
        .any(|m| matches!(m, BatchMessage::ImageError { .. })));
}

proptest! {
    // Random DAGs (edges only ever point from earlier to later nodes)
    // always schedule, and the schedule respects every edge.
    #[test]
    fn random_dags_schedule_consistently(
        node_count in 2usize..8,
        raw_edges in proptest::collection::vec((0usize..8, 0usize..8), 0..24),
    ) {
        let registry = OperatorRegistry::with_builtins();
        let mut pipeline = Pipeline::new();
        let mut ids = Vec::new();
        for _ in 0..node_count {
            let id = pipeline
                .add_node(Node::process("Grayscale", "Filter", registry.param_defs("Grayscale")))
                .unwrap();
            ids.push(id);
        }
        for (a, b) in raw_edges {
            let (a, b) = (a % node_count, b % node_count);
            if a == b {
                continue;
            }
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            // Duplicate edges are rejected by the graph, which is fine here.
            let _ = pipeline.connect(&registry, Connection::image(ids[lo], ids[hi]));
        }

        let order = scheduler::schedule(&pipeline).unwrap();
        prop_assert_eq!(order.len(), pipeline.nodes.len());
        for conn in &pipeline.connections {
            let from = order.iter().position(|n| *n == conn.from_node).unwrap();
            let to = order.iter().position(|n| *n == conn.to_node).unwrap();
            prop_assert!(from < to);
        }
    }
}
