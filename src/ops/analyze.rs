//! Measurement operators producing structured data alongside the image.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::{to_gray, Frame};
use image::{Luma, Rgb};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde_json::{json, Value};
use std::collections::HashMap;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Object Characteristics",
        category: "Analysis",
        emits_data: true,
        params: || {
            vec![
                ParamDef::int("Threshold", 127, 0, 255),
                ParamDef::int("Min Area", 0, 0, 1_000_000),
                ParamDef::bool("Draw Centroids", true),
            ]
        },
        apply: object_characteristics,
    });
}

struct Blob {
    area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

/// Label connected foreground regions and measure each one. The returned
/// image is the input annotated with bounding boxes and centroids; the
/// data output is one record per surviving region.
fn object_characteristics(
    params: &OpParams,
    frame: &Frame,
) -> anyhow::Result<OpOutput> {
    let thresh = params.get_i64("Threshold", 127).clamp(0, 255);
    let min_area = params.get_i64("Min Area", 0).max(0) as u64;
    let draw_centroids = params.get_bool("Draw Centroids", true);

    let mut binary = to_gray(frame);
    for px in binary.pixels_mut() {
        *px = Luma([if i64::from(px.0[0]) > thresh { 255 } else { 0 }]);
    }
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut blobs: HashMap<u32, Blob> = HashMap::new();
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px.0[0];
        if label == 0 {
            continue;
        }
        let blob = blobs.entry(label).or_insert(Blob {
            area: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: 0,
            sum_y: 0,
        });
        blob.area += 1;
        blob.min_x = blob.min_x.min(x);
        blob.min_y = blob.min_y.min(y);
        blob.max_x = blob.max_x.max(x);
        blob.max_y = blob.max_y.max(y);
        blob.sum_x += u64::from(x);
        blob.sum_y += u64::from(y);
    }

    let mut annotated = frame.clone();
    let mut records = Vec::new();
    let mut labels: Vec<_> = blobs.into_iter().collect();
    labels.sort_unstable_by_key(|(label, _)| *label);

    for (label, blob) in labels {
        if blob.area < min_area {
            continue;
        }
        let width = blob.max_x - blob.min_x + 1;
        let height = blob.max_y - blob.min_y + 1;
        let cx = blob.sum_x as f64 / blob.area as f64;
        let cy = blob.sum_y as f64 / blob.area as f64;

        draw_hollow_rect_mut(
            &mut annotated,
            Rect::at(blob.min_x as i32, blob.min_y as i32).of_size(width, height),
            Rgb([0, 255, 0]),
        );
        if draw_centroids {
            draw_filled_circle_mut(
                &mut annotated,
                (cx.round() as i32, cy.round() as i32),
                2,
                Rgb([255, 0, 0]),
            );
        }

        records.push(json!({
            "label": label,
            "area": blob.area,
            "bbox": {
                "x": blob.min_x,
                "y": blob.min_y,
                "width": width,
                "height": height,
            },
            "centroid": { "x": cx, "y": cy },
            "aspect_ratio": f64::from(width) / f64::from(height),
            "extent": blob.area as f64 / (f64::from(width) * f64::from(height)),
        }));
    }

    Ok(OpOutput::WithData {
        image: annotated,
        data: Value::Array(records),
    })
}
