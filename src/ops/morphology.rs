//! Morphological operators.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::{merge_channels, split_channels, Frame};
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Erode",
        category: "Morphology",
        emits_data: false,
        params: morphology_params,
        apply: |params, frame| Ok(OpOutput::Image(run(params, frame, morphology::erode))),
    });
    registry.register(OperatorSpec {
        name: "Dilate",
        category: "Morphology",
        emits_data: false,
        params: morphology_params,
        apply: |params, frame| Ok(OpOutput::Image(run(params, frame, morphology::dilate))),
    });
}

fn morphology_params() -> Vec<ParamDef> {
    vec![
        ParamDef::int("Kernel Size", 3, 1, 31),
        ParamDef::int("Iterations", 1, 1, 10),
    ]
}

/// Square structuring element of side `Kernel Size`, applied per channel
/// and repeated `Iterations` times.
fn run(
    params: &OpParams,
    frame: &Frame,
    op: fn(&GrayImage, Norm, u8) -> GrayImage,
) -> Frame {
    let ksize = params.get_i64("Kernel Size", 3).max(1);
    let iterations = params.get_i64("Iterations", 1).max(1);
    let radius = (ksize / 2).min(255) as u8;
    if radius == 0 {
        return frame.clone();
    }
    let mut planes = split_channels(frame);
    for _ in 0..iterations {
        for plane in planes.iter_mut() {
            *plane = op(plane, Norm::LInf, radius);
        }
    }
    merge_channels(&planes)
}
