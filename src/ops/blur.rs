//! Smoothing operators.

use super::{OpOutput, OperatorRegistry, OperatorSpec};
use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::{merge_channels, split_channels, Frame};
use imageproc::filter;

pub(super) fn register(registry: &mut OperatorRegistry) {
    registry.register(OperatorSpec {
        name: "Gaussian Blur",
        category: "Filter",
        emits_data: false,
        params: || {
            vec![
                ParamDef::int("Kernel Size", 3, 1, 31).connectable(),
                ParamDef::float("Sigma", 0.0, 0.0, 20.0),
            ]
        },
        apply: gaussian,
    });
    registry.register(OperatorSpec {
        name: "Box Filter",
        category: "Filter",
        emits_data: false,
        params: || vec![ParamDef::int("Kernel Size", 3, 1, 31)],
        apply: box_filter,
    });
    registry.register(OperatorSpec {
        name: "Median Blur",
        category: "Filter",
        emits_data: false,
        params: || vec![ParamDef::int("Kernel Size", 3, 1, 31)],
        apply: median,
    });
}

/// Kernel sizes must be odd; evens are bumped up rather than rejected.
fn odd_ksize(params: &OpParams) -> u32 {
    let k = params.get_i64("Kernel Size", 3).max(1) as u32;
    if k % 2 == 0 {
        k + 1
    } else {
        k
    }
}

fn gaussian(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let ksize = odd_ksize(params);
    let mut sigma = params.get_f64("Sigma", 0.0) as f32;
    if sigma <= 0.0 {
        // Derive sigma from the kernel size the way OpenCV does.
        sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    }
    if sigma <= 0.0 {
        return Ok(OpOutput::Image(frame.clone()));
    }
    let planes = split_channels(frame);
    let blurred = [
        filter::gaussian_blur_f32(&planes[0], sigma),
        filter::gaussian_blur_f32(&planes[1], sigma),
        filter::gaussian_blur_f32(&planes[2], sigma),
    ];
    Ok(OpOutput::Image(merge_channels(&blurred)))
}

fn box_filter(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let radius = odd_ksize(params) / 2;
    if radius == 0 {
        return Ok(OpOutput::Image(frame.clone()));
    }
    let planes = split_channels(frame);
    let filtered = [
        filter::box_filter(&planes[0], radius, radius),
        filter::box_filter(&planes[1], radius, radius),
        filter::box_filter(&planes[2], radius, radius),
    ];
    Ok(OpOutput::Image(merge_channels(&filtered)))
}

fn median(params: &OpParams, frame: &Frame) -> anyhow::Result<OpOutput> {
    let radius = odd_ksize(params) / 2;
    if radius == 0 {
        return Ok(OpOutput::Image(frame.clone()));
    }
    Ok(OpOutput::Image(filter::median_filter(
        frame, radius, radius,
    )))
}
