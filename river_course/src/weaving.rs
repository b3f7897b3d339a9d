//! Suggested travel line that weaves from bank to bank.

use std::f32::consts::PI;

use crate::{course_config::WeavingConfig, geometry::PathPoint};

/// Lateral offset of the travel line for every point.
///
/// Segments alternate sides; their length ramps linearly from
/// `start_segment_length` to `end_segment_length` over the course. Inside a
/// segment the offset follows a half sine, so it is zero at both segment ends
/// and never comes closer than `margin` to either bank.
pub fn weaving_offsets(points: &[PathPoint], config: &WeavingConfig) -> Vec<f32> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let origin = first.arc_length;
    let total = points
        .last()
        .map(|last| (last.arc_length - origin).abs())
        .unwrap_or(0.0);

    let segment_length_at = |start: f32| {
        let progress = if total > 0.0 {
            (start / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let length = config.start_segment_length
            + (config.end_segment_length - config.start_segment_length) * progress;
        length.max(1.0)
    };

    let mut segment_start = 0.0f32;
    let mut segment_length = segment_length_at(0.0);
    let mut sign = 1.0f32;
    let mut offsets = Vec::with_capacity(points.len());

    for point in points {
        let s = (point.arc_length - origin).abs();
        while s > segment_start + segment_length {
            segment_start += segment_length;
            segment_length = segment_length_at(segment_start);
            sign = -sign;
        }
        let u = ((s - segment_start) / segment_length).clamp(0.0, 1.0);
        let reach = (point.bank_dist - config.margin).max(0.0);
        offsets.push(sign * (PI * u).sin() * config.amplitude * reach);
    }
    offsets
}

/// Write [`weaving_offsets`] into each point's `boat_x_offset`.
pub fn apply_weaving_path(points: &mut [PathPoint], config: &WeavingConfig) {
    let offsets = weaving_offsets(points, config);
    for (point, offset) in points.iter_mut().zip(offsets) {
        point.boat_x_offset = offset;
    }
}
