//! Inverse-CDF sampling from a piecewise-constant density.

use thiserror::Error;

use crate::example::PdfSegment;
use crate::rand_state::RandState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExploreError {
    #[error("pdf needs at least two segments, got {0}")]
    TooFewSegments(usize),
    #[error("segment {index} is not in ascending action order")]
    NonMonotonic { index: usize },
    #[error("segment {index} has a negative or non-finite density")]
    InvalidDensity { index: usize },
    #[error("pdf has no probability mass")]
    ZeroMass,
}

/// Draws one action from `pdf` using the uniform value at `state`.
///
/// Segment `i` covers `[pdf[i].action, pdf[i + 1].action)`; the density of the
/// terminal segment is ignored. Masses are normalized by their total, so the
/// pdf does not have to integrate to one.
pub fn sample_pdf(state: u64, pdf: &[PdfSegment]) -> Result<f32, ExploreError> {
    if pdf.len() < 2 {
        return Err(ExploreError::TooFewSegments(pdf.len()));
    }

    let mut total = 0.0f32;
    for (index, pair) in pdf.windows(2).enumerate() {
        let width = pair[1].action - pair[0].action;
        if !(width >= 0.0) || !width.is_finite() {
            return Err(ExploreError::NonMonotonic { index: index + 1 });
        }
        let density = pair[0].density;
        if !(density >= 0.0) || !density.is_finite() {
            return Err(ExploreError::InvalidDensity { index });
        }
        total += density * width;
    }
    if !(total > 0.0) || !total.is_finite() {
        return Err(ExploreError::ZeroMass);
    }

    let target = RandState::uniform_at(state) * total;
    let mut cumulative = 0.0f32;
    let mut last_with_mass = None;
    for pair in pdf.windows(2) {
        let (left, right) = (pair[0].action, pair[1].action);
        let mass = pair[0].density * (right - left);
        if mass <= 0.0 {
            continue;
        }
        if target < cumulative + mass {
            return Ok(interpolate(left, right, (target - cumulative) / mass));
        }
        cumulative += mass;
        last_with_mass = Some((left, right));
    }

    // Rounding left the draw just past the accumulated mass.
    match last_with_mass {
        Some((left, right)) => Ok(interpolate(left, right, 0.5)),
        None => Err(ExploreError::ZeroMass),
    }
}

/// Point at `fraction` of `[left, right)`, kept strictly below `right` so the
/// action stays inside the segment it was drawn from.
fn interpolate(left: f32, right: f32, fraction: f32) -> f32 {
    let action = left + fraction * (right - left);
    action.clamp(left, next_below(right).max(left))
}

/// Largest `f32` smaller than the finite value `x`.
fn next_below(x: f32) -> f32 {
    if x == 0.0 {
        -f32::from_bits(1)
    } else if x > 0.0 {
        f32::from_bits(x.to_bits() - 1)
    } else {
        f32::from_bits(x.to_bits() + 1)
    }
}

/// Density at `action`: the value of the last segment starting at or before it.
pub fn pdf_value(pdf: &[PdfSegment], action: f32) -> f32 {
    match pdf.partition_point(|segment| segment.action <= action) {
        0 => 0.0,
        idx => pdf[idx - 1].density,
    }
}
