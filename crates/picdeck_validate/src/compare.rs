use ndarray::{ArrayD, Dimension};
use picdeck_core::{Tolerance, ToleranceKind};
use serde::Serialize;
use std::fmt;

use crate::error::{Result, ValidationError};

/// Worst element of a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deviation {
    /// Multi-index of the element, empty for 0-d values
    pub index: Vec<usize>,
    pub deviation: f64,
    pub actual: f64,
    pub reference: f64,
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deviation {:e} at {:?} (actual {}, reference {})",
            self.deviation, self.index, self.actual, self.reference
        )
    }
}

pub fn check_tolerance(tolerance: &Tolerance) -> Result<()> {
    if tolerance.value.is_finite() && tolerance.value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidTolerance(tolerance.value))
    }
}

/// Deviation of one element. NaN only matches NaN and an infinity only
/// matches the same infinity; any other pairing is an infinite deviation.
fn element_deviation(actual: f64, reference: f64, kind: ToleranceKind, epsilon: f64) -> f64 {
    if actual.is_nan() || reference.is_nan() {
        return if actual.is_nan() && reference.is_nan() {
            0.0
        } else {
            f64::INFINITY
        };
    }
    if actual == reference {
        return 0.0;
    }
    if actual.is_infinite() || reference.is_infinite() {
        return f64::INFINITY;
    }
    let diff = (actual - reference).abs();
    match kind {
        ToleranceKind::Absolute => diff,
        ToleranceKind::Relative => diff / reference.abs().max(epsilon),
    }
}

/// Largest element deviation between `actual` and `reference`.
/// `None` for empty arrays. Shapes must agree exactly.
pub fn max_deviation(
    actual: &ArrayD<f64>,
    reference: &ArrayD<f64>,
    kind: ToleranceKind,
    epsilon: f64,
) -> Result<Option<Deviation>> {
    if actual.shape() != reference.shape() {
        return Err(ValidationError::ShapeMismatch {
            expected: reference.shape().to_vec(),
            actual: actual.shape().to_vec(),
        });
    }

    let mut worst: Option<Deviation> = None;
    for ((index, &r), &a) in reference.indexed_iter().zip(actual.iter()) {
        let deviation = element_deviation(a, r, kind, epsilon);
        if worst.as_ref().is_none_or(|w| deviation > w.deviation) {
            worst = Some(Deviation {
                index: index.as_array_view().to_vec(),
                deviation,
                actual: a,
                reference: r,
            });
        }
    }
    Ok(worst)
}
