//! Click detection from AR prediction residuals
//!
//! A sample is suspect when the magnitude of its prediction residual under
//! the frame's AR model exceeds `K·scale`, where `scale` is the model's
//! residual scale. Contiguous suspect runs longer than the configured
//! minimum are reported as half-open click intervals. The first and last
//! `p` samples of a frame have no full prediction context and are never
//! inspected.

use crate::ar::ArModel;

/// A half-open run `[start, end)` of suspect samples within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickInterval {
    pub start: usize,
    pub end: usize,
}

impl ClickInterval {
    /// Run length in samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Compute the absolute prediction residual at every frame index.
///
/// `d[t] = |x[t] + Σ_{k=1}^{p} a[k]·x[t−k]|` for `t ∈ [p, len−p)`; indices
/// without full context, and every index of a frame with an undefined
/// model, stay zero.
pub fn prediction_residual(frame: &[f64], model: &ArModel) -> Vec<f64> {
    let mut residual = vec![0.0; frame.len()];

    let coeffs = match model {
        ArModel::Defined { coeffs, .. } => coeffs,
        ArModel::Undefined => return residual,
    };
    let order = coeffs.len() - 1;

    for t in order..frame.len().saturating_sub(order) {
        let mut acc = frame[t];
        for k in 1..=order {
            acc += coeffs[k] * frame[t - k];
        }
        residual[t] = acc.abs();
    }

    residual
}

/// Scan a residual sequence left to right and collect threshold runs.
///
/// A run opens at the first index with `residual > threshold` and extends
/// while the condition holds; it is recorded only when its length is
/// strictly greater than `min_run`. Scanning resumes at the run's end, so
/// reported intervals are ordered and non-overlapping.
pub fn detect_runs(residual: &[f64], threshold: f64, min_run: usize) -> Vec<ClickInterval> {
    let mut intervals = Vec::new();
    let mut x = 0;

    while x < residual.len() {
        if residual[x] > threshold {
            let mut y = x + 1;
            while y < residual.len() && residual[y] > threshold {
                y += 1;
            }
            if y - x > min_run {
                intervals.push(ClickInterval { start: x, end: y });
            }
            x = y;
        } else {
            x += 1;
        }
    }

    intervals
}

/// Detect click intervals in one frame under its AR model.
///
/// Returns an empty list for frames with an undefined model.
pub fn detect_clicks(
    frame: &[f64],
    model: &ArModel,
    threshold_mult: f64,
    min_run: usize,
) -> Vec<ClickInterval> {
    let scale = match model {
        ArModel::Defined { scale, .. } => *scale,
        ArModel::Undefined => return Vec::new(),
    };

    let residual = prediction_residual(frame, model);
    detect_runs(&residual, threshold_mult * scale, min_run)
}
