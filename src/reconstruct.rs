//! Constrained least-squares interpolation of flagged samples
//!
//! Replacement values for flagged samples are the minimizers of the AR
//! prediction-residual energy given the surrounding trusted samples. Under
//! an order-`p` model only samples within `p` lags interact, so the normal
//! equations form a banded symmetric positive-definite system. The system
//! is assembled from the autocorrelation of the prediction-error filter and
//! solved with an LDLᵗ factorization without pivoting; a vanishing pivot is
//! reported as a recoverable `SingularMatrix` and the frame is left as-is.

use crate::ar::ArModel;
use crate::detect::ClickInterval;
use crate::utils::near_zero;

// ============================================================================
// Error Types
// ============================================================================

/// The reconstruction system could not be factorized (near-zero pivot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularMatrix;

impl std::fmt::Display for SingularMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "singular reconstruction system (near-zero pivot)")
    }
}

impl std::error::Error for SingularMatrix {}

/// What happened to one frame during the repair step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Nothing to repair: no intervals, undefined model, or no flagged
    /// sample survived the boundary exclusion.
    Untouched,
    /// Replacement values were solved and written back.
    Repaired { samples: usize },
    /// The linear system was singular; the frame keeps its original
    /// (corrupted) samples.
    SingularSystem,
}

// ============================================================================
// Linear Algebra
// ============================================================================

/// Autocorrelation of the prediction-error filter:
/// `b[i] = Σ_{j=i}^{p} a[j]·a[j−i]` for `i = 0..=p`.
///
/// This is the banded covariance kernel of the constrained system.
pub fn error_filter_autocorrelation(coeffs: &[f64]) -> Vec<f64> {
    let p = coeffs.len() - 1;
    let mut b = vec![0.0; p + 1];
    for (i, value) in b.iter_mut().enumerate() {
        for j in i..=p {
            *value += coeffs[j] * coeffs[j - i];
        }
    }
    b
}

/// Solve `A·x = rhs` for a symmetric positive-definite `A` (row-major,
/// `n × n`) via LDLᵗ factorization without pivoting.
///
/// Returns `Err(SingularMatrix)` on a near-zero pivot instead of dividing
/// through it.
pub fn solve_spd(matrix: &[f64], rhs: &[f64], n: usize) -> Result<Vec<f64>, SingularMatrix> {
    debug_assert_eq!(matrix.len(), n * n);
    debug_assert_eq!(rhs.len(), n);

    let mut lower = vec![0.0; n * n];
    let mut diag = vec![0.0; n];

    // Factorize A = L·D·Lᵗ with unit-diagonal L
    for j in 0..n {
        let mut pivot = matrix[j * n + j];
        for k in 0..j {
            pivot -= lower[j * n + k] * lower[j * n + k] * diag[k];
        }
        if near_zero(pivot) {
            return Err(SingularMatrix);
        }
        diag[j] = pivot;

        for i in j + 1..n {
            let mut v = matrix[i * n + j];
            for k in 0..j {
                v -= lower[i * n + k] * lower[j * n + k] * diag[k];
            }
            lower[i * n + j] = v / pivot;
        }
    }

    // Forward substitution: L·y = rhs
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut acc = rhs[i];
        for j in 0..i {
            acc -= lower[i * n + j] * y[j];
        }
        y[i] = acc;
    }

    // Diagonal scaling: D·z = y
    for i in 0..n {
        y[i] /= diag[i];
    }

    // Back substitution: Lᵗ·x = z
    let mut x = y;
    for i in (0..n).rev() {
        let mut acc = x[i];
        for j in i + 1..n {
            acc -= lower[j * n + i] * x[j];
        }
        x[i] = acc;
    }

    Ok(x)
}

// ============================================================================
// Frame Repair
// ============================================================================

/// Replace the flagged samples of one frame with the minimum-residual
/// interpolation under its AR model.
///
/// Samples within `p` of either frame boundary are excluded from repair
/// (no full prediction context). Frames with no reparable samples, or with
/// an undefined model, come back untouched.
pub fn repair_frame(
    frame: &mut [f64],
    model: &ArModel,
    intervals: &[ClickInterval],
) -> RepairOutcome {
    let coeffs = match model {
        ArModel::Defined { coeffs, .. } => coeffs,
        ArModel::Undefined => return RepairOutcome::Untouched,
    };
    if intervals.is_empty() {
        return RepairOutcome::Untouched;
    }

    let len = frame.len();
    let p = coeffs.len() - 1;

    // Flag the interval union, then strip the boundary margins
    let mut flagged = vec![false; len];
    for interval in intervals {
        for t in interval.start..interval.end.min(len) {
            flagged[t] = true;
        }
    }
    for t in 0..p.min(len) {
        flagged[t] = false;
    }
    for t in len.saturating_sub(p)..len {
        flagged[t] = false;
    }

    let positions: Vec<usize> = (0..len).filter(|&t| flagged[t]).collect();
    let l = positions.len();
    if l == 0 {
        return RepairOutcome::Untouched;
    }

    let kernel = error_filter_autocorrelation(coeffs);

    // B[i][j] = b[|pos_i − pos_j|] within the band, 0 outside
    let mut matrix = vec![0.0; l * l];
    for i in 0..l {
        for j in i..l {
            let lag = positions[j] - positions[i];
            if lag <= p {
                matrix[i * l + j] = kernel[lag];
                matrix[j * l + i] = kernel[lag];
            }
        }
    }

    // d[i] = −Σ_{j=−p..p, known} b[|j|]·x[pos_i − j]
    let mut rhs = vec![0.0; l];
    for (i, &pos) in positions.iter().enumerate() {
        let mut acc = 0.0;
        for j in -(p as isize)..=(p as isize) {
            let t = pos as isize - j;
            if t < 0 || t >= len as isize {
                continue;
            }
            let t = t as usize;
            if !flagged[t] {
                acc -= kernel[j.unsigned_abs()] * frame[t];
            }
        }
        rhs[i] = acc;
    }

    match solve_spd(&matrix, &rhs, l) {
        Ok(solution) => {
            for (&pos, &value) in positions.iter().zip(solution.iter()) {
                frame[pos] = value;
            }
            RepairOutcome::Repaired { samples: l }
        }
        Err(SingularMatrix) => RepairOutcome::SingularSystem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::TAU;

    #[test]
    fn test_solve_known_system() {
        // B = [[4,1],[1,3]], d = [1,2] → x = [1/11, 7/11]
        let matrix = vec![4.0, 1.0, 1.0, 3.0];
        let rhs = vec![1.0, 2.0];
        let x = solve_spd(&matrix, &rhs, 2).unwrap();

        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9, "x[0] = {}", x[0]);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9, "x[1] = {}", x[1]);
    }

    #[test]
    fn test_solve_singular_system() {
        let matrix = vec![0.0; 4];
        let rhs = vec![1.0, 1.0];
        assert_eq!(solve_spd(&matrix, &rhs, 2), Err(SingularMatrix));
    }

    #[test]
    fn test_error_filter_autocorrelation() {
        let coeffs = vec![1.0, -0.5];
        let b = error_filter_autocorrelation(&coeffs);
        assert!((b[0] - 1.25).abs() < 1e-12);
        assert!((b[1] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_clean_frame_untouched() {
        let mut frame: Vec<f64> = (0..64).map(|t| (t as f64 * 0.1).sin()).collect();
        let original = frame.clone();
        let model = ar::estimate(&frame, 4);

        let outcome = repair_frame(&mut frame, &model, &[]);
        assert_eq!(outcome, RepairOutcome::Untouched);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_boundary_only_interval_untouched() {
        let mut frame: Vec<f64> = (0..64).map(|t| (t as f64 * 0.3).sin()).collect();
        let original = frame.clone();
        let model = ar::estimate(&frame, 8);

        // Entirely inside the excluded leading margin
        let intervals = [ClickInterval { start: 2, end: 6 }];
        let outcome = repair_frame(&mut frame, &model, &intervals);
        assert_eq!(outcome, RepairOutcome::Untouched);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_spike_interpolation_accuracy() {
        // Sinusoid plus a little noise so the clean model stays defined
        let mut rng = SmallRng::seed_from_u64(7);
        let clean: Vec<f64> = (0..256)
            .map(|t| 0.5 * (TAU * t as f64 / 64.0).sin() + 0.01 * rng.gen_range(-1.0..1.0))
            .collect();
        let model = ar::estimate(&clean, 8);
        assert!(model.is_defined());

        let mut frame = clean.clone();
        frame[128] += 3.0;

        let intervals = [ClickInterval { start: 128, end: 129 }];
        let outcome = repair_frame(&mut frame, &model, &intervals);
        assert_eq!(outcome, RepairOutcome::Repaired { samples: 1 });

        let error = (frame[128] - clean[128]).abs();
        assert!(error < 0.1, "interpolation error {}", error);
        // Everything outside the flagged position is untouched
        assert_eq!(frame[127], clean[127]);
        assert_eq!(frame[129], clean[129]);
    }

    #[test]
    fn test_degenerate_coefficients_leave_frame_unmodified() {
        // All-zero coefficients make b[0] = 0 and the system singular
        let model = ArModel::Defined {
            coeffs: vec![0.0; 5],
            scale: 1.0,
        };
        let mut frame = vec![1.0; 64];
        let original = frame.clone();

        let intervals = [ClickInterval { start: 20, end: 24 }];
        let outcome = repair_frame(&mut frame, &model, &intervals);

        assert_eq!(outcome, RepairOutcome::SingularSystem);
        assert_eq!(frame, original);
        assert!(frame.iter().all(|s| s.is_finite()));
    }
}
