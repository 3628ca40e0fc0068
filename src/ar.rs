//! Autoregressive model estimation via the Levinson-Durbin recursion
//!
//! Each frame is modeled as a short-memory linear predictor:
//! `x[t] ≈ −Σ_{k=1}^{p} a[k]·x[t−k]`. The coefficient vector returned here
//! carries a fixed leading 1.0, so it is directly the prediction-error
//! filter used by the detector and the reconstructor. Frames with no
//! usable signal energy, or whose running prediction-error variance
//! collapses mid-recursion, yield an explicitly tagged `Undefined` model
//! instead of a NaN sentinel.

use crate::utils::near_zero;

/// Per-frame AR model state.
#[derive(Debug, Clone, PartialEq)]
pub enum ArModel {
    /// Usable model: `coeffs` has length `p + 1` with `coeffs[0] == 1.0`,
    /// `scale` is the square root of the final prediction-error variance.
    Defined { coeffs: Vec<f64>, scale: f64 },
    /// The frame cannot be modeled; detection and reconstruction skip it.
    Undefined,
}

impl ArModel {
    /// Whether the frame produced a usable model.
    #[inline]
    pub fn is_defined(&self) -> bool {
        matches!(self, ArModel::Defined { .. })
    }
}

/// Biased short-time autocorrelation:
/// `R[i] = (1/N)·Σ_{j=0}^{N−i−1} x[j]·x[j+i]` for `i = 0..=max_lag`.
pub fn autocorrelation(frame: &[f64], max_lag: usize) -> Vec<f64> {
    debug_assert!(max_lag < frame.len());

    let n = frame.len();
    let mut r = vec![0.0; max_lag + 1];
    for (lag, value) in r.iter_mut().enumerate() {
        let mut acc = 0.0;
        for j in 0..n - lag {
            acc += frame[j] * frame[j + lag];
        }
        *value = acc / n as f64;
    }
    r
}

/// Estimate an order-`order` AR model for one frame.
///
/// Runs the Levinson-Durbin recursion on the biased autocorrelation.
/// Any near-zero zero-lag autocorrelation or running variance aborts to
/// `ArModel::Undefined` rather than dividing by a vanishing quantity.
pub fn estimate(frame: &[f64], order: usize) -> ArModel {
    debug_assert!(order >= 1 && order < frame.len());

    let r = autocorrelation(frame, order);
    if near_zero(r[0]) {
        return ArModel::Undefined;
    }

    // Order-1 initialization
    let mut a = vec![0.0; order];
    let mut a_old = vec![0.0; order];
    a_old[0] = -(r[1] / r[0]);
    let mut var = (1.0 - a_old[0] * a_old[0]) * r[0];

    // Order recursion
    for l in 1..order {
        let mut s = 0.0;
        for j in 0..l {
            s += a_old[j] * r[l - j];
        }

        if near_zero(var) {
            return ArModel::Undefined;
        }

        let k = (r[l + 1] + s) / var;
        a[l] = -k;
        var = (1.0 - k * k) * var;

        for j in (0..l).rev() {
            a[j] = a_old[j] + a[l] * a_old[l - 1 - j];
        }
        a_old[..=l].copy_from_slice(&a[..=l]);
    }

    let mut coeffs = vec![0.0; order + 1];
    coeffs[0] = 1.0;
    coeffs[1..].copy_from_slice(&a_old);

    ArModel::Defined {
        coeffs,
        scale: var.max(0.0).sqrt(),
    }
}
