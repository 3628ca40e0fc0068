//! Shared numeric helpers for the declicking pipeline

// Configuration constants
/// Magnitude below which a quantity (zero-lag autocorrelation, Levinson
/// running variance, Cholesky pivot) is treated as singular.
pub const SINGULARITY_EPS: f64 = 1e-9;

/// Test whether a value is too close to zero to divide by.
#[inline]
pub fn near_zero(value: f64) -> bool {
    value.abs() <= SINGULARITY_EPS
}

// ============================================================================
// Level Detection
// ============================================================================

/// Calculate RMS (Root Mean Square) of a buffer
#[inline]
pub fn calculate_rms(buffer: &[f64]) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = buffer.iter().map(|&x| x * x).sum();
    (sum_squares / buffer.len() as f64).sqrt()
}

/// Calculate peak amplitude of a buffer
#[inline]
pub fn calculate_peak(buffer: &[f64]) -> f64 {
    buffer.iter().map(|&x| x.abs()).fold(0.0_f64, f64::max)
}
