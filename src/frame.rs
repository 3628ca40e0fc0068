//! Frame segmentation and overlap-add resynthesis
//!
//! A channel is zero-padded, sliced into overlapping fixed-length frames at
//! a fixed hop, and after repair every frame is multiplied by a raised-cosine
//! analysis window and summed back into a continuous buffer. The window is
//! scaled so that overlapping copies at the default 75% overlap sum to unity,
//! which makes resynthesis of an untouched frame transparent.

use std::f64::consts::TAU;

// ============================================================================
// Analysis Window
// ============================================================================

/// Generate the raised-cosine (Hamming-family) analysis window.
///
/// `w[x] = (1/(4·0.54))·(0.54 − 0.46·cos(2π·x/len))`
///
/// The window is periodic (denominator `len`, not `len − 1`) so that copies
/// spaced `len/4` apart sum to exactly 1.0 at every sample.
pub fn analysis_window(len: usize) -> Vec<f64> {
    let mut window = vec![0.0; len];
    if len == 0 {
        return window;
    }

    let norm = 1.0 / (4.0 * 0.54);
    for (x, w) in window.iter_mut().enumerate() {
        let t = TAU * x as f64 / len as f64;
        *w = norm * (0.54 - 0.46 * t.cos());
    }

    window
}

// ============================================================================
// Padding
// ============================================================================

/// A zero-padded channel, with the pad lengths needed to trim the
/// resynthesized output back to the caller's sample range.
pub struct PaddedChannel {
    /// Padded samples: `lead_pad` zeros, the channel, then trailing zeros.
    pub samples: Vec<f64>,
    /// Leading pad length (always the frame length).
    pub lead_pad: usize,
    /// Extra trailing zeros beyond the frame-length tail pad, added so the
    /// padded length lines up with the hop grid.
    pub tail_pad: usize,
}

/// Pad a channel for framing.
///
/// Prepends and appends `frame_len` zeros, then appends
/// `ceil((N + frame_len)/hop)·hop − frame_len − N` further zeros so every
/// channel sample ends up covered by a full complement of overlapping frames.
pub fn pad_channel(channel: &[f64], frame_len: usize, hop: usize) -> PaddedChannel {
    debug_assert!(frame_len > 0);
    debug_assert!(hop > 0);

    let n = channel.len();
    let grid = (n + frame_len).div_ceil(hop) * hop;
    let tail_pad = grid - frame_len - n;

    let mut samples = vec![0.0; frame_len + n + frame_len + tail_pad];
    samples[frame_len..frame_len + n].copy_from_slice(channel);

    PaddedChannel {
        samples,
        lead_pad: frame_len,
        tail_pad,
    }
}

// ============================================================================
// Segmentation
// ============================================================================

/// Slice a padded signal into overlapping frames of `frame_len` at `hop`.
///
/// Emission stops once fewer than `3·hop` samples remain past the next start
/// index, a safety margin against under-filled trailing frames.
pub fn split_frames(signal: &[f64], frame_len: usize, hop: usize) -> Vec<Vec<f64>> {
    debug_assert!(frame_len > 0);
    debug_assert!(hop > 0);

    let mut frames = Vec::new();
    let mut start = 0;

    while start + 3 * hop < signal.len() && start + frame_len <= signal.len() {
        frames.push(signal[start..start + frame_len].to_vec());
        start += hop;
    }

    frames
}

// ============================================================================
// Overlap-Add Resynthesis
// ============================================================================

/// Window every frame and overlap-add into a fresh output buffer.
///
/// Frame `i` lands at offset `i·hop`; `out_len` is normally the padded
/// signal length that the frames were cut from.
pub fn overlap_add(frames: &[Vec<f64>], window: &[f64], hop: usize, out_len: usize) -> Vec<f64> {
    let mut out = vec![0.0; out_len];

    for (index, frame) in frames.iter().enumerate() {
        let offset = index * hop;
        for (i, (&sample, &w)) in frame.iter().zip(window.iter()).enumerate() {
            if offset + i >= out_len {
                break;
            }
            out[offset + i] += sample * w;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_window_peak_normalization() {
        let window = analysis_window(256);
        assert_eq!(window.len(), 256);

        // Peak is at the center: (0.54 + 0.46) / (4 * 0.54)
        let peak = window.iter().cloned().fold(0.0_f64, f64::max);
        assert!((peak - 1.0 / 2.16).abs() < EPSILON);

        // Periodic window: endpoints are equal and nonzero
        assert!((window[0] - 0.08 / 2.16).abs() < EPSILON);
        assert!(window[0] > 0.0);
    }

    #[test]
    fn test_window_overlap_sums_to_unity() {
        // At 75% overlap (hop = len/4) the scaled window is exactly COLA.
        let len = 256;
        let hop = len / 4;
        let window = analysis_window(len);

        for x in 0..hop {
            let sum: f64 = (0..4).map(|k| window[x + k * hop]).sum();
            assert!((sum - 1.0).abs() < EPSILON, "COLA sum {} at offset {}", sum, x);
        }
    }

    #[test]
    fn test_pad_channel_lengths() {
        let channel = vec![1.0; 10_000];
        let padded = pad_channel(&channel, 2400, 600);

        // ceil((10000 + 2400)/600)·600 − 2400 − 10000 = 200
        assert_eq!(padded.tail_pad, 200);
        assert_eq!(padded.lead_pad, 2400);
        assert_eq!(padded.samples.len(), 2400 + 10_000 + 2400 + 200);

        assert!(padded.samples[..2400].iter().all(|&s| s == 0.0));
        assert!(padded.samples[2400..12_400].iter().all(|&s| s == 1.0));
        assert!(padded.samples[12_400..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_pad_channel_empty() {
        let padded = pad_channel(&[], 64, 16);
        assert_eq!(padded.lead_pad, 64);
        assert!(padded.samples.iter().all(|&s| s == 0.0));
        // Padded length stays hop-aligned relative to the frame length
        assert_eq!((padded.samples.len() - 64) % 16, 0);
    }

    #[test]
    fn test_split_frames_stride() {
        let channel = vec![0.5; 10_000];
        let padded = pad_channel(&channel, 2400, 600);
        let frames = split_frames(&padded.samples, 2400, 600);

        // len 15000: starts 0, 600, ..., 12600 (start + 1800 < 15000)
        assert_eq!(frames.len(), 22);
        assert!(frames.iter().all(|f| f.len() == 2400));
        assert_eq!(frames[1][0], padded.samples[600]);
        assert_eq!(frames[4][0], padded.samples[2400]);
    }

    #[test]
    fn test_overlap_add_reconstructs_constant() {
        let frame_len = 64;
        let hop = 16;
        let signal = vec![1.0; 160];

        let frames = split_frames(&signal, frame_len, hop);
        let window = analysis_window(frame_len);
        let out = overlap_add(&frames, &window, hop, signal.len());

        // Positions covered by all four overlapping frames reconstruct to 1.0
        for (i, &s) in out.iter().enumerate().take(112).skip(48) {
            assert!((s - 1.0).abs() < 1e-9, "sample {} = {}", i, s);
        }
    }
}
