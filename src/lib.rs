//! Frame-based autoregressive declicking core
//!
//! This library removes impulsive noise (clicks and crackle, e.g. from
//! vinyl transfers) from a digitized audio channel. Each overlapping frame
//! is modeled as a linear predictive process; samples whose prediction
//! residual exceeds a noise-adaptive threshold are flagged, the flagged
//! runs are replaced by the constrained least-squares interpolation under
//! the frame's AR model, and the repaired frames are windowed and
//! overlap-added back into a continuous channel.
//!
//! The core consumes a per-channel `f64` sample buffer and produces a
//! repaired buffer of the same length. Container decoding, persistence and
//! any driver/CLI live with the caller; sample-format metadata (rate, bit
//! depth) is never interpreted here.

use log::debug;
use rayon::prelude::*;

use crate::reconstruct::RepairOutcome;

/// AR model estimation (Levinson-Durbin recursion)
pub mod ar;
/// Click detection from prediction residuals
pub mod detect;
/// Framing, windowing and overlap-add resynthesis
pub mod frame;
/// Constrained least-squares reconstruction of flagged samples
pub mod reconstruct;
/// Shared numeric helpers
pub mod utils;

pub use detect::ClickInterval;
pub use reconstruct::SingularMatrix;

/// Default values for the declicking parameters
pub mod defaults {
    /// Residual threshold multiplier `K`
    pub const THRESHOLD: f64 = 1.8;
    /// Minimum run length `b` (a run is reported when strictly longer)
    pub const MIN_RUN: usize = 20;
    /// AR model order `p`
    pub const ORDER: usize = 300;
    /// Frame length `Nw` in samples
    pub const FRAME_LEN: usize = 2400;
    /// Number of full passes over the channel
    pub const ITERATIONS: usize = 1;
    /// Frame overlap fraction (hop = `Nw·(1 − overlap)`)
    pub const OVERLAP: f64 = 0.75;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the declicking pipeline
#[derive(Debug, Clone)]
pub struct DeclickConfig {
    /// Residual threshold multiplier `K` (must be > 0)
    pub threshold: f64,

    /// Minimum click run length `b`; runs of exactly this length are ignored
    pub min_run: usize,

    /// AR model order `p` (must satisfy `0 < p < frame_len`)
    pub order: usize,

    /// Analysis frame length `Nw` in samples
    pub frame_len: usize,

    /// Number of passes; each pass consumes the previous pass's output
    pub iterations: usize,

    /// Overlap fraction in `[0, 1)`
    pub overlap: f64,
}

impl Default for DeclickConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::THRESHOLD,
            min_run: defaults::MIN_RUN,
            order: defaults::ORDER,
            frame_len: defaults::FRAME_LEN,
            iterations: defaults::ITERATIONS,
            overlap: defaults::OVERLAP,
        }
    }
}

impl DeclickConfig {
    /// Hop size `Nh = Nw − Nw·overlap`, truncated to an integer.
    #[inline]
    pub fn hop(&self) -> usize {
        (self.frame_len as f64 - self.frame_len as f64 * self.overlap) as usize
    }

    /// Validate the configuration before any frame is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_len == 0 {
            return Err(ConfigError::InvalidFrameLen { frame_len: self.frame_len });
        }
        if self.order == 0 || self.order >= self.frame_len {
            return Err(ConfigError::InvalidOrder {
                order: self.order,
                frame_len: self.frame_len,
            });
        }
        if !self.overlap.is_finite() || !(0.0..1.0).contains(&self.overlap) || self.hop() == 0 {
            return Err(ConfigError::InvalidOverlap { overlap: self.overlap });
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold { threshold: self.threshold });
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations);
        }
        Ok(())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Fatal configuration errors, rejected at pipeline construction
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidFrameLen { frame_len: usize },
    InvalidOrder { order: usize, frame_len: usize },
    InvalidOverlap { overlap: f64 },
    InvalidThreshold { threshold: f64 },
    InvalidIterations,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidFrameLen { frame_len } => {
                write!(f, "Invalid frame length: {}. Must be positive", frame_len)
            }
            ConfigError::InvalidOrder { order, frame_len } => write!(
                f,
                "Invalid AR order: {}. Must satisfy 0 < order < frame length ({})",
                order, frame_len
            ),
            ConfigError::InvalidOverlap { overlap } => write!(
                f,
                "Invalid overlap: {}. Must be in [0, 1) and leave a nonzero hop",
                overlap
            ),
            ConfigError::InvalidThreshold { threshold } => {
                write!(f, "Invalid threshold multiplier: {}. Must be > 0", threshold)
            }
            ConfigError::InvalidIterations => {
                write!(f, "Iteration count must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Pass Statistics
// ============================================================================

/// Counters for one full pass over one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Frames processed
    pub frames: usize,
    /// Frames whose AR model was undefined (passed through unmodified)
    pub degenerate_frames: usize,
    /// Click intervals flagged across all frames
    pub flagged_intervals: usize,
    /// Frames that had samples replaced
    pub repaired_frames: usize,
    /// Total samples replaced
    pub repaired_samples: usize,
    /// Frames abandoned because the reconstruction system was singular
    pub singular_systems: usize,
}

impl PassStats {
    fn merge(self, other: Self) -> Self {
        Self {
            frames: self.frames + other.frames,
            degenerate_frames: self.degenerate_frames + other.degenerate_frames,
            flagged_intervals: self.flagged_intervals + other.flagged_intervals,
            repaired_frames: self.repaired_frames + other.repaired_frames,
            repaired_samples: self.repaired_samples + other.repaired_samples,
            singular_systems: self.singular_systems + other.singular_systems,
        }
    }
}

// ============================================================================
// Declicker
// ============================================================================

/// Frame-based AR declicker
///
/// Combines the framer, AR estimator, click detector, constrained
/// reconstructor and overlap-add synthesizer into a per-channel pipeline.
pub struct Declicker {
    config: DeclickConfig,
    hop: usize,
    window: Vec<f64>,
}

impl Declicker {
    /// Create a declicker, validating the configuration up front.
    pub fn new(config: DeclickConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let hop = config.hop();
        let window = frame::analysis_window(config.frame_len);
        Ok(Self { config, hop, window })
    }

    /// The validated configuration.
    #[inline]
    pub fn config(&self) -> &DeclickConfig {
        &self.config
    }

    /// Hop size in samples.
    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Run the configured number of passes over one channel and return the
    /// reconstructed samples (same length as the input).
    pub fn process_channel(&self, channel: &[f64]) -> Vec<f64> {
        self.process_channel_with_stats(channel).0
    }

    /// Like [`process_channel`](Self::process_channel), also returning the
    /// per-pass statistics.
    pub fn process_channel_with_stats(&self, channel: &[f64]) -> (Vec<f64>, Vec<PassStats>) {
        debug!(
            "declick: {} samples, rms {:.6}",
            channel.len(),
            utils::calculate_rms(channel)
        );

        let mut current = channel.to_vec();
        let mut stats = Vec::with_capacity(self.config.iterations);

        for pass_index in 0..self.config.iterations {
            let (next, pass_stats) = self.pass(&current);
            debug!(
                "pass {}: {} frames, {} degenerate, {} intervals, {} repaired ({} samples), {} singular",
                pass_index,
                pass_stats.frames,
                pass_stats.degenerate_frames,
                pass_stats.flagged_intervals,
                pass_stats.repaired_frames,
                pass_stats.repaired_samples,
                pass_stats.singular_systems,
            );
            stats.push(pass_stats);
            current = next;
        }

        (current, stats)
    }

    /// Process several channels independently, in parallel. No state is
    /// shared across channels.
    pub fn process_channels(&self, channels: &[Vec<f64>]) -> Vec<Vec<f64>> {
        channels
            .par_iter()
            .map(|channel| self.process_channel(channel))
            .collect()
    }

    /// One full pass: pad, frame, estimate/detect/repair each frame in
    /// parallel, then window, overlap-add and trim back to the input length.
    fn pass(&self, channel: &[f64]) -> (Vec<f64>, PassStats) {
        let order = self.config.order;
        let threshold = self.config.threshold;
        let min_run = self.config.min_run;

        let padded = frame::pad_channel(channel, self.config.frame_len, self.hop);
        let mut frames = frame::split_frames(&padded.samples, self.config.frame_len, self.hop);

        let stats = frames
            .par_iter_mut()
            .map(|samples| {
                let model = ar::estimate(samples, order);
                let intervals = detect::detect_clicks(samples, &model, threshold, min_run);
                let outcome = reconstruct::repair_frame(samples, &model, &intervals);

                let mut stats = PassStats {
                    frames: 1,
                    flagged_intervals: intervals.len(),
                    ..PassStats::default()
                };
                if !model.is_defined() {
                    stats.degenerate_frames = 1;
                }
                match outcome {
                    RepairOutcome::Untouched => {}
                    RepairOutcome::Repaired { samples: count } => {
                        stats.repaired_frames = 1;
                        stats.repaired_samples = count;
                    }
                    RepairOutcome::SingularSystem => stats.singular_systems = 1,
                }
                stats
            })
            .reduce(PassStats::default, PassStats::merge);

        let synthesized =
            frame::overlap_add(&frames, &self.window, self.hop, padded.samples.len());

        let start = padded.lead_pad;
        let end = (start + channel.len()).min(synthesized.len());
        (synthesized[start..end].to_vec(), stats)
    }
}
