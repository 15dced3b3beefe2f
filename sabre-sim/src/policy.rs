//! Quality selection seam
//!
//! Real ABR algorithms live outside this crate. The session only needs a
//! quality per download, so policies here are deliberately simple.

use sabre_core::QualityLevel;

/// What a policy sees when choosing the quality of the next download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyContext {
    /// Segment about to be downloaded
    pub segment_index: u64,
    /// Contiguous buffer level at the cursor in milliseconds
    pub buffer_level: f64,
    /// Quality of the previous download, if any
    pub last_quality: Option<QualityLevel>,
}

/// Chooses the quality of each download.
pub trait QualityPolicy {
    /// Returns the quality to fetch for the segment described by `context`.
    fn select(&mut self, context: &PolicyContext) -> QualityLevel;

    /// Returns name of this policy.
    fn name(&self) -> &str;
}

/// Always downloads the same quality.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuality(pub QualityLevel);

impl QualityPolicy for FixedQuality {
    fn select(&mut self, _: &PolicyContext) -> QualityLevel {
        self.0
    }

    fn name(&self) -> &str {
        "FixedQuality"
    }
}

/// Picks the highest quality whose buffer threshold has been reached.
///
/// `thresholds_ms[q]` is the buffer level needed before quality `q` is
/// chosen. Quality 0 is always allowed.
#[derive(Debug, Clone)]
pub struct BufferThresholdPolicy {
    thresholds_ms: Vec<f64>,
}

impl BufferThresholdPolicy {
    /// Creates a policy from ascending per-quality thresholds.
    pub fn new(thresholds_ms: Vec<f64>) -> Self {
        Self { thresholds_ms }
    }

    /// Spreads `quality_count` thresholds evenly between zero and `max_buffer_ms`.
    pub fn evenly_spaced(quality_count: usize, max_buffer_ms: f64) -> Self {
        let step = max_buffer_ms / quality_count.max(1) as f64;
        Self::new((0..quality_count).map(|q| q as f64 * step).collect())
    }
}

impl QualityPolicy for BufferThresholdPolicy {
    fn select(&mut self, context: &PolicyContext) -> QualityLevel {
        self.thresholds_ms
            .iter()
            .rposition(|&threshold| context.buffer_level >= threshold)
            .unwrap_or(0)
    }

    fn name(&self) -> &str {
        "BufferThreshold"
    }
}
