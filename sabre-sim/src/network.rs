//! Download duration models
//!
//! The session treats the network as a black box that answers one question:
//! how long does this segment at this quality take to arrive.

use sabre_core::QualityLevel;

use crate::clock::DeterministicRng;

/// Produces the simulated duration of a segment download.
pub trait DownloadModel {
    /// Milliseconds needed to fetch `segment_index` at `quality`.
    fn download_time(
        &mut self,
        segment_index: u64,
        quality: QualityLevel,
        rng: &mut DeterministicRng,
    ) -> f64;

    /// Returns name of this model.
    fn name(&self) -> &str;
}

/// Every download takes the same time regardless of quality.
#[derive(Debug, Clone)]
pub struct FixedDuration {
    duration_ms: f64,
}

impl FixedDuration {
    /// Creates a model where each download takes `duration_ms`.
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms: duration_ms.max(0.0),
        }
    }
}

impl DownloadModel for FixedDuration {
    fn download_time(&mut self, _: u64, _: QualityLevel, _: &mut DeterministicRng) -> f64 {
        self.duration_ms
    }

    fn name(&self) -> &str {
        "FixedDuration"
    }
}

/// Link with constant throughput and latency, optionally jittered per download.
///
/// Segment size is `bitrate * segment_time`, so higher qualities take
/// proportionally longer.
#[derive(Debug, Clone)]
pub struct ThroughputModel {
    bitrates_kbps: Vec<f64>,
    segment_time_ms: f64,
    throughput_kbps: f64,
    latency_ms: f64,
    jitter: f64,
}

impl ThroughputModel {
    /// Creates a jitter-free model for the given bitrate ladder.
    pub fn new(bitrates_kbps: Vec<f64>, segment_time_ms: f64, throughput_kbps: f64) -> Self {
        Self {
            bitrates_kbps,
            segment_time_ms,
            throughput_kbps,
            latency_ms: 0.0,
            jitter: 0.0,
        }
    }

    /// Adds a fixed round-trip delay to each download.
    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms.max(0.0);
        self
    }

    /// Spreads each transfer time by up to `jitter` of its nominal value.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Number of quality levels in the ladder.
    pub fn quality_count(&self) -> usize {
        self.bitrates_kbps.len()
    }

    fn transfer_time(&self, quality: QualityLevel) -> f64 {
        let Some(&bitrate) = self
            .bitrates_kbps
            .get(quality)
            .or(self.bitrates_kbps.last())
        else {
            return 0.0;
        };
        if self.throughput_kbps <= 0.0 {
            return f64::INFINITY;
        }
        bitrate * self.segment_time_ms / self.throughput_kbps
    }
}

impl DownloadModel for ThroughputModel {
    fn download_time(
        &mut self,
        _segment_index: u64,
        quality: QualityLevel,
        rng: &mut DeterministicRng,
    ) -> f64 {
        let transfer = self.transfer_time(quality) * rng.jitter_factor(self.jitter);
        self.latency_ms + transfer
    }

    fn name(&self) -> &str {
        "Throughput"
    }
}
