//! Statistics tracking for multi-region buffer operations

use serde::Serialize;

/// Counters describing how the buffer has been used over a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Total number of chunks inserted
    pub chunks_added: u64,

    /// Total number of chunks handed to playback
    pub chunks_consumed: u64,

    /// Chunks dropped because a seek made them unreachable
    pub chunks_discarded: u64,

    /// Chunks whose quality was overwritten by a replacement download
    pub chunks_replaced: u64,

    /// Number of regions started in empty space
    pub regions_created: u64,

    /// Number of times two adjacent regions were coalesced
    pub regions_merged: u64,

    /// Pop requests that found no content at the cursor
    pub stalls: u64,

    /// Number of seeks applied
    pub seeks: u64,

    /// Largest number of regions held at once
    pub peak_regions: usize,
}

impl BufferStats {
    /// Creates new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks still held by the buffer according to the counters
    pub fn chunks_held(&self) -> u64 {
        self.chunks_added
            .saturating_sub(self.chunks_consumed)
            .saturating_sub(self.chunks_discarded)
    }

    /// Fraction of inserted chunks that were thrown away by seeks (0-1)
    pub fn discard_ratio(&self) -> f64 {
        if self.chunks_added == 0 {
            return 0.0;
        }
        self.chunks_discarded as f64 / self.chunks_added as f64
    }

    pub(crate) fn record_chunk_added(&mut self, created_region: bool) {
        self.chunks_added += 1;
        if created_region {
            self.regions_created += 1;
        }
    }

    pub(crate) fn record_region_count(&mut self, regions: usize) {
        self.peak_regions = self.peak_regions.max(regions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_held_accounts_for_consumption_and_discards() {
        let mut stats = BufferStats::new();
        for _ in 0..10 {
            stats.record_chunk_added(false);
        }
        stats.chunks_consumed = 4;
        stats.chunks_discarded = 3;

        assert_eq!(stats.chunks_held(), 3);
        assert!((stats.discard_ratio() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_discard_ratio_empty() {
        assert_eq!(BufferStats::new().discard_ratio(), 0.0);
    }

    #[test]
    fn test_peak_regions_only_grows() {
        let mut stats = BufferStats::new();
        stats.record_region_count(3);
        stats.record_region_count(1);
        assert_eq!(stats.peak_regions, 3);
    }
}
