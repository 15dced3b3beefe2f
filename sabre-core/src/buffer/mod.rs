//! Multi-region playback buffer
//!
//! Tracks downloaded segments as a set of non-contiguous regions so a seek
//! keeps prefetched content instead of flushing everything. For purely
//! sequential playback the buffer degenerates into a single region and
//! reports exactly what a plain queue of segments would.

pub use self::multi_region::{MultiRegionBuffer, SeekOutcome};
pub use self::region::BufferRegion;
pub use self::stats::BufferStats;

mod multi_region;
mod region;
mod stats;

/// Opaque quality level chosen by the ABR algorithm for a chunk.
pub type QualityLevel = usize;

/// Tolerance for comparing positions built from repeated `segment_time` arithmetic.
pub const POSITION_TOLERANCE_MS: f64 = 0.001;

/// Error types for buffer operations
///
/// Every variant is a contract violation by the caller. Running out of
/// playable content is not an error and is reported through return values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BufferError {
    /// A chunk was popped from a region that holds none
    #[error("Cannot pop chunk from empty region at {start}ms")]
    EmptyRegion { start: f64 },

    /// Segment index lies outside the manifest
    #[error("Segment index {segment_index} outside manifest of {segment_count} segments")]
    InvalidSegmentIndex {
        segment_index: u64,
        segment_count: u64,
    },

    /// Segment is already held by a region
    #[error("Segment {segment_index} is already buffered")]
    SegmentAlreadyBuffered { segment_index: u64 },

    /// Replacement targeted a segment that is not buffered
    #[error("Segment {segment_index} is not buffered")]
    SegmentNotBuffered { segment_index: u64 },

    /// Segment duration must be positive and finite
    #[error("Invalid segment time: {segment_time}ms")]
    InvalidSegmentTime { segment_time: f64 },
}
