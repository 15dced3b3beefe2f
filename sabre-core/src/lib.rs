//! Sabre Core - Playback buffer model for adaptive-bitrate streaming simulation
//!
//! This crate tracks which segments have been downloaded, at which quality,
//! and how much of them remains to be played across a simulated timeline
//! that includes seeks. The multi-region buffer keeps prefetched content
//! alive across jumps while reporting exactly the buffer level a plain
//! segment queue would for sequential playback.

pub mod buffer;
pub mod config;
pub mod playback;
pub mod playout;
pub mod seek;
pub mod tracing_setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types for convenient access
pub use buffer::{
    BufferError, BufferRegion, BufferStats, MultiRegionBuffer, POSITION_TOLERANCE_MS,
    QualityLevel, SeekOutcome,
};
pub use config::SabreConfig;
pub use playback::PlaybackCursor;
pub use playout::{DepleteOutcome, Playout, PlayoutMetrics};
pub use seek::{SeekEvent, SeekRounding, SeekSchedule, SeekTarget, resolve_seek_target};
