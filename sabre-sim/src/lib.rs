//! Sabre Simulation Framework - Deterministic download loops over the playback buffer.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate drives `sabre-core` the way a streaming player would: segments
//! are downloaded one after another while playback depletes the buffer, the
//! download pauses when the buffer is full, and scheduled seeks jump the
//! playback position mid-session. The network and the bitrate decision are
//! pluggable black boxes so sessions stay small and reproducible.
//!
//! # Features
//!
//! - **Deterministic Execution**: Same seed always produces identical reports
//! - **Pluggable Seams**: `DownloadModel` and `QualityPolicy` traits
//! - **Invariant Checking**: Buffer structure is validated after every call
//! - **Serializable Reports**: `SessionReport` renders to JSON
//!
//! # Example
//!
//! ```rust,no_run
//! use sabre_core::SeekEvent;
//! use sabre_core::config::SabreConfig;
//! use sabre_sim::{BufferThresholdPolicy, SimulationSession, ThroughputModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SabreConfig::for_testing();
//! let model = ThroughputModel::new(vec![300.0, 750.0, 1200.0], 2000.0, 900.0)
//!     .with_latency(50.0)
//!     .with_jitter(0.1);
//! let policy = BufferThresholdPolicy::evenly_spaced(3, 20_000.0);
//!
//! let report = SimulationSession::new(&config, Box::new(model), Box::new(policy))?
//!     .with_seeks([SeekEvent::from_seconds(30.0, 90.0)])
//!     .run()?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod invariants;
pub mod network;
pub mod policy;
pub mod session;

use sabre_core::BufferError;
use thiserror::Error;

pub use clock::{DeterministicRng, SimulatedClock};
pub use invariants::{
    BufferLevelInvariant, BufferView, ConsumptionBoundsInvariant, Invariant, InvariantViolation,
    SettledRegionsInvariant, default_invariants,
};
pub use network::{DownloadModel, FixedDuration, ThroughputModel};
pub use policy::{BufferThresholdPolicy, FixedQuality, PolicyContext, QualityPolicy};
pub use session::{DownloadRecord, SessionReport, SimulationSession};

/// Errors that can occur during simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Buffer rejected an operation
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Deterministic seed required but not provided
    #[error("No deterministic seed provided")]
    NoDeterministicSeed,

    /// Session needs a finite manifest to terminate
    #[error("Segment count must be configured for a session")]
    MissingSegmentCount,

    /// Configuration values cannot produce a working session
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected
        reason: String,
    },

    /// Simulated time was asked to move by an unusable amount
    #[error("Invalid time advance: {duration_ms}ms")]
    InvalidTimeAdvance {
        /// Requested advance in milliseconds
        duration_ms: f64,
    },

    /// Download model produced a negative or non-finite duration
    #[error("Invalid download time {download_time}ms for segment {segment_index}")]
    InvalidDownloadTime {
        /// Segment being downloaded
        segment_index: u64,
        /// Duration the model returned
        download_time: f64,
    },

    /// Too many invariant violations occurred
    #[error("Too many invariant violations: {count}")]
    TooManyInvariantViolations {
        /// Number of violations that occurred
        count: usize,
    },

    /// Session loop ran longer than allowed
    #[error("Session step limit exceeded after {steps} steps")]
    StepLimitExceeded {
        /// Steps taken before giving up
        steps: usize,
    },

    /// Report could not be serialized
    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}
