//! Centralized configuration for Sabre.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use crate::seek::SeekRounding;

/// Central configuration for all Sabre components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SabreConfig {
    pub buffer: BufferConfig,
    pub playout: PlayoutConfig,
    pub simulation: SimulationConfig,
}

/// Playback buffer configuration.
///
/// Segment geometry comes from the manifest; the maximum buffer size is the
/// level above which the download loop waits instead of fetching.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Duration of one segment in milliseconds
    pub segment_time_ms: f64,
    /// Number of segments in the manifest (None = unbounded)
    pub segment_count: Option<u64>,
    /// Buffer level in milliseconds above which downloads pause
    pub max_buffer_ms: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            segment_time_ms: 3000.0,
            segment_count: None,
            max_buffer_ms: 25_000.0, // 25 seconds
        }
    }
}

/// Playout behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct PlayoutConfig {
    /// How seek targets are mapped onto segment positions
    pub seek_rounding: SeekRounding,
}

/// Simulation harness configuration for deterministic testing.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for reproducible simulations
    pub deterministic_seed: Option<u64>,
    /// Relative spread applied to simulated download durations (0.0 to 1.0)
    pub download_jitter: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            download_jitter: 0.1,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            deterministic_seed: Some(42), // Fixed seed for reproducible tests
            download_jitter: 0.0,
        }
    }
}

impl SabreConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(segment_time) = std::env::var("SABRE_SEGMENT_TIME_MS") {
            if let Ok(ms) = segment_time.parse::<f64>() {
                if ms.is_finite() && ms > 0.0 {
                    config.buffer.segment_time_ms = ms;
                }
            }
        }

        if let Ok(max_buffer) = std::env::var("SABRE_MAX_BUFFER_MS") {
            if let Ok(ms) = max_buffer.parse::<f64>() {
                config.buffer.max_buffer_ms = ms;
            }
        }

        if let Ok(seed) = std::env::var("SABRE_SIMULATION_SEED") {
            if let Ok(seed_value) = seed.parse::<u64>() {
                config.simulation.deterministic_seed = Some(seed_value);
            }
        }

        if let Ok(rounding) = std::env::var("SABRE_SEEK_ROUNDING") {
            if let Ok(parsed) = rounding.parse::<SeekRounding>() {
                config.playout.seek_rounding = parsed;
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            buffer: BufferConfig {
                segment_time_ms: 2000.0,
                segment_count: Some(60),
                max_buffer_ms: 20_000.0,
            },
            simulation: SimulationConfig::deterministic_testing(),
            ..Default::default()
        }
    }
}
