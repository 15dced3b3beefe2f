//! Download-loop session driving the playback buffer.
//!
//! The loop mirrors a player: fetch the first segment, then repeatedly wait
//! while the buffer is full, pick a quality, download the next missing
//! segment while playback depletes the buffer, and react to seeks. Once the
//! last segment is in, the remaining content is played out.

use sabre_core::config::SabreConfig;
use sabre_core::{
    BufferStats, DepleteOutcome, MultiRegionBuffer, PlaybackCursor, Playout, PlayoutMetrics,
    QualityLevel, SeekEvent, SeekSchedule,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::SimulationError;
use crate::clock::{DeterministicRng, SimulatedClock};
use crate::invariants::{BufferView, Invariant, InvariantViolation, default_invariants};
use crate::network::DownloadModel;
use crate::policy::{PolicyContext, QualityPolicy};

/// Maximum number of loop iterations before a session is considered stuck.
const MAX_SESSION_STEPS: usize = 1_000_000;

/// Maximum number of invariant violations before stopping the session.
const MAX_INVARIANT_VIOLATIONS: usize = 10;

/// One completed segment download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRecord {
    /// Segment that was fetched
    pub segment_index: u64,
    /// Quality it was fetched at
    pub quality: QualityLevel,
    /// Simulated download duration in milliseconds
    pub download_time: f64,
    /// Contiguous buffer level at the cursor once the chunk was added
    pub buffer_level_after: f64,
}

/// Result of a session run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Seed used for reproduction
    pub seed: u64,
    /// Segments in the manifest
    pub segment_count: u64,
    /// Segment duration in milliseconds
    pub segment_time: f64,
    /// Completed downloads in order
    pub downloads: Vec<DownloadRecord>,
    /// Downloads thrown away because a seek fired mid-transfer
    pub downloads_abandoned: u64,
    /// Milliseconds spent waiting for buffer space
    pub full_buffer_wait: f64,
    /// Simulated wall time at the end of the session
    pub wall_time: f64,
    /// Seeks that never fired
    pub pending_seeks: usize,
    /// Playback statistics
    pub playout: PlayoutMetrics,
    /// Buffer usage statistics
    pub buffer: BufferStats,
    /// Invariant violations observed during the run
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SessionReport {
    /// Whether the run finished without any invariant violation.
    pub fn success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    /// Generates human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Session Report (seed: {})\n", self.seed));
        summary.push_str(&format!(
            "Segments: {} x {}ms\n",
            self.segment_count, self.segment_time
        ));
        summary.push_str(&format!(
            "Downloads: {} completed, {} abandoned\n",
            self.downloads.len(),
            self.downloads_abandoned
        ));
        summary.push_str(&format!(
            "Play time: {}ms, rebuffering {}ms over {} events\n",
            self.playout.total_play_time, self.playout.rebuffer_time, self.playout.rebuffer_events
        ));
        summary.push_str(&format!(
            "Seeks: {} processed, {} pending, {} chunks discarded\n",
            self.playout.seeks_processed, self.pending_seeks, self.buffer.chunks_discarded
        ));

        if !self.invariant_violations.is_empty() {
            summary.push_str("\nInvariant violations:\n");
            for violation in &self.invariant_violations {
                summary.push_str(&format!("  - {violation}\n"));
            }
        }

        summary
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Report` - Serialization failed
    pub fn to_json(&self) -> Result<String, SimulationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A single simulated viewing session over one manifest.
pub struct SimulationSession {
    buffer: MultiRegionBuffer,
    cursor: PlaybackCursor,
    playout: Playout,
    schedule: SeekSchedule,
    clock: SimulatedClock,
    rng: DeterministicRng,
    model: Box<dyn DownloadModel>,
    policy: Box<dyn QualityPolicy>,
    invariants: Vec<Box<dyn Invariant>>,
    segment_count: u64,
    max_buffer: f64,
    downloads: Vec<DownloadRecord>,
    downloads_abandoned: u64,
    full_buffer_wait: f64,
    last_quality: Option<QualityLevel>,
    violations: Vec<InvariantViolation>,
}

impl SimulationSession {
    /// Creates a session from configuration and the two black-box seams.
    ///
    /// # Errors
    ///
    /// - `SimulationError::NoDeterministicSeed` - Configuration carries no seed
    /// - `SimulationError::MissingSegmentCount` - Manifest length is not configured
    /// - `SimulationError::InvalidConfiguration` - Max buffer is smaller than one segment
    /// - `SimulationError::Buffer` - Segment time is invalid
    pub fn new(
        config: &SabreConfig,
        model: Box<dyn DownloadModel>,
        policy: Box<dyn QualityPolicy>,
    ) -> Result<Self, SimulationError> {
        let seed = config
            .simulation
            .deterministic_seed
            .ok_or(SimulationError::NoDeterministicSeed)?;
        let segment_count = config
            .buffer
            .segment_count
            .ok_or(SimulationError::MissingSegmentCount)?;
        let buffer = MultiRegionBuffer::from_config(&config.buffer)?;
        if config.buffer.max_buffer_ms < buffer.segment_time() {
            return Err(SimulationError::InvalidConfiguration {
                reason: format!(
                    "max buffer {}ms cannot hold one {}ms segment",
                    config.buffer.max_buffer_ms,
                    buffer.segment_time()
                ),
            });
        }

        Ok(Self {
            buffer,
            cursor: PlaybackCursor::new(),
            playout: Playout::new(&config.playout),
            schedule: SeekSchedule::new(),
            clock: SimulatedClock::new(),
            rng: DeterministicRng::from_seed(seed),
            model,
            policy,
            invariants: default_invariants(),
            segment_count,
            max_buffer: config.buffer.max_buffer_ms,
            downloads: Vec::new(),
            downloads_abandoned: 0,
            full_buffer_wait: 0.0,
            last_quality: None,
            violations: Vec::new(),
        })
    }

    /// Schedules seeks to fire during the session.
    pub fn with_seeks(mut self, events: impl IntoIterator<Item = SeekEvent>) -> Self {
        self.schedule = SeekSchedule::from_events(events);
        self
    }

    /// Adds an invariant checked after every buffer call.
    pub fn with_invariant(mut self, invariant: Box<dyn Invariant>) -> Self {
        self.invariants.push(invariant);
        self
    }

    /// Buffer under simulation.
    pub fn buffer(&self) -> &MultiRegionBuffer {
        &self.buffer
    }

    /// Runs the session to completion.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Buffer` - The buffer rejected an operation
    /// - `SimulationError::InvalidDownloadTime` - The download model returned an unusable duration
    /// - `SimulationError::InvalidTimeAdvance` - Simulated time would move backwards
    /// - `SimulationError::TooManyInvariantViolations` - Violations exceeded the limit
    /// - `SimulationError::StepLimitExceeded` - The loop did not terminate
    pub fn run(mut self) -> Result<SessionReport, SimulationError> {
        info!(
            "Starting session: {} segments, model={}, policy={}",
            self.segment_count,
            self.model.name(),
            self.policy.name()
        );
        self.startup()?;

        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_SESSION_STEPS {
                return Err(SimulationError::StepLimitExceeded { steps });
            }

            let next = self.buffer.next_missing_segment(self.cursor.position());
            if next >= self.segment_count {
                let outcome = self.drain()?;
                if outcome.is_seek() {
                    continue;
                }
                break;
            }

            if self.wait_for_space()?.is_seek() {
                continue;
            }
            self.download(next)?;
        }

        Ok(self.finish())
    }

    fn startup(&mut self) -> Result<(), SimulationError> {
        let quality = self.select_quality(0);
        let download_time = self.download_time(0, quality)?;

        self.playout.advance_startup(download_time);
        self.sync_clock()?;
        self.buffer.add_chunk(0, quality)?;
        self.record_download(0, quality, download_time);
        self.check_invariants()?;
        debug!(
            "Startup download of segment 0 at quality {} took {}ms",
            quality, download_time
        );

        if self
            .playout
            .apply_overdue_seeks(&mut self.buffer, &mut self.cursor, &mut self.schedule)
            .is_some()
        {
            self.check_invariants()?;
        }
        Ok(())
    }

    fn wait_for_space(&mut self) -> Result<DepleteOutcome, SimulationError> {
        let level = self.current_level();
        let full_delay = level + self.buffer.segment_time() - self.max_buffer;
        if full_delay <= 0.0 {
            return Ok(DepleteOutcome::Completed);
        }

        debug!("Buffer full at {}ms, waiting {}ms", level, full_delay);
        let before = self.playout.play_time();
        let outcome = self.playout.deplete(
            &mut self.buffer,
            &mut self.cursor,
            &mut self.schedule,
            full_delay,
        )?;
        self.full_buffer_wait += self.playout.play_time() - before;
        self.sync_clock()?;
        self.check_invariants()?;
        Ok(outcome)
    }

    fn download(&mut self, segment_index: u64) -> Result<(), SimulationError> {
        let quality = self.select_quality(segment_index);
        let download_time = self.download_time(segment_index, quality)?;

        let outcome = self.playout.deplete(
            &mut self.buffer,
            &mut self.cursor,
            &mut self.schedule,
            download_time,
        )?;
        self.sync_clock()?;
        self.check_invariants()?;

        if outcome.is_seek() {
            self.downloads_abandoned += 1;
            debug!(
                "Seek abandoned download of segment {} at quality {}",
                segment_index, quality
            );
            return Ok(());
        }

        self.buffer.add_chunk(segment_index, quality)?;
        self.record_download(segment_index, quality, download_time);
        self.check_invariants()
    }

    fn drain(&mut self) -> Result<DepleteOutcome, SimulationError> {
        let outcome = self
            .playout
            .drain(&mut self.buffer, &mut self.cursor, &mut self.schedule)?;
        self.sync_clock()?;
        self.check_invariants()?;
        Ok(outcome)
    }

    fn select_quality(&mut self, segment_index: u64) -> QualityLevel {
        let context = PolicyContext {
            segment_index,
            buffer_level: self.current_level(),
            last_quality: self.last_quality,
        };
        self.policy.select(&context)
    }

    fn download_time(
        &mut self,
        segment_index: u64,
        quality: QualityLevel,
    ) -> Result<f64, SimulationError> {
        let time = self
            .model
            .download_time(segment_index, quality, &mut self.rng);
        if !time.is_finite() || time < 0.0 {
            return Err(SimulationError::InvalidDownloadTime {
                segment_index,
                download_time: time,
            });
        }
        Ok(time)
    }

    fn record_download(&mut self, segment_index: u64, quality: QualityLevel, download_time: f64) {
        self.last_quality = Some(quality);
        self.downloads.push(DownloadRecord {
            segment_index,
            quality,
            download_time,
            buffer_level_after: self.current_level(),
        });
    }

    fn current_level(&self) -> f64 {
        self.buffer
            .get_buffer_level(self.cursor.position(), self.cursor.buffer_fcc())
    }

    fn sync_clock(&mut self) -> Result<(), SimulationError> {
        let delta = self.playout.play_time() - self.clock.now();
        self.clock.advance(delta)
    }

    fn check_invariants(&mut self) -> Result<(), SimulationError> {
        let view = BufferView {
            buffer: &self.buffer,
            cursor: &self.cursor,
            now_ms: self.clock.now(),
        };
        for invariant in &self.invariants {
            if let Err(violation) = invariant.check(&view) {
                warn!("{}", violation);
                self.violations.push(violation);
            }
        }

        if self.violations.len() >= MAX_INVARIANT_VIOLATIONS {
            return Err(SimulationError::TooManyInvariantViolations {
                count: self.violations.len(),
            });
        }
        Ok(())
    }

    fn finish(self) -> SessionReport {
        let report = SessionReport {
            seed: self.rng.seed(),
            segment_count: self.segment_count,
            segment_time: self.buffer.segment_time(),
            downloads: self.downloads,
            downloads_abandoned: self.downloads_abandoned,
            full_buffer_wait: self.full_buffer_wait,
            wall_time: self.clock.now(),
            pending_seeks: self.schedule.len(),
            playout: self.playout.metrics().clone(),
            buffer: self.buffer.stats().clone(),
            invariant_violations: self.violations,
        };
        info!(
            "Session finished: {} downloads, {}ms played, {}ms rebuffering",
            report.downloads.len(),
            report.playout.total_play_time,
            report.playout.rebuffer_time
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use sabre_core::config::BufferConfig;

    use super::*;
    use crate::network::FixedDuration;
    use crate::policy::FixedQuality;

    fn config(segment_count: u64, max_buffer_ms: f64) -> SabreConfig {
        let mut config = SabreConfig::for_testing();
        config.buffer = BufferConfig {
            segment_time_ms: 1000.0,
            segment_count: Some(segment_count),
            max_buffer_ms,
        };
        config
    }

    fn session(config: &SabreConfig, download_ms: f64) -> SimulationSession {
        SimulationSession::new(
            config,
            Box::new(FixedDuration::new(download_ms)),
            Box::new(FixedQuality(2)),
        )
        .unwrap()
    }

    #[test]
    fn test_session_requires_seed_and_segment_count() {
        let mut no_seed = config(10, 5000.0);
        no_seed.simulation.deterministic_seed = None;
        let result = SimulationSession::new(
            &no_seed,
            Box::new(FixedDuration::new(1.0)),
            Box::new(FixedQuality(0)),
        );
        assert!(matches!(result, Err(SimulationError::NoDeterministicSeed)));

        let mut no_count = config(10, 5000.0);
        no_count.buffer.segment_count = None;
        let result = SimulationSession::new(
            &no_count,
            Box::new(FixedDuration::new(1.0)),
            Box::new(FixedQuality(0)),
        );
        assert!(matches!(result, Err(SimulationError::MissingSegmentCount)));
    }

    #[test]
    fn test_session_rejects_buffer_smaller_than_segment() {
        let config = config(10, 500.0);
        let result = SimulationSession::new(
            &config,
            Box::new(FixedDuration::new(1.0)),
            Box::new(FixedQuality(0)),
        );
        assert!(matches!(
            result,
            Err(SimulationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_fast_network_plays_without_rebuffering() {
        let config = config(10, 4000.0);
        let report = session(&config, 250.0).run().unwrap();

        assert!(report.success());
        assert_eq!(report.downloads.len(), 10);
        assert_eq!(report.playout.rebuffer_time, 0.0);
        assert_eq!(report.playout.chunks_played, 10);
        assert!(report.full_buffer_wait > 0.0);
        // Startup plus ten seconds of media
        assert!((report.playout.total_play_time - 10_250.0).abs() < 1e-6);
    }

    #[test]
    fn test_slow_network_rebuffers() {
        let config = config(5, 10_000.0);
        let report = session(&config, 1500.0).run().unwrap();

        assert!(report.success());
        assert_eq!(report.downloads.len(), 5);
        assert!(report.playout.rebuffer_time > 0.0);
        assert!(report.playout.rebuffer_events > 0);
    }

    #[test]
    fn test_seek_abandons_in_flight_download() {
        let config = config(20, 30_000.0);
        let report = session(&config, 400.0)
            .with_seeks([SeekEvent::new(1000.0, 10_000.0)])
            .run()
            .unwrap();

        assert!(report.success());
        assert_eq!(report.playout.seeks_processed, 1);
        assert_eq!(report.downloads_abandoned, 1);
        assert_eq!(report.pending_seeks, 0);
        // Content behind the seek target is discarded, not replayed
        assert!(report.buffer.chunks_discarded > 0);
        assert!(report.playout.chunks_played < 20);
    }

    #[test]
    fn test_seek_during_startup_is_applied_afterwards() {
        let config = config(10, 5000.0);
        let report = session(&config, 800.0)
            .with_seeks([SeekEvent::new(100.0, 6000.0)])
            .run()
            .unwrap();

        assert_eq!(report.playout.seeks_processed, 1);
        assert_eq!(report.pending_seeks, 0);
        assert_eq!(report.downloads[1].segment_index, 6);
    }

    #[test]
    fn test_report_serializes() {
        let config = config(3, 5000.0);
        let report = session(&config, 100.0).run().unwrap();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"downloads\""));
        assert!(json.contains("\"rebuffer_time\""));
        assert!(report.summary().contains("Session Report (seed: 42)"));
    }
}
