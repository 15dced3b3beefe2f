//! Playback depletion over simulated time
//!
//! Consumes buffered chunks as play time advances, accounts rebuffering when
//! the cursor has nothing to play, and applies scheduled seeks the moment
//! play time crosses them.

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::buffer::{
    BufferError, MultiRegionBuffer, POSITION_TOLERANCE_MS, QualityLevel, SeekOutcome,
};
use crate::config::PlayoutConfig;
use crate::playback::PlaybackCursor;
use crate::seek::{SeekEvent, SeekRounding, SeekSchedule, SeekTarget, resolve_seek_target};

/// Aggregate playback statistics for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayoutMetrics {
    /// Simulated play time elapsed in milliseconds, stalls included
    pub total_play_time: f64,
    /// Milliseconds spent with nothing to play
    pub rebuffer_time: f64,
    /// Number of depletion calls that ended in a stall
    pub rebuffer_events: u64,
    /// Chunks that started playing
    pub chunks_played: u64,
    /// Times consecutive chunks played at different quality
    pub quality_switches: u64,
    /// Quality of the most recently started chunk
    pub last_quality: Option<QualityLevel>,
    /// Seeks applied during depletion
    pub seeks_processed: u64,
    /// Play time at which the latest seek fired
    pub last_seek_time: Option<f64>,
}

impl PlayoutMetrics {
    /// Fraction of play time spent rebuffering (0-1)
    pub fn rebuffer_ratio(&self) -> f64 {
        if self.total_play_time <= 0.0 {
            return 0.0;
        }
        self.rebuffer_time / self.total_play_time
    }

    fn record_played(&mut self, quality: QualityLevel) {
        self.chunks_played += 1;
        if self.last_quality.is_some_and(|last| last != quality) {
            self.quality_switches += 1;
        }
        self.last_quality = Some(quality);
    }
}

/// How a depletion call ended
#[derive(Debug, Clone, PartialEq)]
pub enum DepleteOutcome {
    /// All requested time was played or stalled through
    Completed,
    /// A scheduled seek fired and cut the call short
    Seeked {
        event: SeekEvent,
        target: SeekTarget,
        outcome: SeekOutcome,
    },
}

impl DepleteOutcome {
    pub fn is_seek(&self) -> bool {
        matches!(self, DepleteOutcome::Seeked { .. })
    }
}

/// Drives the playback cursor through the buffer as simulated time passes.
#[derive(Debug, Clone, Default)]
pub struct Playout {
    seek_rounding: SeekRounding,
    metrics: PlayoutMetrics,
    /// The chunk at the cursor was entered partway by a seek and has not been counted
    entered_midway: bool,
}

impl Playout {
    pub fn new(config: &PlayoutConfig) -> Self {
        Self {
            seek_rounding: config.seek_rounding,
            metrics: PlayoutMetrics::default(),
            entered_midway: false,
        }
    }

    pub fn metrics(&self) -> &PlayoutMetrics {
        &self.metrics
    }

    /// Current simulated play time in milliseconds.
    pub fn play_time(&self) -> f64 {
        self.metrics.total_play_time
    }

    /// Advances play time for the startup download, during which nothing plays.
    pub fn advance_startup(&mut self, time: f64) {
        self.metrics.total_play_time += time;
    }

    /// Plays `time` milliseconds from the cursor.
    ///
    /// The partially played chunk is finished first, then whole chunks are
    /// consumed, and any remainder is kept as `buffer_fcc`. Time with nothing
    /// to play counts as rebuffering. A seek falling inside the interval is
    /// applied immediately and ends the call.
    ///
    /// A chunk counts as played once, when playback first enters it. That is
    /// normally the whole-chunk loop below; a chunk a seek landed partway
    /// into is counted when the partial branch first plays it.
    ///
    /// # Errors
    ///
    /// - `BufferError::EmptyRegion` - The buffer held an empty region
    pub fn deplete(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        schedule: &mut SeekSchedule,
        time: f64,
    ) -> Result<DepleteOutcome, BufferError> {
        let segment_time = buffer.segment_time();
        let mut time = time;

        let Some(current) = buffer.chunk_at(cursor.position()) else {
            return Ok(self.stall(buffer, cursor, schedule, time));
        };

        if cursor.buffer_fcc() > 0.0 {
            if std::mem::take(&mut self.entered_midway) {
                self.metrics.record_played(current);
            }
            if time + cursor.buffer_fcc() < segment_time {
                cursor.consume(time);
                return Ok(self
                    .advance_clock(buffer, cursor, schedule, time)
                    .unwrap_or(DepleteOutcome::Completed));
            }

            let remaining = segment_time - cursor.buffer_fcc();
            time -= remaining;
            if let Some(seeked) = self.advance_clock(buffer, cursor, schedule, remaining) {
                return Ok(seeked);
            }
            buffer.pop_chunk_at(cursor.position())?;
            cursor.finish_chunk(segment_time);
        }

        while time > 0.0 {
            let Some(quality) = buffer.chunk_at(cursor.position()) else {
                break;
            };
            self.metrics.record_played(quality);

            if time >= segment_time {
                buffer.pop_chunk_at(cursor.position())?;
                cursor.finish_chunk(segment_time);
                let seeked = self.advance_clock(buffer, cursor, schedule, segment_time);
                if let Some(seeked) = seeked {
                    return Ok(seeked);
                }
                time -= segment_time;
            } else {
                cursor.consume(time);
                if let Some(seeked) = self.advance_clock(buffer, cursor, schedule, time) {
                    return Ok(seeked);
                }
                time = 0.0;
            }
        }

        if time > POSITION_TOLERANCE_MS {
            return Ok(self.stall(buffer, cursor, schedule, time));
        }
        Ok(DepleteOutcome::Completed)
    }

    /// Applies every seek whose time has already passed, in schedule order.
    ///
    /// Play time does not move. Returns the outcome of the last seek applied,
    /// which is where playback ends up.
    pub fn apply_overdue_seeks(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        schedule: &mut SeekSchedule,
    ) -> Option<DepleteOutcome> {
        let mut last = None;
        while let Some(event) = schedule.take_overdue(self.metrics.total_play_time) {
            last = Some(self.apply_seek(buffer, cursor, event));
        }
        last
    }

    /// Plays out all contiguous content at the cursor.
    ///
    /// # Errors
    ///
    /// - `BufferError::EmptyRegion` - The buffer held an empty region
    pub fn drain(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        schedule: &mut SeekSchedule,
    ) -> Result<DepleteOutcome, BufferError> {
        let level = buffer.get_buffer_level(cursor.position(), cursor.buffer_fcc());
        if level <= 0.0 {
            return Ok(DepleteOutcome::Completed);
        }
        trace!("Draining {}ms of buffered content", level);
        self.deplete(buffer, cursor, schedule, level)
    }

    fn stall(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        schedule: &mut SeekSchedule,
        time: f64,
    ) -> DepleteOutcome {
        self.metrics.rebuffer_time += time;
        if let Some(seeked) = self.advance_clock(buffer, cursor, schedule, time) {
            return seeked;
        }
        self.metrics.rebuffer_events += 1;
        debug!(
            "Rebuffered {}ms at position {}ms",
            time,
            cursor.position()
        );
        DepleteOutcome::Completed
    }

    fn advance_clock(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        schedule: &mut SeekSchedule,
        delta: f64,
    ) -> Option<DepleteOutcome> {
        let Some(event) = schedule.take_due(self.metrics.total_play_time, delta) else {
            self.metrics.total_play_time += delta;
            return None;
        };

        self.metrics.total_play_time = event.seek_when;
        Some(self.apply_seek(buffer, cursor, event))
    }

    fn apply_seek(
        &mut self,
        buffer: &mut MultiRegionBuffer,
        cursor: &mut PlaybackCursor,
        event: SeekEvent,
    ) -> DepleteOutcome {
        self.metrics.seeks_processed += 1;
        self.metrics.last_seek_time = Some(event.seek_when);

        let target =
            resolve_seek_target(event.seek_to, buffer.segment_time(), self.seek_rounding);
        let outcome = buffer.seek_to(target.segment_start, cursor);
        cursor.jump_to(target.segment_start, target.played);
        self.entered_midway = target.played > 0.0;
        info!(
            "Seek fired at play time {}ms: {}ms -> {}ms (+{}ms played)",
            event.seek_when, event.seek_to, target.segment_start, target.played
        );
        DepleteOutcome::Seeked {
            event,
            target,
            outcome,
        }
    }
}
