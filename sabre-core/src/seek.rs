//! Seek events and their scheduling against simulated play time.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::POSITION_TOLERANCE_MS;
use crate::playback::segment_index_at;

/// A user jump in playback position, fired once play time reaches `seek_when`.
///
/// Both fields are milliseconds: `seek_when` is simulated play time and
/// `seek_to` is a media position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekEvent {
    pub seek_when: f64,
    pub seek_to: f64,
}

impl SeekEvent {
    pub fn new(seek_when: f64, seek_to: f64) -> Self {
        Self { seek_when, seek_to }
    }

    /// Builds an event from values expressed in seconds, as seek configs are written.
    pub fn from_seconds(seek_when: f64, seek_to: f64) -> Self {
        Self::new(seek_when * 1000.0, seek_to * 1000.0)
    }
}

/// Pending seek events in firing order.
#[derive(Debug, Clone, Default)]
pub struct SeekSchedule {
    pending: VecDeque<SeekEvent>,
}

impl SeekSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a schedule sorted by `seek_when`; events sharing a time keep their order.
    pub fn from_events(events: impl IntoIterator<Item = SeekEvent>) -> Self {
        let mut events: Vec<_> = events.into_iter().collect();
        events.sort_by(|a, b| a.seek_when.total_cmp(&b.seek_when));
        Self {
            pending: events.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Next event that will fire, if any.
    pub fn peek(&self) -> Option<&SeekEvent> {
        self.pending.front()
    }

    /// Pops the next event if it fires while play time advances by `delta`.
    ///
    /// An event fires when `play_time < seek_when <= play_time + delta`.
    /// Events whose time has already passed never fire.
    pub fn take_due(&mut self, play_time: f64, delta: f64) -> Option<SeekEvent> {
        let next = self.pending.front()?;
        if play_time < next.seek_when && play_time + delta >= next.seek_when {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Pops the next event if its time is at or before `play_time`.
    ///
    /// Used to catch up on events that came due while play time was not
    /// advancing through depletion, such as during the startup download.
    pub fn take_overdue(&mut self, play_time: f64) -> Option<SeekEvent> {
        if self.pending.front()?.seek_when <= play_time {
            self.pending.pop_front()
        } else {
            None
        }
    }
}

/// How a requested seek position maps onto the media timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekRounding {
    /// Snap to the closest segment boundary, rounding half-way up
    #[default]
    NearestBoundary,
    /// Use the requested position unchanged
    Exact,
}

impl fmt::Display for SeekRounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekRounding::NearestBoundary => write!(f, "nearest_boundary"),
            SeekRounding::Exact => write!(f, "exact"),
        }
    }
}

impl FromStr for SeekRounding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "nearest_boundary" | "nearest" => Ok(SeekRounding::NearestBoundary),
            "exact" => Ok(SeekRounding::Exact),
            other => Err(format!("unknown seek rounding: {other}")),
        }
    }
}

/// Where playback resumes after a seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    /// Start of the segment playback resumes in
    pub segment_start: f64,
    /// Milliseconds of that segment already behind the playhead
    pub played: f64,
}

impl SeekTarget {
    /// Media position playback resumes from.
    pub fn position(&self) -> f64 {
        self.segment_start + self.played
    }
}

/// Maps a requested seek position to the segment playback resumes in.
///
/// With `NearestBoundary`, a target in the first half of a segment stays in
/// that segment with the part before the target counted as played, and one
/// in the second half moves to the start of the next segment. `Exact` always
/// stays in the segment holding the target.
pub fn resolve_seek_target(
    seek_to: f64,
    segment_time: f64,
    rounding: SeekRounding,
) -> SeekTarget {
    let seek_to = if seek_to.is_finite() { seek_to.max(0.0) } else { 0.0 };
    let segment_start = segment_index_at(seek_to, segment_time) as f64 * segment_time;
    let played = (seek_to - segment_start).max(0.0);

    if rounding == SeekRounding::NearestBoundary && played >= segment_time / 2.0 {
        return SeekTarget {
            segment_start: segment_start + segment_time,
            played: 0.0,
        };
    }
    SeekTarget {
        segment_start,
        played: if played > POSITION_TOLERANCE_MS { played } else { 0.0 },
    }
}
