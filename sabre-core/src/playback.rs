//! Playback cursor shared between the buffer and the download loop.

use crate::buffer::POSITION_TOLERANCE_MS;

/// Current playback position plus progress through the chunk under it.
///
/// The buffer reads and moves the cursor only through explicit calls, it
/// never owns one. `position` may sit anywhere inside the current segment
/// (a seek can land mid-segment); `buffer_fcc` is always measured from that
/// segment's start boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackCursor {
    position: f64,
    buffer_fcc: f64,
}

impl PlaybackCursor {
    /// Creates a cursor at the start of the media.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cursor at an arbitrary position with nothing consumed.
    pub fn at(position: f64) -> Self {
        Self {
            position,
            buffer_fcc: 0.0,
        }
    }

    /// Current playback position in milliseconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Milliseconds of the current chunk already played.
    pub fn buffer_fcc(&self) -> f64 {
        self.buffer_fcc
    }

    /// Records partial progress through the current chunk.
    pub fn consume(&mut self, played: f64) {
        self.buffer_fcc += played;
    }

    /// Moves to the next segment boundary after finishing the current chunk.
    pub fn finish_chunk(&mut self, segment_time: f64) {
        let index = segment_index_at(self.position, segment_time);
        self.position = (index + 1) as f64 * segment_time;
        self.buffer_fcc = 0.0;
    }

    /// Jumps to `position` with `buffer_fcc` already played.
    pub fn jump_to(&mut self, position: f64, buffer_fcc: f64) {
        self.position = position;
        self.buffer_fcc = buffer_fcc;
    }

    /// Index of the segment the cursor is in.
    pub fn segment_index(&self, segment_time: f64) -> u64 {
        segment_index_at(self.position, segment_time)
    }
}

/// Index of the segment containing `position`, tolerant of accumulated float error.
pub fn segment_index_at(position: f64, segment_time: f64) -> u64 {
    let index = ((position + POSITION_TOLERANCE_MS) / segment_time).floor();
    if index <= 0.0 { 0 } else { index as u64 }
}
