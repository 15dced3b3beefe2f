//! Invariant checking framework for session validation.

use std::fmt;

use sabre_core::test_utils::settled_violation;
use sabre_core::{MultiRegionBuffer, PlaybackCursor};
use serde::Serialize;

/// Violation of a buffer invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: String,
    /// Detailed description of the violation
    pub description: String,
    /// Simulation time at which the violation was observed
    pub at_ms: f64,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invariant '{}' violated at {}ms: {}",
            self.invariant, self.at_ms, self.description
        )
    }
}

/// Snapshot handed to each invariant after a buffer call.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    /// Buffer under test
    pub buffer: &'a MultiRegionBuffer,
    /// Playback cursor at the time of the check
    pub cursor: &'a PlaybackCursor,
    /// Simulation time of the check
    pub now_ms: f64,
}

/// Trait for checking buffer invariants.
pub trait Invariant {
    /// Checks if invariant holds for current state.
    ///
    /// # Errors
    ///
    /// - `InvariantViolation` - The invariant condition is not met
    fn check(&self, view: &BufferView<'_>) -> Result<(), InvariantViolation>;

    /// Returns name of this invariant.
    fn name(&self) -> &str;

    /// Builds a violation of this invariant observed in `view`.
    fn violation(&self, view: &BufferView<'_>, description: String) -> InvariantViolation {
        InvariantViolation {
            invariant: self.name().to_string(),
            description,
            at_ms: view.now_ms,
        }
    }
}

/// Regions are non-empty, sorted, non-overlapping, and never touch.
pub struct SettledRegionsInvariant;

impl Invariant for SettledRegionsInvariant {
    fn check(&self, view: &BufferView<'_>) -> Result<(), InvariantViolation> {
        match settled_violation(view.buffer) {
            Some(description) => Err(self.violation(view, description)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "SettledRegions"
    }
}

/// Partial consumption stays within one segment: `0 <= buffer_fcc < segment_time`.
pub struct ConsumptionBoundsInvariant;

impl Invariant for ConsumptionBoundsInvariant {
    fn check(&self, view: &BufferView<'_>) -> Result<(), InvariantViolation> {
        let fcc = view.cursor.buffer_fcc();
        let segment_time = view.buffer.segment_time();
        if !(0.0..segment_time).contains(&fcc) {
            return Err(self.violation(
                view,
                format!("buffer_fcc {fcc}ms outside [0, {segment_time})"),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ConsumptionBounds"
    }
}

/// Reported level is never negative and never exceeds the chunks actually held.
pub struct BufferLevelInvariant;

impl Invariant for BufferLevelInvariant {
    fn check(&self, view: &BufferView<'_>) -> Result<(), InvariantViolation> {
        let level = view
            .buffer
            .get_buffer_level(view.cursor.position(), view.cursor.buffer_fcc());
        let held = view.buffer.total_chunks() as f64 * view.buffer.segment_time();
        if level < 0.0 || level > held {
            return Err(self.violation(
                view,
                format!("buffer level {level}ms with {held}ms of chunks held"),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "BufferLevel"
    }
}

/// Invariants every session checks unless configured otherwise.
pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(SettledRegionsInvariant),
        Box::new(ConsumptionBoundsInvariant),
        Box::new(BufferLevelInvariant),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(buffer: &'a MultiRegionBuffer, cursor: &'a PlaybackCursor) -> BufferView<'a> {
        BufferView {
            buffer,
            cursor,
            now_ms: 1234.0,
        }
    }

    #[test]
    fn test_default_invariants_hold_for_gapped_buffer() {
        let mut buffer = MultiRegionBuffer::new(1000.0).unwrap();
        buffer.add_chunk(0, 1).unwrap();
        buffer.add_chunk(5, 1).unwrap();
        let cursor = PlaybackCursor::new();

        for invariant in default_invariants() {
            assert!(invariant.check(&view(&buffer, &cursor)).is_ok());
        }
    }

    #[test]
    fn test_consumption_bounds_violation() {
        let buffer = MultiRegionBuffer::new(1000.0).unwrap();
        let mut cursor = PlaybackCursor::new();
        cursor.consume(1000.0);

        let violation = ConsumptionBoundsInvariant
            .check(&view(&buffer, &cursor))
            .unwrap_err();
        assert_eq!(violation.invariant, "ConsumptionBounds");
        assert_eq!(violation.at_ms, 1234.0);
        assert!(violation.to_string().contains("buffer_fcc 1000ms"));
    }
}
