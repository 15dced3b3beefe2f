//! Reference models and assertions shared by tests across the workspace.

use std::collections::VecDeque;

use crate::buffer::{MultiRegionBuffer, POSITION_TOLERANCE_MS, QualityLevel};

/// Plain queue of downloaded segments, the single-region special case.
///
/// Every sequential session must report the same buffer level from this
/// queue and from `MultiRegionBuffer`.
#[derive(Debug, Clone)]
pub struct QueueBuffer {
    segment_time: f64,
    contents: VecDeque<QualityLevel>,
}

impl QueueBuffer {
    pub fn new(segment_time: f64) -> Self {
        Self {
            segment_time,
            contents: VecDeque::new(),
        }
    }

    pub fn push(&mut self, quality: QualityLevel) {
        self.contents.push_back(quality);
    }

    pub fn pop(&mut self) -> Option<QualityLevel> {
        self.contents.pop_front()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn buffer_level(&self, buffer_fcc: f64) -> f64 {
        self.segment_time * self.contents.len() as f64 - buffer_fcc
    }

    pub fn contents(&self) -> impl Iterator<Item = QualityLevel> + '_ {
        self.contents.iter().copied()
    }
}

/// Describes the first broken structural invariant of `buffer`, if any.
pub fn settled_violation(buffer: &MultiRegionBuffer) -> Option<String> {
    let regions = buffer.regions();
    if let Some(region) = regions.iter().find(|region| region.is_empty()) {
        return Some(format!("empty region at {}ms", region.start()));
    }
    for pair in regions.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        if left.end() > right.start() + POSITION_TOLERANCE_MS {
            return Some(format!(
                "regions {}-{}ms and {}-{}ms overlap",
                left.start(),
                left.end(),
                right.start(),
                right.end()
            ));
        }
        if (left.end() - right.start()).abs() < POSITION_TOLERANCE_MS {
            return Some(format!(
                "regions {}-{}ms and {}-{}ms are adjacent but unmerged",
                left.start(),
                left.end(),
                right.start(),
                right.end()
            ));
        }
    }
    None
}

/// Panics with a description when `buffer` is not settled.
///
/// # Panics
///
/// Panics if any region is empty, overlaps its neighbour, or touches it.
pub fn assert_settled(buffer: &MultiRegionBuffer) {
    if let Some(violation) = settled_violation(buffer) {
        panic!("buffer not settled: {violation}");
    }
}
