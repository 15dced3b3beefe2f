//! Contiguous span of buffered, not-yet-played chunks.

use std::collections::VecDeque;

use super::{BufferError, POSITION_TOLERANCE_MS, QualityLevel};

/// One contiguous run of buffered chunks.
///
/// The region starts at a segment boundary and holds one quality level per
/// segment in playback order. The end position is always derived from the
/// chunk count, so it can never drift from the contents.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRegion {
    start: f64,
    segment_time: f64,
    chunks: VecDeque<QualityLevel>,
}

impl BufferRegion {
    /// Creates a region holding a single chunk at `start`.
    pub fn with_chunk(start: f64, segment_time: f64, quality: QualityLevel) -> Self {
        let mut chunks = VecDeque::with_capacity(8);
        chunks.push_back(quality);
        Self {
            start,
            segment_time,
            chunks,
        }
    }

    /// Position in milliseconds of the first buffered chunk.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Position in milliseconds just past the last buffered chunk.
    pub fn end(&self) -> f64 {
        self.start + self.segment_time * self.chunks.len() as f64
    }

    /// Number of buffered chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true when the region holds no chunks and must be dropped by its owner.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Quality levels in playback order.
    pub fn chunks(&self) -> impl ExactSizeIterator<Item = QualityLevel> + '_ {
        self.chunks.iter().copied()
    }

    /// Checks whether `pos` falls inside `[start, end)`.
    ///
    /// Positions within tolerance of `end` belong to whatever follows the region.
    pub fn contains(&self, pos: f64) -> bool {
        pos >= self.start - POSITION_TOLERANCE_MS && pos < self.end() - POSITION_TOLERANCE_MS
    }

    /// Number of whole chunks between the region start and `pos`.
    pub(crate) fn chunk_offset_of(&self, pos: f64) -> usize {
        let offset = ((pos - self.start + POSITION_TOLERANCE_MS) / self.segment_time).floor();
        if offset <= 0.0 {
            0
        } else {
            (offset as usize).min(self.chunks.len())
        }
    }

    /// Appends a chunk at the end of the region.
    pub fn add_chunk(&mut self, quality: QualityLevel) {
        self.chunks.push_back(quality);
    }

    /// Prepends a chunk that immediately precedes the region.
    pub fn prepend_chunk(&mut self, quality: QualityLevel) {
        self.chunks.push_front(quality);
        self.start -= self.segment_time;
    }

    /// Removes the first chunk and advances the start by one segment.
    ///
    /// # Errors
    ///
    /// - `BufferError::EmptyRegion` - The region holds no chunks
    pub fn pop_front(&mut self) -> Result<QualityLevel, BufferError> {
        let quality = self.chunks.pop_front().ok_or(BufferError::EmptyRegion {
            start: self.start,
        })?;
        self.start += self.segment_time;
        Ok(quality)
    }

    /// Drops every chunk that lies wholly before `pos`.
    ///
    /// `pos` is expected inside `[start, end)`. Returns the number of dropped chunks.
    pub fn trim_before(&mut self, pos: f64) -> usize {
        let skip = self.chunk_offset_of(pos);
        self.chunks.drain(..skip);
        self.start += self.segment_time * skip as f64;
        skip
    }

    /// Moves all chunks of `other` onto the end of this region when `other`
    /// starts exactly where this region ends.
    ///
    /// On success `other` is left empty and must be removed by the caller.
    pub fn try_merge_right(&mut self, other: &mut BufferRegion) -> bool {
        if (self.end() - other.start).abs() >= POSITION_TOLERANCE_MS {
            return false;
        }
        self.chunks.append(&mut other.chunks);
        other.start = self.end();
        true
    }

    /// Overwrites the quality of the chunk at `pos`, returning the previous value.
    pub(crate) fn replace_at(&mut self, pos: f64, quality: QualityLevel) -> Option<QualityLevel> {
        if !self.contains(pos) {
            return None;
        }
        let index = self.chunk_offset_of(pos);
        self.chunks
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 2000.0;

    fn region_of(start: f64, qualities: &[QualityLevel]) -> BufferRegion {
        let mut region = BufferRegion::with_chunk(start, T, qualities[0]);
        for &quality in &qualities[1..] {
            region.add_chunk(quality);
        }
        region
    }

    #[test]
    fn test_end_tracks_chunk_count() {
        let mut region = BufferRegion::with_chunk(4000.0, T, 1);
        assert_eq!(region.end(), 6000.0);

        region.add_chunk(2);
        region.add_chunk(3);
        assert_eq!(region.end(), 10000.0);
        assert_eq!(region.len(), 3);
    }

    #[test]
    fn test_pop_front_advances_start() {
        let mut region = region_of(0.0, &[2, 3, 4]);

        assert_eq!(region.pop_front().unwrap(), 2);
        assert_eq!(region.start(), 2000.0);
        assert_eq!(region.end(), 6000.0);
        assert_eq!(region.chunks().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_pop_front_on_empty_region_fails() {
        let mut region = BufferRegion::with_chunk(0.0, T, 1);
        region.pop_front().unwrap();
        assert!(region.is_empty());

        let result = region.pop_front();
        assert!(matches!(result, Err(BufferError::EmptyRegion { .. })));
    }

    #[test]
    fn test_prepend_moves_start_back() {
        let mut region = region_of(6000.0, &[4, 4]);
        region.prepend_chunk(3);

        assert_eq!(region.start(), 4000.0);
        assert_eq!(region.end(), 10000.0);
        assert_eq!(region.chunks().collect::<Vec<_>>(), vec![3, 4, 4]);
    }

    #[test]
    fn test_trim_before_drops_whole_chunks_only() {
        let mut region = region_of(0.0, &[0, 1, 2, 3, 4]);

        // 7000 lands inside segment 3
        let dropped = region.trim_before(7000.0);
        assert_eq!(dropped, 3);
        assert_eq!(region.start(), 6000.0);
        assert_eq!(region.chunks().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_trim_before_absorbs_float_error() {
        let mut region = region_of(0.0, &[0, 1, 2]);
        let dropped = region.trim_before(3.0 * T - 0.0001);
        assert_eq!(dropped, 3);
        assert!(region.is_empty());
    }

    #[test]
    fn test_contains_is_half_open() {
        let region = region_of(2000.0, &[1, 1]);
        assert!(!region.contains(1999.0));
        assert!(region.contains(2000.0));
        assert!(region.contains(5999.0));
        assert!(!region.contains(6000.0));
        assert!(!region.contains(6000.0 - POSITION_TOLERANCE_MS / 2.0));
    }

    #[test]
    fn test_merge_right_when_adjacent() {
        let mut left = region_of(0.0, &[1, 2]);
        let mut right = region_of(4000.0, &[3]);

        assert!(left.try_merge_right(&mut right));
        assert!(right.is_empty());
        assert_eq!(left.end(), 6000.0);
        assert_eq!(left.chunks().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_right_refuses_gap() {
        let mut left = region_of(0.0, &[1, 2]);
        let mut right = region_of(6000.0, &[3]);

        assert!(!left.try_merge_right(&mut right));
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 1);
        assert_eq!(right.start(), 6000.0);
    }

    #[test]
    fn test_replace_at_returns_previous_quality() {
        let mut region = region_of(0.0, &[1, 1, 1]);
        assert_eq!(region.replace_at(2500.0, 4), Some(1));
        assert_eq!(region.chunks().collect::<Vec<_>>(), vec![1, 4, 1]);
        assert_eq!(region.replace_at(6000.0, 4), None);
    }
}
