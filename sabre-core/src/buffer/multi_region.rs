//! Ordered set of buffer regions with seek-aware insertion and consumption

use tracing::{debug, info, trace, warn};

use super::{BufferError, BufferRegion, BufferStats, POSITION_TOLERANCE_MS, QualityLevel};
use crate::config::BufferConfig;
use crate::playback::{PlaybackCursor, segment_index_at};

/// Result of applying a seek to the buffer
#[derive(Debug, Clone, PartialEq)]
pub enum SeekOutcome {
    /// Target landed inside a region and the chunks before it were dropped
    Trimmed {
        region_start: f64,
        chunks_discarded: usize,
        buffer_fcc: f64,
    },
    /// Target missed every region and regions behind it were dropped
    Cleared {
        regions_dropped: usize,
        chunks_discarded: usize,
    },
}

impl SeekOutcome {
    /// Total chunks thrown away by the seek.
    pub fn chunks_discarded(&self) -> usize {
        match self {
            SeekOutcome::Trimmed {
                chunks_discarded, ..
            }
            | SeekOutcome::Cleared {
                chunks_discarded, ..
            } => *chunks_discarded,
        }
    }

    /// Whether playback can resume from buffered content immediately.
    pub fn landed_in_region(&self) -> bool {
        matches!(self, SeekOutcome::Trimmed { .. })
    }
}

/// Playback buffer made of non-overlapping, non-adjacent regions.
///
/// Regions are kept sorted by start position so lookups are a binary search
/// followed by a bounds check. Every public mutation leaves the buffer
/// settled: no empty regions, no overlaps, and no two regions touching.
#[derive(Debug, Clone)]
pub struct MultiRegionBuffer {
    segment_time: f64,
    segment_count: Option<u64>,
    regions: Vec<BufferRegion>,
    stats: BufferStats,
}

impl MultiRegionBuffer {
    /// Creates an empty buffer for segments of `segment_time` milliseconds.
    ///
    /// # Errors
    ///
    /// - `BufferError::InvalidSegmentTime` - Segment time is not positive and finite
    pub fn new(segment_time: f64) -> Result<Self, BufferError> {
        if !segment_time.is_finite() || segment_time <= 0.0 {
            return Err(BufferError::InvalidSegmentTime { segment_time });
        }
        Ok(Self {
            segment_time,
            segment_count: None,
            regions: Vec::new(),
            stats: BufferStats::new(),
        })
    }

    /// Creates a buffer from configuration.
    ///
    /// # Errors
    ///
    /// - `BufferError::InvalidSegmentTime` - Configured segment time is not positive and finite
    pub fn from_config(config: &BufferConfig) -> Result<Self, BufferError> {
        let buffer = Self::new(config.segment_time_ms)?;
        Ok(match config.segment_count {
            Some(count) => buffer.with_segment_count(count),
            None => buffer,
        })
    }

    /// Bounds accepted segment indices to the manifest length.
    pub fn with_segment_count(mut self, segment_count: u64) -> Self {
        self.segment_count = Some(segment_count);
        self
    }

    pub fn segment_time(&self) -> f64 {
        self.segment_time
    }

    pub fn segment_count(&self) -> Option<u64> {
        self.segment_count
    }

    /// Regions in ascending start order.
    pub fn regions(&self) -> &[BufferRegion] {
        &self.regions
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Chunks held across all regions, reachable or not.
    pub fn total_chunks(&self) -> usize {
        self.regions.iter().map(BufferRegion::len).sum()
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Returns the region whose `[start, end)` span contains `pos`.
    pub fn find_region_containing(&self, pos: f64) -> Option<&BufferRegion> {
        self.region_index_containing(pos)
            .map(|index| &self.regions[index])
    }

    fn region_index_containing(&self, pos: f64) -> Option<usize> {
        let after = self
            .regions
            .partition_point(|region| region.start() <= pos + POSITION_TOLERANCE_MS);
        let candidate = after.checked_sub(1)?;
        self.regions[candidate].contains(pos).then_some(candidate)
    }

    fn validate_segment_index(&self, segment_index: u64) -> Result<(), BufferError> {
        match self.segment_count {
            Some(segment_count) if segment_index >= segment_count => {
                Err(BufferError::InvalidSegmentIndex {
                    segment_index,
                    segment_count,
                })
            }
            _ => Ok(()),
        }
    }

    /// Inserts a downloaded chunk for `segment_index`.
    ///
    /// Extends a region that ends at the chunk, prepends to a region that
    /// starts right after it, or opens a new region. Coalescing runs
    /// afterwards since the chunk may close the gap between two regions.
    ///
    /// # Errors
    ///
    /// - `BufferError::InvalidSegmentIndex` - Index lies outside the manifest
    /// - `BufferError::SegmentAlreadyBuffered` - A region already holds this segment
    pub fn add_chunk(
        &mut self,
        segment_index: u64,
        quality: QualityLevel,
    ) -> Result<(), BufferError> {
        self.validate_segment_index(segment_index)?;
        let pos = segment_index as f64 * self.segment_time;
        if self.region_index_containing(pos).is_some() {
            return Err(BufferError::SegmentAlreadyBuffered { segment_index });
        }

        let insert_at = self.regions.partition_point(|region| region.start() < pos);
        let ends_here = insert_at
            .checked_sub(1)
            .filter(|&left| (self.regions[left].end() - pos).abs() < POSITION_TOLERANCE_MS);
        let starts_next = (insert_at < self.regions.len()
            && (self.regions[insert_at].start() - (pos + self.segment_time)).abs()
                < POSITION_TOLERANCE_MS)
            .then_some(insert_at);

        let created = match (ends_here, starts_next) {
            (Some(left), _) => {
                let region = &mut self.regions[left];
                region.add_chunk(quality);
                trace!(
                    "Extended region to {}-{}ms with segment {}",
                    region.start(),
                    region.end(),
                    segment_index
                );
                false
            }
            (None, Some(right)) => {
                let region = &mut self.regions[right];
                region.prepend_chunk(quality);
                trace!(
                    "Prepended segment {} to region {}-{}ms",
                    segment_index,
                    region.start(),
                    region.end()
                );
                false
            }
            (None, None) => {
                self.regions.insert(
                    insert_at,
                    BufferRegion::with_chunk(pos, self.segment_time, quality),
                );
                debug!(
                    "Started new region at {}ms for segment {}",
                    pos, segment_index
                );
                true
            }
        };

        self.stats.record_chunk_added(created);
        self.stats.record_region_count(self.regions.len());
        self.merge_adjacent_regions();
        Ok(())
    }

    /// Overwrites the quality of an already-buffered segment.
    ///
    /// Returns the quality that was replaced.
    ///
    /// # Errors
    ///
    /// - `BufferError::InvalidSegmentIndex` - Index lies outside the manifest
    /// - `BufferError::SegmentNotBuffered` - No region holds this segment
    pub fn replace_chunk(
        &mut self,
        segment_index: u64,
        quality: QualityLevel,
    ) -> Result<QualityLevel, BufferError> {
        self.validate_segment_index(segment_index)?;
        let pos = segment_index as f64 * self.segment_time;
        let previous = self
            .region_index_containing(pos)
            .and_then(|index| self.regions[index].replace_at(pos, quality))
            .ok_or(BufferError::SegmentNotBuffered { segment_index })?;

        self.stats.chunks_replaced += 1;
        debug!(
            "Replaced segment {} quality {} -> {}",
            segment_index, previous, quality
        );
        Ok(previous)
    }

    /// Removes and returns the chunk played at `pos`.
    ///
    /// Returns `Ok(None)` when nothing is buffered at `pos`, which the caller
    /// accounts as a stall. Chunks sharing the region but lying behind `pos`
    /// can never be played and are discarded first.
    ///
    /// # Errors
    ///
    /// - `BufferError::EmptyRegion` - A region was left empty, which breaks the settled invariant
    pub fn pop_chunk_at(&mut self, pos: f64) -> Result<Option<QualityLevel>, BufferError> {
        let Some(index) = self.region_index_containing(pos) else {
            self.stats.stalls += 1;
            debug!("No playable chunk at {}ms", pos);
            return Ok(None);
        };

        let region = &mut self.regions[index];
        let behind = region.trim_before(pos);
        if behind > 0 {
            self.stats.chunks_discarded += behind as u64;
            debug!("Discarded {} chunks behind playback at {}ms", behind, pos);
        }

        let quality = region.pop_front()?;
        self.stats.chunks_consumed += 1;
        if region.is_empty() {
            self.regions.remove(index);
            trace!("Region at {}ms fully consumed", pos);
        }
        Ok(Some(quality))
    }

    /// Quality levels of every chunk from the one at `pos` to the end of its region.
    ///
    /// Never crosses a gap into another region, so content beyond a hole in
    /// the buffer is not reported as playable.
    pub fn get_contiguous_chunks_from(
        &self,
        pos: f64,
    ) -> impl Iterator<Item = QualityLevel> + '_ {
        self.find_region_containing(pos)
            .into_iter()
            .flat_map(move |region| {
                let skip = region.chunk_offset_of(pos);
                region.chunks().skip(skip)
            })
    }

    /// Milliseconds of contiguous playable content from the cursor onwards.
    ///
    /// Zero when nothing is buffered at `pos`.
    pub fn get_buffer_level(&self, pos: f64, buffer_fcc: f64) -> f64 {
        let chunks = self.get_contiguous_chunks_from(pos).count();
        (self.segment_time * chunks as f64 - buffer_fcc).max(0.0)
    }

    /// Quality of the chunk that would play next at `pos`.
    pub fn chunk_at(&self, pos: f64) -> Option<QualityLevel> {
        self.get_contiguous_chunks_from(pos).next()
    }

    /// First segment at or after `pos` that is not buffered contiguously from `pos`.
    ///
    /// After a seek into prefetched content this skips straight past it.
    pub fn next_missing_segment(&self, pos: f64) -> u64 {
        match self.find_region_containing(pos) {
            Some(region) => segment_index_at(region.end(), self.segment_time),
            None => segment_index_at(pos, self.segment_time),
        }
    }

    /// Moves playback to `target_pos`, keeping every region still reachable.
    ///
    /// A target inside a region trims only the chunks before it and records
    /// the offset into the landing segment as `buffer_fcc`. A target in empty
    /// space drops regions that end at or before it and keeps the ones ahead.
    /// Negative and non-finite targets seek to the start of the media.
    pub fn seek_to(&mut self, target_pos: f64, cursor: &mut PlaybackCursor) -> SeekOutcome {
        self.stats.seeks += 1;
        let target_pos = if target_pos.is_finite() {
            target_pos.max(0.0)
        } else {
            warn!("Non-finite seek target {}, seeking to 0ms", target_pos);
            0.0
        };

        let outcome = match self.region_index_containing(target_pos) {
            Some(index) => {
                let region = &mut self.regions[index];
                let chunks_discarded = region.trim_before(target_pos);
                let region_start = region.start();
                let offset = target_pos - region_start;
                let buffer_fcc = if offset < POSITION_TOLERANCE_MS {
                    0.0
                } else {
                    offset
                };
                cursor.jump_to(target_pos, buffer_fcc);
                SeekOutcome::Trimmed {
                    region_start,
                    chunks_discarded,
                    buffer_fcc,
                }
            }
            None => {
                let before = self.regions.len();
                let mut chunks_discarded = 0;
                self.regions.retain(|region| {
                    let reachable = region.end() > target_pos + POSITION_TOLERANCE_MS;
                    if !reachable {
                        chunks_discarded += region.len();
                    }
                    reachable
                });
                cursor.jump_to(target_pos, 0.0);
                SeekOutcome::Cleared {
                    regions_dropped: before - self.regions.len(),
                    chunks_discarded,
                }
            }
        };

        self.stats.chunks_discarded += outcome.chunks_discarded() as u64;
        self.merge_adjacent_regions();
        info!(
            "Seek to {}ms: {:?}, {} regions remain",
            target_pos,
            outcome,
            self.regions.len()
        );
        outcome
    }

    /// Coalesces touching regions until no pair satisfies `left.end == right.start`.
    ///
    /// Returns the number of merges performed.
    pub fn merge_adjacent_regions(&mut self) -> usize {
        let mut total = 0;
        loop {
            let merged = self.merge_pass();
            if merged == 0 {
                break;
            }
            total += merged;
        }

        if total > 0 {
            self.stats.regions_merged += total as u64;
            debug!(
                "Merged {} adjacent regions, {} remain",
                total,
                self.regions.len()
            );
        }
        total
    }

    fn merge_pass(&mut self) -> usize {
        let mut merged = 0;
        let mut index = 0;
        while index + 1 < self.regions.len() {
            let (left, right) = self.regions.split_at_mut(index + 1);
            if left[index].try_merge_right(&mut right[0]) {
                self.regions.remove(index + 1);
                merged += 1;
            } else {
                index += 1;
            }
        }
        merged
    }
}
