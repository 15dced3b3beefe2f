//! Integration tests for the multi-region buffer.
//!
//! These tests drive the public buffer API through download, playback, and
//! seek sequences and check the resulting regions and buffer levels.

use sabre_core::config::PlayoutConfig;
use sabre_core::{
    BufferError, DepleteOutcome, MultiRegionBuffer, PlaybackCursor, Playout, SeekEvent,
    SeekOutcome, SeekSchedule,
};

fn spans(buffer: &MultiRegionBuffer) -> Vec<(f64, f64)> {
    buffer
        .regions()
        .iter()
        .map(|region| (region.start(), region.end()))
        .collect()
}

fn chunks_of(buffer: &MultiRegionBuffer, index: usize) -> Vec<usize> {
    buffer.regions()[index].chunks().collect()
}

#[test]
fn test_seek_scenario_with_disjoint_prefetch() {
    let mut buffer = MultiRegionBuffer::new(2000.0).unwrap();
    let mut cursor = PlaybackCursor::new();

    for (index, quality) in [2, 3, 3, 4, 4].into_iter().enumerate() {
        buffer.add_chunk(index as u64, quality).unwrap();
    }
    assert_eq!(spans(&buffer), vec![(0.0, 10000.0)]);
    assert_eq!(buffer.get_buffer_level(0.0, 0.0), 10000.0);

    let outcome = buffer.seek_to(6000.0, &mut cursor);
    assert!(outcome.landed_in_region());
    assert_eq!(spans(&buffer), vec![(6000.0, 10000.0)]);
    assert_eq!(chunks_of(&buffer, 0), vec![4, 4]);
    assert_eq!(buffer.get_buffer_level(6000.0, 0.0), 4000.0);
    assert_eq!(cursor.buffer_fcc(), 0.0);

    buffer.add_chunk(10, 1).unwrap();
    assert_eq!(spans(&buffer), vec![(6000.0, 10000.0), (20000.0, 22000.0)]);
    assert_eq!(buffer.get_buffer_level(6000.0, 0.0), 4000.0);
}

#[test]
fn test_seek_preserves_future_content() {
    let mut buffer = MultiRegionBuffer::new(1000.0).unwrap();
    let mut cursor = PlaybackCursor::new();
    for index in 0..10 {
        buffer.add_chunk(index, index as usize).unwrap();
    }

    buffer.seek_to(3000.0, &mut cursor);

    assert_eq!(buffer.total_chunks(), 7);
    assert_eq!(chunks_of(&buffer, 0), vec![3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(buffer.stats().chunks_discarded, 3);
}

#[test]
fn test_seek_outside_regions_drops_only_unreachable_content() {
    let t = 1000.0;
    let mut buffer = MultiRegionBuffer::new(t).unwrap();
    let mut cursor = PlaybackCursor::new();
    for index in (0..5).chain(20..25) {
        buffer.add_chunk(index, 0).unwrap();
    }
    assert_eq!(buffer.region_count(), 2);

    // Land just before the second region so the seek misses both
    let outcome = buffer.seek_to(19.0 * t, &mut cursor);
    assert_eq!(
        outcome,
        SeekOutcome::Cleared {
            regions_dropped: 1,
            chunks_discarded: 5,
        }
    );
    assert_eq!(spans(&buffer), vec![(20.0 * t, 25.0 * t)]);

    // Seeking exactly onto the second region keeps it whole
    let outcome = buffer.seek_to(20.0 * t, &mut cursor);
    assert_eq!(outcome.chunks_discarded(), 0);
    assert_eq!(buffer.get_buffer_level(20.0 * t, 0.0), 5.0 * t);
}

#[test]
fn test_seek_onto_second_region_drops_first() {
    let t = 1000.0;
    let mut buffer = MultiRegionBuffer::new(t).unwrap();
    let mut cursor = PlaybackCursor::new();
    for index in (0..5).chain(20..25) {
        buffer.add_chunk(index, 0).unwrap();
    }

    buffer.seek_to(20.0 * t, &mut cursor);
    // The first region is left behind the cursor; a later backward seek into
    // empty space is what discards it.
    buffer.seek_to(12.0 * t, &mut cursor);
    buffer.seek_to(20.0 * t, &mut cursor);

    assert_eq!(spans(&buffer), vec![(20.0 * t, 25.0 * t)]);
}

#[test]
fn test_backward_reseek_reuses_content_left_behind() {
    let t = 1000.0;
    let mut buffer = MultiRegionBuffer::new(t).unwrap();
    let mut cursor = PlaybackCursor::new();
    for index in (0..4).chain(10..12) {
        buffer.add_chunk(index, 1).unwrap();
    }

    buffer.seek_to(10.0 * t, &mut cursor);
    buffer.seek_to(2.0 * t, &mut cursor);

    assert_eq!(buffer.get_buffer_level(cursor.position(), 0.0), 2.0 * t);
    assert_eq!(buffer.next_missing_segment(cursor.position()), 4);
}

#[test]
fn test_gap_is_never_counted_in_buffer_level() {
    let mut buffer = MultiRegionBuffer::new(1000.0).unwrap();
    for index in [0, 1, 3, 4, 5] {
        buffer.add_chunk(index, 0).unwrap();
    }

    assert_eq!(buffer.get_buffer_level(0.0, 0.0), 2000.0);
    assert_eq!(buffer.get_contiguous_chunks_from(0.0).count(), 2);
    assert_eq!(buffer.get_buffer_level(2000.0, 0.0), 0.0);
    assert_eq!(buffer.get_buffer_level(3500.0, 500.0), 2500.0);
}

#[test]
fn test_invalid_segment_is_rejected_before_mutation() {
    let mut buffer = MultiRegionBuffer::new(1000.0)
        .unwrap()
        .with_segment_count(3);
    buffer.add_chunk(2, 0).unwrap();

    let error = buffer.add_chunk(3, 0).unwrap_err();
    assert!(matches!(error, BufferError::InvalidSegmentIndex { .. }));
    assert_eq!(buffer.total_chunks(), 1);
    assert_eq!(buffer.stats().chunks_added, 1);
}

#[test]
fn test_playback_across_seek_and_refill() {
    let t = 1000.0;
    let mut buffer = MultiRegionBuffer::new(t).unwrap();
    let mut cursor = PlaybackCursor::new();
    let mut schedule = SeekSchedule::from_events([SeekEvent::new(2500.0, 8000.0)]);
    let mut playout = Playout::new(&PlayoutConfig::default());

    for index in (0..5).chain(8..10) {
        buffer.add_chunk(index, 0).unwrap();
    }

    let outcome = playout
        .deplete(&mut buffer, &mut cursor, &mut schedule, 4000.0)
        .unwrap();
    assert!(outcome.is_seek());
    assert_eq!(cursor.position(), 8.0 * t);
    assert_eq!(buffer.get_buffer_level(cursor.position(), 0.0), 2.0 * t);

    buffer.add_chunk(10, 2).unwrap();
    let outcome = playout
        .deplete(&mut buffer, &mut cursor, &mut schedule, 3.0 * t)
        .unwrap();
    assert_eq!(outcome, DepleteOutcome::Completed);
    assert_eq!(cursor.position(), 11.0 * t);
    assert_eq!(playout.metrics().rebuffer_time, 0.0);
    assert_eq!(playout.play_time(), 5500.0);
}
