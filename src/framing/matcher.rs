//! Approximate search for the sync marker.
//!
//! Uses Sellers' algorithm (edit distance against any substring of the
//! stream) with start-offset tracking, so a marker with a few flipped,
//! dropped, or doubled bytes is still found at the right place.

use std::cmp::Reverse;

/// A located marker: `stream[start..end]` is within `distance` edits of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMatch {
    /// First byte of the marker.
    pub start: usize,
    /// One past the last byte of the marker.
    pub end: usize,
    /// Levenshtein distance to the pattern.
    pub distance: usize,
}

/// DP cell: edit cost and the stream offset the alignment started at.
#[derive(Debug, Clone, Copy)]
struct Cell {
    cost: usize,
    start: usize,
}

/// Find the earliest occurrence of `pattern` in `stream` within `max_edits`.
///
/// Overlapping candidates are grouped; the earliest group wins, and within
/// it the candidate with the lowest distance (then earliest start, then
/// longest span) is returned.
pub fn find_sync(stream: &[u8], pattern: &[u8], max_edits: usize) -> Option<SyncMatch> {
    let candidates = find_candidates(stream, pattern, max_edits);
    best_of_first_group(candidates)
}

/// Every (start, end) alignment whose distance is within `max_edits`, one per end offset.
fn find_candidates(stream: &[u8], pattern: &[u8], max_edits: usize) -> Vec<SyncMatch> {
    let m = pattern.len();
    if m == 0 {
        return Vec::new();
    }

    // Column for the empty stream prefix: pattern[..i] costs i deletions.
    let mut prev: Vec<Cell> = (0..=m).map(|i| Cell { cost: i, start: 0 }).collect();
    let mut cur = prev.clone();
    let mut candidates = Vec::new();

    for (j, &byte) in stream.iter().enumerate() {
        let end = j + 1;
        // A match may begin anywhere: the empty pattern prefix is free.
        cur[0] = Cell { cost: 0, start: end };

        for i in 1..=m {
            let diag = Cell {
                cost: prev[i - 1].cost + usize::from(pattern[i - 1] != byte),
                start: prev[i - 1].start,
            };
            let inserted = Cell {
                cost: prev[i].cost + 1,
                start: prev[i].start,
            };
            let deleted = Cell {
                cost: cur[i - 1].cost + 1,
                start: cur[i - 1].start,
            };

            let mut best = diag;
            for option in [inserted, deleted] {
                if (option.cost, option.start) < (best.cost, best.start) {
                    best = option;
                }
            }
            cur[i] = best;
        }

        if cur[m].cost <= max_edits {
            candidates.push(SyncMatch {
                start: cur[m].start,
                end,
                distance: cur[m].cost,
            });
        }

        std::mem::swap(&mut prev, &mut cur);
    }

    candidates
}

fn best_of_first_group(mut candidates: Vec<SyncMatch>) -> Option<SyncMatch> {
    candidates.sort_by_key(|c| (c.start, c.end));

    let first = *candidates.first()?;
    let mut group_end = first.end;
    let mut best = first;

    for candidate in candidates.into_iter().skip(1) {
        if candidate.start >= group_end {
            break;
        }
        group_end = group_end.max(candidate.end);
        let key = |c: &SyncMatch| (c.distance, c.start, Reverse(c.end));
        if key(&candidate) < key(&best) {
            best = candidate;
        }
    }

    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{SYNC_MAX_EDITS, SYNC_PATTERN};

    fn stream_with_marker(prefix: &[u8], marker: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut stream = prefix.to_vec();
        stream.extend_from_slice(marker);
        stream.extend_from_slice(suffix);
        stream
    }

    #[test]
    fn test_exact_match() {
        let stream = stream_with_marker(&[1, 2, 3, 4], &SYNC_PATTERN, &[9, 9, 9, 9]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(
            found,
            SyncMatch {
                start: 4,
                end: 12,
                distance: 0,
            }
        );
    }

    #[test]
    fn test_marker_at_offset_zero() {
        let stream = stream_with_marker(&[], &SYNC_PATTERN, &[0x11]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(found.start, 0);
        assert_eq!(found.end, 8);
    }

    #[test]
    fn test_no_marker() {
        let stream = vec![0x22u8; 64];
        assert_eq!(find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS), None);
    }

    #[test]
    fn test_two_substitutions() {
        let mut marker = SYNC_PATTERN;
        marker[2] = 0xFF;
        marker[6] = 0x00;
        let stream = stream_with_marker(&[5, 6, 7], &marker, &[1, 1, 1, 1]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(
            found,
            SyncMatch {
                start: 3,
                end: 11,
                distance: 2,
            }
        );
    }

    #[test]
    fn test_corrupted_first_byte_keeps_boundary() {
        let mut marker = SYNC_PATTERN;
        marker[0] = 0x00;
        let stream = stream_with_marker(&[5, 6, 7], &marker, &[1, 1, 1, 1]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!((found.start, found.end), (3, 11));
    }

    #[test]
    fn test_corrupted_last_byte_keeps_boundary() {
        let mut marker = SYNC_PATTERN;
        marker[7] = 0x00;
        let stream = stream_with_marker(&[5, 6, 7], &marker, &[1, 1, 1, 1]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!((found.start, found.end), (3, 11));
    }

    #[test]
    fn test_dropped_byte() {
        // "abcefgh": 'd' lost on the line
        let marker = [97, 98, 99, 101, 102, 103, 104];
        let stream = stream_with_marker(&[5, 6], &marker, &[1, 1, 1, 1]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(
            found,
            SyncMatch {
                start: 2,
                end: 9,
                distance: 1,
            }
        );
    }

    #[test]
    fn test_inserted_byte() {
        // "abcdXefgh": noise byte doubled into the marker
        let marker = [97, 98, 99, 100, 0x00, 101, 102, 103, 104];
        let stream = stream_with_marker(&[5, 6], &marker, &[1, 1, 1, 1]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(
            found,
            SyncMatch {
                start: 2,
                end: 11,
                distance: 1,
            }
        );
    }

    #[test]
    fn test_three_edits_may_miss() {
        let mut marker = SYNC_PATTERN;
        marker[1] = 0x00;
        marker[4] = 0x00;
        marker[6] = 0x00;
        let stream = stream_with_marker(&[5, 6, 7], &marker, &[1, 1, 1, 1]);

        assert_eq!(find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS), None);
    }

    #[test]
    fn test_earliest_marker_wins() {
        let mut stream = stream_with_marker(&[1, 2], &SYNC_PATTERN, &[3, 4, 5]);
        let mut noisy = SYNC_PATTERN;
        noisy[3] = 0;
        stream.extend_from_slice(&noisy);

        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();
        assert_eq!(found.start, 2);
    }

    #[test]
    fn test_earlier_noisy_marker_beats_later_exact_one() {
        let mut noisy = SYNC_PATTERN;
        noisy[3] = 0;
        let mut stream = stream_with_marker(&[1, 2], &noisy, &[3, 4, 5]);
        stream.extend_from_slice(&SYNC_PATTERN);

        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();
        assert_eq!((found.start, found.distance), (2, 1));
    }

    #[test]
    fn test_partial_marker_at_tail() {
        // Marker still streaming in: six of eight bytes so far.
        let stream = stream_with_marker(&[1, 2, 3], &SYNC_PATTERN[..6], &[]);
        let found = find_sync(&stream, &SYNC_PATTERN, SYNC_MAX_EDITS).unwrap();

        assert_eq!(
            found,
            SyncMatch {
                start: 3,
                end: 9,
                distance: 2,
            }
        );
    }
}
