//! Segment ranges covered by lanes, prefab lines and terrain intervals.
//!
//! Spans are stored as segment indices plus a fraction within each boundary
//! segment. Every structural edit of a curve (insert, remove, split) runs
//! the matching fix-up here so that afterwards
//! `0 <= start_index <= end_index <= point_count - 2` holds.

use serde::{Deserialize, Serialize};

const OFFSET_EPSILON: f32 = 1e-5;

fn default_end_offset() -> f32 {
    1.0
}

/// A `[start_index, end_index]` segment range with fractional ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSpan {
    pub start_index: usize,
    pub end_index: usize,
    /// Fraction of segment `start_index` where the span begins
    #[serde(default)]
    pub start_offset: f32,
    /// Fraction of segment `end_index` where the span ends
    #[serde(default = "default_end_offset")]
    pub end_offset: f32,
}

/// Outcome of partitioning a span across a curve split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitSide {
    /// Stays with the original (head) curve
    First(IndexSpan),
    /// Moves to the new (tail) curve, rebased to its indices
    Second(IndexSpan),
    /// Crosses the split point and is cut in two
    Both(IndexSpan, IndexSpan),
}

impl Default for IndexSpan {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl IndexSpan {
    /// Whole segments `start..=end`.
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
            start_offset: 0.0,
            end_offset: 1.0,
        }
    }

    /// Span covering every segment of a curve with `point_count` points.
    pub fn full(point_count: usize) -> Self {
        Self::new(0, point_count.saturating_sub(2))
    }

    pub fn with_offsets(mut self, start_offset: f32, end_offset: f32) -> Self {
        self.start_offset = start_offset;
        self.end_offset = end_offset;
        self
    }

    /// Start as a continuous segment position (`segment + fraction`).
    pub fn start_position(&self) -> f32 {
        self.start_index as f32 + self.start_offset
    }

    /// End as a continuous segment position (`segment + fraction`).
    pub fn end_position(&self) -> f32 {
        self.end_index as f32 + self.end_offset
    }

    /// Whether a continuous segment position lies within the span.
    pub fn contains(&self, position: f32) -> bool {
        position >= self.start_position() - OFFSET_EPSILON
            && position <= self.end_position() + OFFSET_EPSILON
    }

    /// Fractional boundaries a resampler must hit exactly, as
    /// `(segment, fraction)` pairs.
    pub fn seams(&self) -> [(usize, f32); 2] {
        [
            (self.start_index, self.start_offset),
            (self.end_index, self.end_offset),
        ]
    }

    /// Whether the span is well formed for a curve with `point_count` points.
    pub fn is_valid(&self, point_count: usize) -> bool {
        point_count >= 2
            && self.start_index <= self.end_index
            && self.end_index <= point_count - 2
            && (0.0..=1.0).contains(&self.start_offset)
            && (0.0..=1.0).contains(&self.end_offset)
            && self.start_position() <= self.end_position()
    }

    /// Force the span into range for a curve with `point_count` points.
    pub fn clamp_to(&mut self, point_count: usize) {
        let max_segment = point_count.saturating_sub(2);
        self.start_offset = sanitize_offset(self.start_offset, 0.0);
        self.end_offset = sanitize_offset(self.end_offset, 1.0);
        if self.end_index > max_segment {
            self.end_index = max_segment;
            self.end_offset = 1.0;
        }
        if self.start_index > max_segment {
            self.start_index = max_segment;
        }
        if self.start_index > self.end_index {
            self.start_index = self.end_index;
        }
        if self.start_index == self.end_index && self.start_offset > self.end_offset {
            self.start_offset = self.end_offset;
        }
    }

    /// Fix-up after a point was inserted into `segment` at parameter `t`.
    ///
    /// The new point gets index `segment + 1`. Indices after the split
    /// segment shift up by one; a boundary inside the split segment moves to
    /// whichever half contains it, with its fraction rescaled to that half.
    pub fn on_insert(&mut self, segment: usize, t: f32) {
        let t = t.clamp(OFFSET_EPSILON, 1.0 - OFFSET_EPSILON);

        if self.start_index > segment {
            self.start_index += 1;
        } else if self.start_index == segment {
            if self.start_offset >= t {
                self.start_index += 1;
                self.start_offset = (self.start_offset - t) / (1.0 - t);
            } else {
                self.start_offset /= t;
            }
        }

        if self.end_index > segment {
            self.end_index += 1;
        } else if self.end_index == segment {
            if self.end_offset > t {
                self.end_index += 1;
                self.end_offset = (self.end_offset - t) / (1.0 - t);
            } else {
                self.end_offset /= t;
            }
        }
    }

    /// Fix-up after the point at `point_index` was removed, leaving
    /// `point_count` points.
    ///
    /// Segments after the removed point shift down by one; the result is
    /// clamped so spans near the ends degrade instead of becoming invalid.
    pub fn on_remove(&mut self, point_index: usize, point_count: usize) {
        if self.start_index >= point_index {
            self.start_index = self.start_index.saturating_sub(1);
        }
        if self.end_index >= point_index {
            self.end_index = self.end_index.saturating_sub(1);
        }
        self.clamp_to(point_count);
    }

    /// Partition across a split at interior point `split_point`.
    ///
    /// The head curve keeps points `0..=split_point`, the tail curve starts
    /// with a copy of `split_point`. A span reaching no further than the
    /// split point's outgoing segment stays with the head and is clamped to
    /// end at the split point; a span starting at or after it moves to the
    /// tail; anything else is cut in two.
    pub fn partition_for_split(&self, split_point: usize) -> SplitSide {
        let k = split_point;
        if self.start_index >= k {
            let mut second = *self;
            second.start_index -= k;
            second.end_index -= k;
            return SplitSide::Second(second);
        }
        if self.end_index <= k {
            let mut first = *self;
            if first.end_index == k {
                first.end_index = k - 1;
                first.end_offset = 1.0;
            }
            return SplitSide::First(first);
        }
        let first = IndexSpan {
            start_index: self.start_index,
            end_index: k - 1,
            start_offset: self.start_offset,
            end_offset: 1.0,
        };
        let second = IndexSpan {
            start_index: 0,
            end_index: self.end_index - k,
            start_offset: 0.0,
            end_offset: self.end_offset,
        };
        SplitSide::Both(first, second)
    }
}

fn sanitize_offset(offset: f32, fallback: f32) -> f32 {
    if offset.is_finite() {
        offset.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_span_ending_at_split_with_head() {
        let span = IndexSpan::new(0, 1);
        match span.partition_for_split(1) {
            SplitSide::First(first) => {
                assert_eq!(first.start_index, 0);
                assert_eq!(first.end_index, 0);
                assert_eq!(first.start_offset, 0.0);
                assert_eq!(first.end_offset, 1.0);
                assert!(first.is_valid(2));
            }
            other => panic!("expected head-only span, got {:?}", other),
        }
    }

    #[test]
    fn test_split_moves_tail_span_and_rebases() {
        let span = IndexSpan::new(1, 1).with_offsets(0.25, 0.75);
        assert_eq!(
            span.partition_for_split(1),
            SplitSide::Second(IndexSpan::new(0, 0).with_offsets(0.25, 0.75))
        );
    }

    #[test]
    fn test_split_cuts_crossing_span() {
        let span = IndexSpan::new(0, 3).with_offsets(0.5, 0.5);
        match span.partition_for_split(2) {
            SplitSide::Both(first, second) => {
                assert_eq!((first.start_index, first.end_index), (0, 1));
                assert_eq!(first.start_offset, 0.5);
                assert_eq!(first.end_offset, 1.0);
                assert_eq!((second.start_index, second.end_index), (0, 1));
                assert_eq!(second.start_offset, 0.0);
                assert_eq!(second.end_offset, 0.5);
                assert!(first.is_valid(3));
                assert!(second.is_valid(3));
            }
            other => panic!("expected cut span, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_shifts_later_segments() {
        let mut span = IndexSpan::new(2, 3);
        span.on_insert(1, 0.5);
        assert_eq!((span.start_index, span.end_index), (3, 4));
    }

    #[test]
    fn test_insert_rescales_boundary_in_split_segment() {
        let mut span = IndexSpan::new(1, 1).with_offsets(0.25, 0.75);
        span.on_insert(1, 0.5);
        assert_eq!(span.start_index, 1);
        assert!((span.start_offset - 0.5).abs() < 1e-6);
        assert_eq!(span.end_index, 2);
        assert!((span.end_offset - 0.5).abs() < 1e-6);
        assert!(span.is_valid(4));
    }

    #[test]
    fn test_insert_keeps_whole_segment_coverage() {
        let mut span = IndexSpan::new(0, 0);
        span.on_insert(0, 0.3);
        assert_eq!((span.start_index, span.end_index), (0, 1));
        assert_eq!(span.start_offset, 0.0);
        assert!((span.end_offset - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_remove_shifts_and_clamps() {
        // 4 points -> 3 points after removing index 3
        let mut span = IndexSpan::new(1, 2);
        span.on_remove(3, 3);
        assert!(span.is_valid(3));
        assert_eq!(span.end_index, 1);

        // removing the first point drags everything down
        let mut span = IndexSpan::new(0, 2);
        span.on_remove(0, 3);
        assert_eq!((span.start_index, span.end_index), (0, 1));
        assert!(span.is_valid(3));
    }

    #[test]
    fn test_every_edit_preserves_invariant() {
        let spans = [
            IndexSpan::new(0, 0),
            IndexSpan::new(0, 4).with_offsets(0.2, 0.9),
            IndexSpan::new(2, 2).with_offsets(0.5, 0.5),
            IndexSpan::new(4, 4).with_offsets(0.0, 0.1),
        ];
        for span in spans {
            for point in 0..6 {
                let mut removed = span;
                removed.on_remove(point, 5);
                assert!(removed.is_valid(5), "{:?} remove {}", span, point);
            }
            for segment in 0..5 {
                let mut inserted = span;
                inserted.on_insert(segment, 0.4);
                assert!(inserted.is_valid(7), "{:?} insert {}", span, segment);
            }
            for split in 1..5 {
                match span.partition_for_split(split) {
                    SplitSide::First(a) => assert!(a.is_valid(split + 1)),
                    SplitSide::Second(b) => assert!(b.is_valid(6 - split)),
                    SplitSide::Both(a, b) => {
                        assert!(a.is_valid(split + 1));
                        assert!(b.is_valid(6 - split));
                    }
                }
            }
        }
    }

    #[test]
    fn test_clamp_repairs_out_of_range() {
        let mut span = IndexSpan::new(7, 9).with_offsets(f32::NAN, 2.0);
        span.clamp_to(3);
        assert!(span.is_valid(3));
    }
}
