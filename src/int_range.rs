use std::fmt;

/// Largest distance setting accepted for epsilon, buffer and join distances
///
/// Keeps range widening and distance sums far from integer overflow.
pub const MAX_DISTANCE: i64 = 1_000_000_000;

/// A simple type for closed integer ranges
///
/// All ranges follow the GFF range convention: 1-indexed, fully closed, [start,stop]. This matches
/// the read tip coordinates, which are single positions that must be reported as both the start
/// and the stop of a one-base range.
///
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct IntRange {
    pub start: i64,
    pub stop: i64,
}

impl IntRange {
    pub fn from_pair(start: i64, stop: i64) -> Self {
        assert!(start <= stop, "Invalid range [{start},{stop}]");
        Self { start, stop }
    }

    /// Return a copy of the range widened by `size` on both sides
    pub fn expanded_by(&self, size: i64) -> Self {
        Self {
            start: self.start.saturating_sub(size),
            stop: self.stop.saturating_add(size),
        }
    }

    pub fn merge(&mut self, other: &IntRange) {
        self.start = std::cmp::min(self.start, other.start);
        self.stop = std::cmp::max(self.stop, other.stop);
    }
}

impl fmt::Debug for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.stop)
    }
}

/// Get the distance between 2 ranges
///
/// The notion of 'distance' here is the separation of the nearest edges:
///
///    [---------]            [-----------]
///        R1    |------------|    R2
///                R1/R2 dist
///
/// The distance is 0 if the ranges intersect. Adjacent ranges such as [1,4] and [5,8] have a
/// distance of 1.
///
pub fn get_int_range_distance(ir1: &IntRange, ir2: &IntRange) -> i64 {
    use std::cmp::max;
    max(max(ir2.start - ir1.stop, ir1.start - ir2.stop), 0)
}
