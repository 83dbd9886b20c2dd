//! Closed integer intervals.

use std::cmp::Ordering;
use std::fmt;

use crate::genepop::{GenepopError, Result};

/// A closed integer interval `[min, max]`.
///
/// Used for cycle and ordinal filters ("only 4-10 and 18-21"), so both
/// endpoints are inclusive and may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    min: i64,
    max: i64,
}

impl Interval {
    /// Create a new interval, rejecting `min > max`.
    #[inline]
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(GenepopError::InvalidParameter(format!(
                "interval min ({}) is greater than max ({})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// A one-value interval `[value, value]`.
    #[inline]
    pub fn point(value: i64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    #[inline]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of integers covered.
    #[inline]
    pub fn len(&self) -> u64 {
        self.max.abs_diff(self.min) + 1
    }

    /// Always false; a closed interval holds at least one value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check if `value` lies in `[min, max]`, endpoints included.
    #[inline]
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if this interval lies entirely inside `other`.
    #[inline]
    pub fn is_within(&self, other: &Interval) -> bool {
        self.min >= other.min && self.max <= other.max
    }

    /// Check if the two intervals share at least one value.
    ///
    /// Either endpoint of one inside the other, tested from both sides so
    /// that full enclosure is caught.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.contains(other.min)
            || self.contains(other.max)
            || other.contains(self.min)
            || other.contains(self.max)
    }

    /// Merge this interval with another, returning the union.
    ///
    /// Returns `None` unless the two share a value. Integer-adjacent
    /// intervals such as `[1,2]` and `[3,3]` stay separate.
    #[inline]
    pub fn merge(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Interval {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}~{}", self.min, self.max)
        }
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.min.cmp(&other.min).then(self.max.cmp(&other.max))
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
