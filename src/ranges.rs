//! Merged interval collections and range-string parsing.
//!
//! A range string is a comma-separated list of terms:
//!
//! - `7` a single value
//! - `4~10` a closed range
//! - `4~10:2` the points 4, 6, 8, 10
//!
//! Callers that never use negative values may write `-` instead of `~`.

use std::fmt;

use crate::config::{
    HYPHEN_DELIMITER, MINMAX_DELIMITER, RANGE_TERM_DELIMITER, STEP_DELIMITER,
};
use crate::genepop::{GenepopError, Result};
use crate::interval::Interval;

/// Which character separates min from max in a range term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinMaxDelimiter {
    /// `~`, allows negative values.
    #[default]
    Tilde,
    /// `-`, rewritten to `~` before any splitting.
    Hyphen,
}

/// Converts range strings into interval lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeStringParser {
    delimiter: MinMaxDelimiter,
}

impl RangeStringParser {
    pub fn new(delimiter: MinMaxDelimiter) -> Self {
        Self { delimiter }
    }

    /// Parse every term of `text`. Intervals are returned unmerged, in term order.
    pub fn parse(&self, text: &str) -> Result<Vec<Interval>> {
        let text = match self.delimiter {
            MinMaxDelimiter::Tilde => text.to_string(),
            MinMaxDelimiter::Hyphen => {
                text.replace(HYPHEN_DELIMITER, &MINMAX_DELIMITER.to_string())
            }
        };

        let mut intervals = Vec::new();
        for term in text.split(RANGE_TERM_DELIMITER) {
            self.parse_term(term.trim(), &mut intervals)?;
        }
        Ok(intervals)
    }

    fn parse_term(&self, term: &str, out: &mut Vec<Interval>) -> Result<()> {
        let parts: Vec<&str> = term.split(MINMAX_DELIMITER).collect();
        match parts.as_slice() {
            [single] => {
                out.push(Interval::point(parse_int(term, single, "value")?));
                Ok(())
            }
            [min, rest] if rest.contains(STEP_DELIMITER) => {
                self.parse_stepped(term, min, rest, out)
            }
            [min, max] => {
                let min = parse_int(term, min, "min")?;
                let max = parse_int(term, max, "max")?;
                out.push(ordered(term, min, max)?);
                Ok(())
            }
            _ => Err(GenepopError::RangeParse {
                term: term.to_string(),
                message: format!("expected at most one '{}' separator", MINMAX_DELIMITER),
            }),
        }
    }

    /// Expand `min~max:step` into one point per step position.
    fn parse_stepped(&self, term: &str, min: &str, rest: &str, out: &mut Vec<Interval>) -> Result<()> {
        let pieces: Vec<&str> = rest.split(STEP_DELIMITER).collect();
        let (max, step) = match pieces.as_slice() {
            [max, step] => (*max, *step),
            _ => {
                return Err(GenepopError::RangeParse {
                    term: term.to_string(),
                    message: format!("expected max{}step after the min", STEP_DELIMITER),
                })
            }
        };

        let min = parse_int(term, min, "min")?;
        let max = parse_int(term, max, "max")?;
        let step = parse_int(term, step, "step")?;
        ordered(term, min, max)?;
        if step < 1 {
            return Err(GenepopError::RangeParse {
                term: term.to_string(),
                message: format!("step must be at least 1, got {}", step),
            });
        }
        if step as u64 > max.abs_diff(min) {
            log::debug!("Range term '{}' has step wider than its span; yields {} only", term, min);
        }

        let mut value = min;
        while value <= max {
            out.push(Interval::point(value));
            value = match value.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(())
    }
}

fn parse_int(term: &str, field: &str, what: &str) -> Result<i64> {
    field.trim().parse().map_err(|_| GenepopError::RangeParse {
        term: term.to_string(),
        message: format!("{} '{}' is not an integer", what, field.trim()),
    })
}

fn ordered(term: &str, min: i64, max: i64) -> Result<Interval> {
    Interval::new(min, max).map_err(|_| GenepopError::RangeParse {
        term: term.to_string(),
        message: format!("min ({}) is greater than max ({})", min, max),
    })
}

/// A set of disjoint intervals kept sorted.
///
/// Sorted by min, and since no two overlap, also sorted by max; membership
/// is a binary search over the maxima.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeCollection {
    intervals: Vec<Interval>,
}

impl RangeCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a range string and merge its terms.
    pub fn parse(text: &str, delimiter: MinMaxDelimiter) -> Result<Self> {
        let mut collection = Self::new();
        collection.insert(RangeStringParser::new(delimiter).parse(text)?);
        Ok(collection)
    }

    /// Insert intervals, merging any that share a value.
    ///
    /// Sort by min, then a single sweep: once sorted, nothing later can
    /// merge with an interval already committed.
    pub fn insert<I: IntoIterator<Item = Interval>>(&mut self, intervals: I) {
        let mut candidates: Vec<Interval> = self.intervals.drain(..).collect();
        candidates.extend(intervals);
        candidates.sort();

        let mut merged: Vec<Interval> = Vec::with_capacity(candidates.len());
        let mut iter = candidates.into_iter();
        let Some(mut running) = iter.next() else {
            return;
        };
        for next in iter {
            match running.merge(&next) {
                Some(union) => running = union,
                None => {
                    merged.push(running);
                    running = next;
                }
            }
        }
        merged.push(running);
        self.intervals = merged;
    }

    /// Check if `value` falls inside any stored interval.
    pub fn contains(&self, value: i64) -> bool {
        let idx = self.intervals.partition_point(|iv| iv.max() < value);
        self.intervals
            .get(idx)
            .is_some_and(|iv| iv.contains(value))
    }

    /// Check if every stored interval lies inside `[min, max]`.
    ///
    /// An empty collection is trivially inside.
    pub fn all_within(&self, min: i64, max: i64) -> Result<bool> {
        let bounds = Interval::new(min, max)?;
        Ok(self.intervals.iter().all(|iv| iv.is_within(&bounds)))
    }

    /// The merged intervals, ascending.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl fmt::Display for RangeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, iv) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", RANGE_TERM_DELIMITER)?;
            }
            write!(f, "{}", iv)?;
        }
        Ok(())
    }
}
