//! Inclusive ranges of SI numbers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{SearchError, SearchResult};
use super::si::{Number, Prefix, PrefixPolicy};

/// A `low..=high` span, or a single value when both ends are equal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: Number,
    pub high: Number,
}

impl Range {
    /// Create a range; the bounds are kept as given, not reordered
    pub fn new(low: Number, high: Number) -> Self {
        Self { low, high }
    }

    /// A single-value range
    pub fn exact(value: Number) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    /// Parse `"1k-2k"` or a single literal, leniently
    pub fn parse(text: &str) -> SearchResult<Self> {
        Self::parse_with(text, PrefixPolicy::Lenient)
    }

    /// Parse under the given prefix policy. The text is split on the first
    /// hyphen and both halves must parse.
    pub fn parse_with(text: &str, policy: PrefixPolicy) -> SearchResult<Self> {
        match text.split_once('-') {
            Some((low, high)) => Ok(Self {
                low: Number::parse_with(low, policy)?,
                high: Number::parse_with(high, policy)?,
            }),
            None => Ok(Self::exact(Number::parse_with(text, policy)?)),
        }
    }

    /// True when both bounds are the same `(significand, prefix)` pair.
    ///
    /// `1k-1000` is not exact even though both ends have the same value.
    pub fn is_exact(&self) -> bool {
        self.low == self.high
    }

    /// Whether `value` lies within the range, inclusive
    pub fn contains(&self, value: f64) -> bool {
        if self.is_exact() {
            return value == self.low.value();
        }
        value >= self.low.value() && value <= self.high.value()
    }

    /// Scale a bare number by `prefix`; ends that already carry a prefix stay as they are
    pub(crate) fn scale_unprefixed(self, prefix: Prefix) -> Self {
        let scale = |n: Number| {
            if n.prefix == Prefix::None {
                Number::with_prefix(n.significand, prefix)
            } else {
                n
            }
        };
        Self {
            low: scale(self.low),
            high: scale(self.high),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

impl FromStr for Range {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
