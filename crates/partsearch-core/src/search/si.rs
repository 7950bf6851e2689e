//! Metric (SI) numbers
//!
//! A [`Number`] is a decimal significand scaled by a power-of-ten metric
//! prefix, e.g. `4.7k` is `4.7 × 10^3`. Equality is defined on the
//! `(significand, prefix)` pair, so `1k` and `1000` are different numbers
//! with the same [`Number::value`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::error::{SearchError, SearchResult};

/// A metric prefix, identified by its power-of-ten exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prefix {
    Yotta,
    Zetta,
    Exa,
    Peta,
    Tera,
    Giga,
    Mega,
    Kilo,
    /// No prefix, exponent 0
    None,
    Milli,
    Micro,
    Nano,
    Pico,
    Femto,
}

/// Every prefix, ordered from the largest exponent to the smallest
pub const PREFIXES: [Prefix; 14] = [
    Prefix::Yotta,
    Prefix::Zetta,
    Prefix::Exa,
    Prefix::Peta,
    Prefix::Tera,
    Prefix::Giga,
    Prefix::Mega,
    Prefix::Kilo,
    Prefix::None,
    Prefix::Milli,
    Prefix::Micro,
    Prefix::Nano,
    Prefix::Pico,
    Prefix::Femto,
];

// The table must list every variant exactly once, in descending order.
const _: () = {
    let mut i = 0;
    while i < PREFIXES.len() {
        assert!(PREFIXES[i].index() == i);
        if i > 0 {
            assert!(PREFIXES[i - 1].exponent() > PREFIXES[i].exponent());
        }
        i += 1;
    }
};

/// Extra symbols accepted on input but never produced on output
const SYMBOL_ALIASES: [(&str, Prefix); 1] = [("u", Prefix::Micro)];

/// Longest prefix symbol, alias or name, in chars
pub(crate) const MAX_PREFIX_CHARS: usize = 5;

const _: () = {
    let mut i = 0;
    while i < PREFIXES.len() {
        assert!(PREFIXES[i].symbol().len() <= MAX_PREFIX_CHARS);
        assert!(PREFIXES[i].name().len() <= MAX_PREFIX_CHARS);
        i += 1;
    }
};

impl Prefix {
    const fn index(self) -> usize {
        match self {
            Self::Yotta => 0,
            Self::Zetta => 1,
            Self::Exa => 2,
            Self::Peta => 3,
            Self::Tera => 4,
            Self::Giga => 5,
            Self::Mega => 6,
            Self::Kilo => 7,
            Self::None => 8,
            Self::Milli => 9,
            Self::Micro => 10,
            Self::Nano => 11,
            Self::Pico => 12,
            Self::Femto => 13,
        }
    }

    /// Power-of-ten exponent of this prefix
    pub const fn exponent(self) -> i32 {
        match self {
            Self::Yotta => 24,
            Self::Zetta => 21,
            Self::Exa => 18,
            Self::Peta => 15,
            Self::Tera => 12,
            Self::Giga => 9,
            Self::Mega => 6,
            Self::Kilo => 3,
            Self::None => 0,
            Self::Milli => -3,
            Self::Micro => -6,
            Self::Nano => -9,
            Self::Pico => -12,
            Self::Femto => -15,
        }
    }

    /// `10^exponent`, exact for every prefix
    pub const fn scale(self) -> f64 {
        match self {
            Self::Yotta => 1e24,
            Self::Zetta => 1e21,
            Self::Exa => 1e18,
            Self::Peta => 1e15,
            Self::Tera => 1e12,
            Self::Giga => 1e9,
            Self::Mega => 1e6,
            Self::Kilo => 1e3,
            Self::None => 1.0,
            Self::Milli => 1e-3,
            Self::Micro => 1e-6,
            Self::Nano => 1e-9,
            Self::Pico => 1e-12,
            Self::Femto => 1e-15,
        }
    }

    /// Display symbol (empty for [`Prefix::None`])
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Yotta => "Y",
            Self::Zetta => "Z",
            Self::Exa => "E",
            Self::Peta => "P",
            Self::Tera => "T",
            Self::Giga => "G",
            Self::Mega => "M",
            Self::Kilo => "k",
            Self::None => "",
            Self::Milli => "m",
            Self::Micro => "μ",
            Self::Nano => "n",
            Self::Pico => "p",
            Self::Femto => "f",
        }
    }

    /// Lowercase prefix name (empty for [`Prefix::None`])
    pub const fn name(self) -> &'static str {
        match self {
            Self::Yotta => "yotta",
            Self::Zetta => "zetta",
            Self::Exa => "exa",
            Self::Peta => "peta",
            Self::Tera => "tera",
            Self::Giga => "giga",
            Self::Mega => "mega",
            Self::Kilo => "kilo",
            Self::None => "",
            Self::Milli => "milli",
            Self::Micro => "micro",
            Self::Nano => "nano",
            Self::Pico => "pico",
            Self::Femto => "femto",
        }
    }

    /// Map an exponent back to its prefix; unknown exponents become `None`
    pub fn from_exponent(exponent: i32) -> Self {
        PREFIXES
            .into_iter()
            .find(|p| p.exponent() == exponent)
            .unwrap_or(Self::None)
    }

    /// Look up a prefix by exact symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol.is_empty() {
            return None;
        }
        PREFIXES
            .into_iter()
            .find(|p| p.symbol() == symbol)
            .or_else(|| {
                SYMBOL_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == symbol)
                    .map(|(_, p)| *p)
            })
    }

    /// Look up a prefix by case-insensitive name
    pub fn from_name(name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        PREFIXES
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Symbol first (case-sensitive, `m` is not `M`), then name
    pub fn lookup(text: &str) -> Option<Self> {
        Self::from_symbol(text).or_else(|| Self::from_name(text))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How to treat a suffix that is not a known prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPolicy {
    /// Fall back to [`Prefix::None`] and keep the numeric part
    #[default]
    Lenient,
    /// Reject with [`SearchError::UnknownPrefix`]
    Strict,
}

/// Outcome of matching the text after the numeric literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixMatch {
    Recognized(Prefix),
    Unrecognized(String),
}

/// A parsed number together with how its prefix was resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNumber {
    pub number: Number,
    pub prefix_match: PrefixMatch,
}

/// A significand scaled by a metric prefix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Number {
    pub significand: f64,
    pub prefix: Prefix,
}

impl Number {
    /// Create a number without a prefix
    pub fn new(value: f64) -> Self {
        Self::with_prefix(value, Prefix::None)
    }

    /// Create a number with an explicit prefix
    pub fn with_prefix(significand: f64, prefix: Prefix) -> Self {
        Self {
            significand,
            prefix,
        }
    }

    /// Parse leniently: an unknown suffix falls back to no prefix
    pub fn parse(text: &str) -> SearchResult<Self> {
        Self::parse_with(text, PrefixPolicy::Lenient)
    }

    /// Parse under the given prefix policy
    pub fn parse_with(text: &str, policy: PrefixPolicy) -> SearchResult<Self> {
        let parsed = Self::parse_detailed(text)?;
        match (&parsed.prefix_match, policy) {
            (PrefixMatch::Unrecognized(suffix), PrefixPolicy::Strict) => {
                Err(SearchError::UnknownPrefix(suffix.clone()))
            }
            (PrefixMatch::Unrecognized(suffix), PrefixPolicy::Lenient) => {
                debug!(input = text, suffix = %suffix, "Ignoring unknown SI prefix");
                Ok(parsed.number)
            }
            (PrefixMatch::Recognized(_), _) => Ok(parsed.number),
        }
    }

    /// Parse and report whether the suffix was recognized.
    ///
    /// Accepted forms, tried in order:
    /// - a plain float literal (`"4700"`, `"1e3"`)
    /// - a float, one space, then a prefix symbol or name (`"4.7 k"`, `"4.7 kilo"`)
    /// - a float immediately followed by a prefix symbol or name (`"4.7k"`, `"2E"`)
    /// - the longest leading float, with the rest reported as unrecognized
    pub fn parse_detailed(text: &str) -> SearchResult<ParsedNumber> {
        let s = text.trim();

        if let Some(significand) = parse_float(s) {
            return Ok(ParsedNumber::recognized(significand, Prefix::None));
        }

        if let Some((head, tail)) = s.split_once(' ') {
            if let Some(significand) = parse_float(head) {
                return Ok(match Prefix::lookup(tail) {
                    Some(prefix) => ParsedNumber::recognized(significand, prefix),
                    None => ParsedNumber::unrecognized(significand, tail),
                });
            }
        }

        // Only the last few chars can form a prefix. Ascending split points
        // give the longest trailing prefix first.
        let first_split = s.chars().count().saturating_sub(MAX_PREFIX_CHARS).max(1);
        for (i, _) in s.char_indices().skip(first_split) {
            let (head, tail) = s.split_at(i);
            if let Some(prefix) = Prefix::lookup(tail) {
                if let Some(significand) = parse_float(head) {
                    return Ok(ParsedNumber::recognized(significand, prefix));
                }
            }
        }

        let (head, tail) = s.split_at(float_literal_len(s));
        match parse_float(head) {
            Some(significand) if !tail.is_empty() => {
                Ok(ParsedNumber::unrecognized(significand, tail))
            }
            _ => Err(SearchError::MalformedNumber(text.to_string())),
        }
    }

    /// `significand × 10^exponent`
    pub fn value(&self) -> f64 {
        self.significand * self.prefix.scale()
    }

    /// Exponent of the prefix
    pub fn exponent(&self) -> i32 {
        self.prefix.exponent()
    }

    /// Re-express the value with the largest prefix that keeps the
    /// significand in `[1, 1000]`. Values no prefix can cover (zero,
    /// negatives, out of range) are returned unchanged.
    pub fn canon(&self) -> Self {
        let value = self.value();
        for prefix in PREFIXES {
            let significand = value / prefix.scale();
            if (1.0..=1000.0).contains(&significand) {
                return Self::with_prefix(significand, prefix);
            }
        }
        *self
    }
}

impl ParsedNumber {
    fn recognized(significand: f64, prefix: Prefix) -> Self {
        Self {
            number: Number::with_prefix(significand, prefix),
            prefix_match: PrefixMatch::Recognized(prefix),
        }
    }

    fn unrecognized(significand: f64, suffix: &str) -> Self {
        Self {
            number: Number::new(significand),
            prefix_match: PrefixMatch::Unrecognized(suffix.to_string()),
        }
    }
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Byte length of the longest leading decimal float literal in `s`:
/// an optional sign, digits with at most one point, then an optional
/// exponent. Zero when `s` does not start with one.
fn float_literal_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let whole = digits_from(end);
    end += whole;

    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits_from(end + 1);
        if whole + fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole + fraction == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits_from(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
        }
    }
    end
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.significand, self.prefix.symbol())
    }
}

impl FromStr for Number {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}
