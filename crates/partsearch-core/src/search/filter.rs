//! Search filter model
//!
//! A [`Filter`] is the normalized form of search criteria, whether they came
//! from the free-text search box (a token stream) or from the list page's
//! form fields. Singular fields are last-writer-wins, id sets are unions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::error::{SearchError, SearchResult};
use super::lexer::{Lexer, Token, TokenKind};
use super::pipeline::TokenStream;
use super::range::Range;
use super::si::{MAX_PREFIX_CHARS, Number, Prefix, PrefixPolicy};

/// Prefix and unit symbol taken from a `[...]` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitQualifier {
    pub prefix: Prefix,
    /// Unit symbol without prefix, possibly empty (`[k]`)
    pub symbol: String,
}

/// Unit symbols whose first letter is also a prefix symbol
const UNPREFIXED_SYMBOLS: &[&str] = &["Pa", "Gy", "Torr", "mol", "min", "mil", "ppm", "ft"];

impl UnitQualifier {
    /// Split a tag interior into prefix and symbol.
    ///
    /// The whole text is tried as a prefix first (`k`, `kilo`), then as one
    /// of a few unit symbols (`Pa` is pascal, not peta + `a`). Otherwise
    /// the longest leading prefix is split off (`kΩ` is kilo + `Ω`), and
    /// text with no leading prefix is all symbol.
    ///
    /// The split is purely lexical. A bare `[m]` is milli, never metre, and
    /// unknown spellings such as `[megohm]` split as milli + `egohm`; write
    /// `[MΩ]` or `[megaohm]` instead.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(prefix) = Prefix::lookup(text) {
            return Self {
                prefix,
                symbol: String::new(),
            };
        }
        if UNPREFIXED_SYMBOLS.contains(&text) {
            return Self {
                prefix: Prefix::None,
                symbol: text.to_string(),
            };
        }

        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .skip(1)
            .take(MAX_PREFIX_CHARS)
            .collect();
        for &i in boundaries.iter().rev() {
            let (head, symbol) = text.split_at(i);
            if let Some(prefix) = Prefix::lookup(head) {
                return Self {
                    prefix,
                    symbol: symbol.to_string(),
                };
            }
        }

        Self {
            prefix: Prefix::None,
            symbol: text.to_string(),
        }
    }
}

impl fmt::Display for UnitQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}{}]", self.prefix.symbol(), self.symbol)
    }
}

/// Keyset pagination cursors; `last_id` wins when both are set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Only ids greater than this one
    pub last_id: Option<i64>,
    /// Only ids less than this one
    pub first_id: Option<i64>,
}

impl PageCursor {
    pub fn is_empty(&self) -> bool {
        self.last_id.is_none() && self.first_id.is_none()
    }
}

/// Normalized search criteria over the parts catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub categories: BTreeSet<i64>,
    pub places: BTreeSet<i64>,
    pub value: Option<Range>,
    pub unit: Option<UnitQualifier>,
    pub stock: Option<Range>,
    pub name: Option<String>,
    pub keywords: Vec<String>,
    pub cursor: PageCursor,
    pub page: Option<u32>,
}

impl Filter {
    /// Create an empty filter matching everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, id: i64) -> Self {
        self.categories.insert(id);
        self
    }

    pub fn with_place(mut self, id: i64) -> Self {
        self.places.insert(id);
        self
    }

    pub fn with_value(mut self, value: Range) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_unit(mut self, unit: UnitQualifier) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_stock(mut self, stock: Range) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_last_id(mut self, id: i64) -> Self {
        self.cursor.last_id = Some(id);
        self
    }

    pub fn with_first_id(mut self, id: i64) -> Self {
        self.cursor.first_id = Some(id);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build from a free-text query, lexing synchronously
    pub fn parse_query(query: &str, policy: PrefixPolicy) -> SearchResult<Self> {
        Self::from_tokens(Lexer::new(query), policy)
    }

    /// Build from a token sequence. The sequence must reach `Eof`.
    pub fn from_tokens<I>(tokens: I, policy: PrefixPolicy) -> SearchResult<Self>
    where
        I: IntoIterator<Item = Token>,
    {
        let mut acc = TokenAccumulator::new(policy);
        for token in tokens {
            if acc.push(token)? {
                break;
            }
        }
        acc.finish()
    }

    /// Build from a running lexer. The producer is cancelled as soon as a
    /// token fails to apply.
    pub async fn from_token_stream(
        mut stream: TokenStream,
        policy: PrefixPolicy,
    ) -> SearchResult<Self> {
        let mut acc = TokenAccumulator::new(policy);
        while let Some(token) = stream.next().await {
            match acc.push(token) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    stream.cancel();
                    return Err(e);
                }
            }
        }
        acc.finish()
    }

    /// Build from list-page form fields.
    ///
    /// Empty values are treated as absent. Non-numeric category and place
    /// ids, cursors and page numbers are skipped; only `value` and `amount`
    /// can fail.
    pub fn from_form(form: &FormValues, policy: PrefixPolicy) -> SearchResult<Self> {
        let mut filter = Self::new();

        if let Some(value) = form.get_non_empty("value") {
            let range = Range::parse_with(value, policy)
                .map_err(|e| SearchError::in_field("value", e))?;
            filter.value = Some(range);
        }

        if let Some(amount) = form.get_non_empty("amount") {
            let range = Range::parse_with(amount, policy)
                .map_err(|e| SearchError::in_field("amount", e))?;
            filter.stock = Some(range);
        }

        if let Some(name) = form.get_non_empty("name") {
            filter.name = Some(name.to_string());
        }

        // Row ids start at 1, so zero never names a row.
        filter.categories.extend(parse_ids(form, "category").filter(|id| *id != 0));
        filter.places.extend(parse_ids(form, "place").filter(|id| *id != 0));

        filter.cursor.last_id = parse_id(form, "last_id").filter(|id| *id != 0);
        filter.cursor.first_id = parse_id(form, "first_id").filter(|id| *id != 0);

        filter.page = form.get_non_empty("page").and_then(|page| {
            page.trim()
                .parse::<u32>()
                .inspect_err(|_| debug!(page, "Ignoring non-numeric page"))
                .ok()
        });

        Ok(filter)
    }
}

fn parse_id(form: &FormValues, field: &str) -> Option<i64> {
    let raw = form.get_non_empty(field)?;
    match raw.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            debug!(field, value = raw, "Ignoring non-numeric id");
            None
        }
    }
}

fn parse_ids<'a>(form: &'a FormValues, field: &'a str) -> impl Iterator<Item = i64> + 'a {
    form.get_all(field)
        .filter(|raw| !raw.is_empty())
        .filter_map(move |raw| match raw.trim().parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(field, value = raw, "Ignoring non-numeric id");
                None
            }
        })
}

/// Applies tokens to a filter under construction
struct TokenAccumulator {
    filter: Filter,
    policy: PrefixPolicy,
    terminated: bool,
}

impl TokenAccumulator {
    fn new(policy: PrefixPolicy) -> Self {
        Self {
            filter: Filter::new(),
            policy,
            terminated: false,
        }
    }

    /// Apply one token; `Ok(true)` once the stream is complete
    fn push(&mut self, token: Token) -> SearchResult<bool> {
        match token.kind {
            TokenKind::Text => self.filter.keywords.push(token.text),
            TokenKind::Number => {
                let number = Number::parse_with(&token.text, self.policy)
                    .map_err(|e| SearchError::in_field("value", e))?;
                self.filter.value = Some(Range::exact(number));
            }
            TokenKind::Unit => {
                self.filter.unit = Some(UnitQualifier::parse(token.inner()));
            }
            TokenKind::Stock => {
                let stock = Range::parse_with(token.inner(), self.policy)
                    .map_err(|e| SearchError::in_field("stock", e))?;
                self.filter.stock = Some(stock);
            }
            TokenKind::Eof => {
                self.terminated = true;
                return Ok(true);
            }
            TokenKind::Error => {
                let err = token
                    .as_error()
                    .unwrap_or_else(|| SearchError::MalformedNumber(token.text.clone()));
                return Err(SearchError::in_field("query", err));
            }
        }
        Ok(false)
    }

    fn finish(mut self) -> SearchResult<Filter> {
        if !self.terminated {
            return Err(SearchError::Cancelled);
        }
        if let (Some(value), Some(unit)) = (self.filter.value, &self.filter.unit) {
            if unit.prefix != Prefix::None {
                self.filter.value = Some(value.scale_unprefixed(unit.prefix));
            }
        }
        Ok(self.filter)
    }
}

/// Ordered multimap of form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` string.
    ///
    /// A leading `?` is ignored. Escapes that do not decode to UTF-8 are
    /// kept as written.
    pub fn parse(encoded: &str) -> Self {
        let encoded = encoded.strip_prefix('?').unwrap_or(encoded);
        encoded
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect()
    }

    /// Append a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Append a field, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value of a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a field, treating an empty string as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Every value of a field, in order
    pub fn get_all<'a, 'k>(
        &'a self,
        key: &'k str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return a copy with `key` replaced by a single value
    pub fn with_replaced(&self, key: &str, value: impl Into<String>) -> Self {
        let mut copy: Self = self
            .pairs
            .iter()
            .filter(|(k, _)| k != key)
            .cloned()
            .collect();
        copy.insert(key, value);
        copy
    }

    /// Encode back to `application/x-www-form-urlencoded`
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}
