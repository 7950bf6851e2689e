//! Search error definitions

use thiserror::Error;

/// Result type for query parsing and filter construction
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors raised while turning a query into a filter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// No leading part of the literal parses as a float
    #[error("Malformed number: '{0}'")]
    MalformedNumber(String),

    /// A trailing suffix is not a registered prefix symbol or name
    #[error("Unknown SI prefix: '{0}'")]
    UnknownPrefix(String),

    /// Input ended inside a `[..]` or `<..>` bracket
    #[error("Unterminated '{delimiter}' bracket starting at byte {offset}")]
    UnterminatedBracket { delimiter: char, offset: usize },

    /// A field could not be turned into a filter constraint
    #[error("Invalid filter field '{field}': {source}")]
    FilterParse {
        field: String,
        #[source]
        source: Box<SearchError>,
    },

    /// The token producer was stopped before reaching end of input
    #[error("Token stream cancelled before end of input")]
    Cancelled,
}

impl SearchError {
    /// Wrap an error with the name of the field that produced it
    pub fn in_field(field: impl Into<String>, source: SearchError) -> Self {
        Self::FilterParse {
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// Get error code for this search error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedNumber(_) => "E1300",
            Self::UnknownPrefix(_) => "E1301",
            Self::UnterminatedBracket { .. } => "E1302",
            Self::FilterParse { .. } => "E1303",
            Self::Cancelled => "E1304",
        }
    }

    /// The innermost error, looking through `FilterParse` wrappers
    pub fn root_cause(&self) -> &SearchError {
        match self {
            Self::FilterParse { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
