//! Error types for Partsearch

use thiserror::Error;

use crate::search::error::SearchError;

/// Result type alias using Partsearch's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Partsearch error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Query errors (E1300-E1399)
    #[error("Invalid search query: {0}")]
    Search(#[from] SearchError),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Catalog is not initialized: {0}. Run `partsearch seed` to create a demo catalog.")]
    CatalogMissing(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Search(e) => e.code(),
            Self::DatabaseError(_) => "E400",
            Self::CatalogMissing(_) => "E401",
            Self::ConfigError(_) => "E600",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Search(e) => match e.root_cause() {
                SearchError::UnterminatedBracket { delimiter, .. } => {
                    let close = if *delimiter == '<' { '>' } else { ']' };
                    Some(format!("Close the '{}' tag with '{}'", delimiter, close))
                }
                SearchError::UnknownPrefix(_) => Some(
                    "partsearch config set search.strict_prefixes false".to_string(),
                ),
                _ => None,
            },
            Self::CatalogMissing(_) => Some("partsearch seed".to_string()),
            Self::ConfigError(_) => Some("partsearch config show".to_string()),
            Self::DatabaseError(_) => None,
        }
    }
}
