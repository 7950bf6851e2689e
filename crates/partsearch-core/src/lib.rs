//! Partsearch Core Library
//!
//! Search-query compiler for an electronic parts inventory:
//! - SI numbers and ranges (`4.7k`, `1k-2k`)
//! - Query lexer running as a cancellable producer task
//! - Filter construction from free text or list-page form fields
//! - Compilation to a parameterized query over the `part_view` projection
//! - SQLite catalog adapter for executing compiled queries

pub mod config;
pub mod error;
pub mod search;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::search::{
        CompiledQuery, Filter, FormValues, Number, Range, SearchOutcome, SearchService,
    };
    pub use crate::storage::{Catalog, Database};
}
