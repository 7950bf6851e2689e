//! Search-query compilation
//!
//! Turns a free-text query (or a set of list-page form fields) into a
//! parameterized query over the parts catalog:
//!
//! ```text
//! query ─► Lexer ─► TokenStream ─► Filter ─► QueryCompiler ─► CompiledQuery
//!                                    ▲
//!                         FormValues ┘
//! ```
//!
//! Query syntax: plain words are name keywords, numbers may carry an SI
//! prefix (`4.7k`, `100n`, `2.2 M`), `[kΩ]` qualifies the unit and `<5-50>`
//! restricts the stock amount.
//!
//! # Usage
//!
//! ```ignore
//! use partsearch_core::config::SearchConfig;
//! use partsearch_core::search::compile_query;
//!
//! let (filter, query) = compile_query("resistor 4.7[kΩ] <5-50>", &SearchConfig::default()).await?;
//! println!("{}", query.to_sql());
//! ```

pub mod compiler;
pub mod error;
pub mod filter;
pub mod lexer;
pub mod pipeline;
pub mod range;
pub mod service;
pub mod si;

pub use compiler::{CompiledQuery, QueryCompiler, SqlArg};
pub use error::{SearchError, SearchResult};
pub use filter::{Filter, FormValues, PageCursor, UnitQualifier};
pub use lexer::{Lexer, Span, Token, TokenKind, tokenize};
pub use pipeline::{TokenStream, spawn_lexer};
pub use range::Range;
pub use service::{ListPage, SearchOutcome, SearchService};
pub use si::{Number, Prefix, PrefixPolicy};

use crate::config::SearchConfig;

/// Lex `query` on a producer task, build its filter and compile it
pub async fn compile_query(
    query: &str,
    config: &SearchConfig,
) -> SearchResult<(Filter, CompiledQuery)> {
    let stream = spawn_lexer(query, config.queue_capacity);
    let filter = Filter::from_token_stream(stream, config.prefix_policy()).await?;
    let compiled = config.compiler().compile(&filter);
    Ok((filter, compiled))
}

/// Compile list-page form fields
pub fn compile_form(
    form: &FormValues,
    config: &SearchConfig,
) -> SearchResult<(Filter, CompiledQuery)> {
    let filter = Filter::from_form(form, config.prefix_policy())?;
    let compiled = config.compiler().compile(&filter);
    Ok((filter, compiled))
}
