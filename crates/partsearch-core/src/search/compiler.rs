//! Filter to SQL compilation
//!
//! Turns a [`Filter`] into a parameterized predicate over the `part_view`
//! projection. Clause order is fixed:
//!
//! 1. paging cursor (`id > last_id`, else `id < first_id`)
//! 2. category membership
//! 3. place membership
//! 4. value (equality when exact, `BETWEEN` otherwise), then unit symbol
//! 5. stock amount, same shape as value
//! 6. name, then one substring clause per keyword
//!
//! Results are always ordered by `id DESC`. No filter value is ever
//! interpolated into the SQL text; everything is a `?` placeholder.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::filter::Filter;
use super::range::Range;

/// Rows per page when nothing else is configured
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Projection the predicate is written against
pub const PART_VIEW: &str = "part_view";

/// A positional query argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlArg {
    Int(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for SqlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// A compiled, parameterized catalog query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    /// Conjunction of clauses, `1=1` when there are none
    pub predicate: String,
    /// Arguments for the predicate's placeholders, in order
    pub args: Vec<SqlArg>,
    pub limit: u32,
    /// Row offset, bound after the predicate arguments
    pub offset: Option<u64>,
}

impl CompiledQuery {
    /// Full statement text
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            r#"SELECT * FROM "{}" WHERE {} ORDER BY "id" DESC LIMIT {}"#,
            PART_VIEW, self.predicate, self.limit
        );
        if self.offset.is_some() {
            sql.push_str(" OFFSET ?");
        }
        sql
    }

    /// Every argument for [`CompiledQuery::to_sql`], offset included
    pub fn bind_args(&self) -> Vec<SqlArg> {
        let mut args = self.args.clone();
        if let Some(offset) = self.offset {
            // SQLite offsets are signed; past i64::MAX no rows remain anyway.
            args.push(SqlArg::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
        }
        args
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Compiles filters with a fixed page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCompiler {
    page_size: u32,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryCompiler {
    /// Create a compiler; a zero page size is raised to 1
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Compile a filter. Total: every filter yields a query.
    pub fn compile(&self, filter: &Filter) -> CompiledQuery {
        let mut builder = PredicateBuilder::default();

        if let Some(last_id) = filter.cursor.last_id {
            builder.push(r#""id" > ?"#, [SqlArg::Int(last_id)]);
        } else if let Some(first_id) = filter.cursor.first_id {
            builder.push(r#""id" < ?"#, [SqlArg::Int(first_id)]);
        }

        builder.push_in("category_id", &filter.categories);
        builder.push_in("place_id", &filter.places);

        if let Some(value) = &filter.value {
            builder.push_range("value", value);
        }
        if let Some(unit) = &filter.unit {
            if !unit.symbol.is_empty() {
                builder.push(r#""unit_symbol" = ?"#, [SqlArg::Text(unit.symbol.clone())]);
            }
        }

        if let Some(stock) = &filter.stock {
            builder.push_range("amount", stock);
        }

        if let Some(name) = &filter.name {
            if is_glob(name) {
                builder.push(r#""name" GLOB ?"#, [SqlArg::Text(name.clone())]);
            } else {
                builder.push_contains("name", name);
            }
        }
        for keyword in &filter.keywords {
            builder.push_contains("name", keyword);
        }

        let offset = filter
            .page
            .filter(|page| *page > 0)
            .map(|page| u64::from(page) * u64::from(self.page_size));

        let (predicate, args) = builder.finish();
        debug!(predicate = %predicate, args = args.len(), "Compiled search filter");

        CompiledQuery {
            predicate,
            args,
            limit: self.page_size,
            offset,
        }
    }
}

#[derive(Default)]
struct PredicateBuilder {
    clauses: Vec<String>,
    args: Vec<SqlArg>,
}

impl PredicateBuilder {
    fn push(&mut self, clause: impl Into<String>, args: impl IntoIterator<Item = SqlArg>) {
        self.clauses.push(clause.into());
        self.args.extend(args);
    }

    fn push_in<'a>(&mut self, column: &str, ids: impl IntoIterator<Item = &'a i64>) {
        let args: Vec<SqlArg> = ids.into_iter().map(|id| SqlArg::Int(*id)).collect();
        if args.is_empty() {
            return;
        }
        let placeholders = vec!["?"; args.len()].join(", ");
        self.push(format!(r#""{}" IN ({})"#, column, placeholders), args);
    }

    fn push_range(&mut self, column: &str, range: &Range) {
        if range.is_exact() {
            self.push(
                format!(r#""{}" = ?"#, column),
                [SqlArg::Real(range.low.value())],
            );
        } else {
            self.push(
                format!(r#""{}" BETWEEN ? AND ?"#, column),
                [
                    SqlArg::Real(range.low.value()),
                    SqlArg::Real(range.high.value()),
                ],
            );
        }
    }

    fn push_contains(&mut self, column: &str, needle: &str) {
        self.push(
            format!(r#""{}" LIKE '%' || ? || '%' ESCAPE '\'"#, column),
            [SqlArg::Text(escape_like(needle))],
        );
    }

    fn finish(self) -> (String, Vec<SqlArg>) {
        let predicate = if self.clauses.is_empty() {
            "1=1".to_string()
        } else {
            self.clauses.join(" AND ")
        };
        (predicate, self.args)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Escape LIKE wildcards so the needle matches literally
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
