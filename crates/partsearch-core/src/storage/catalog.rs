//! Parts catalog access
//!
//! Executes compiled search queries against the `part_view` projection and
//! provides the small set of writes needed to populate a catalog.

use crate::error::{Error, Result};
use crate::search::compiler::{CompiledQuery, SqlArg};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// A part as seen through `part_view`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PartView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Value in base units
    pub value: Option<f64>,
    pub category_id: i64,
    pub place_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub category_name: String,
    pub unit: Option<String>,
    pub unit_symbol: Option<String>,
    pub place_name: Option<String>,
    /// Most recently recorded stock amount
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub unit_symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Place {
    pub id: i64,
    pub name: String,
}

/// Fields for a new part and its opening stock
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPart {
    pub name: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub category_id: i64,
    pub place_id: Option<i64>,
    pub amount: i64,
}

impl NewPart {
    pub fn new(name: impl Into<String>, category_id: i64) -> Self {
        Self {
            name: name.into(),
            category_id,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_place(mut self, place_id: i64) -> Self {
        self.place_id = Some(place_id);
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }
}

/// Catalog access over a connection pool
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========== Queries ==========

    /// Run a compiled query, binding its arguments positionally
    pub async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<PartView>> {
        let sql = query.to_sql();
        let args = query.bind_args();

        let mut query_builder = sqlx::query_as::<_, PartView>(&sql);
        for arg in args {
            query_builder = match arg {
                SqlArg::Int(v) => query_builder.bind(v),
                SqlArg::Real(v) => query_builder.bind(v),
                SqlArg::Text(v) => query_builder.bind(v),
            };
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(map_catalog_error)?;

        debug!(rows = rows.len(), "Fetched parts");
        Ok(rows)
    }

    /// First part whose name equals `name` exactly
    pub async fn find_by_name(&self, name: &str) -> Result<Option<PartView>> {
        sqlx::query_as(r#"SELECT * FROM "part_view" WHERE "name" = ? ORDER BY "id" LIMIT 1"#)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_catalog_error)
    }

    pub async fn get_part(&self, id: i64) -> Result<Option<PartView>> {
        sqlx::query_as(r#"SELECT * FROM "part_view" WHERE "id" = ?"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_catalog_error)
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as("SELECT id, name, unit, unit_symbol FROM category ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_catalog_error)
    }

    pub async fn places(&self) -> Result<Vec<Place>> {
        sqlx::query_as("SELECT id, name FROM place ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_catalog_error)
    }

    // ========== Writes ==========

    pub async fn insert_category(
        &self,
        name: &str,
        unit: Option<&str>,
        unit_symbol: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query("INSERT INTO category (name, unit, unit_symbol) VALUES (?, ?, ?)")
            .bind(name)
            .bind(unit)
            .bind(unit_symbol)
            .execute(&self.pool)
            .await
            .map_err(map_catalog_error)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_place(&self, name: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO place (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_catalog_error)?;
        Ok(result.last_insert_rowid())
    }

    /// Insert a part together with its opening stock amount
    pub async fn insert_part(&self, part: &NewPart) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(Error::DatabaseError)?;

        let result = sqlx::query(
            r#"
            INSERT INTO part (name, description, value, category_id, place_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&part.name)
        .bind(&part.description)
        .bind(part.value)
        .bind(part.category_id)
        .bind(part.place_id)
        .execute(&mut *tx)
        .await
        .map_err(map_catalog_error)?;
        let id = result.last_insert_rowid();

        sqlx::query("INSERT INTO part_amount (part_id, amount) VALUES (?, ?)")
            .bind(id)
            .bind(part.amount)
            .execute(&mut *tx)
            .await
            .map_err(map_catalog_error)?;

        tx.commit().await.map_err(Error::DatabaseError)?;

        debug!(id, name = %part.name, "Inserted part");
        Ok(id)
    }

    /// Record a new stock level; the latest record is the current amount
    pub async fn record_amount(&self, part_id: i64, amount: i64) -> Result<()> {
        sqlx::query("INSERT INTO part_amount (part_id, amount) VALUES (?, ?)")
            .bind(part_id)
            .bind(amount)
            .execute(&self.pool)
            .await
            .map_err(map_catalog_error)?;
        Ok(())
    }
}

/// A catalog that was never migrated surfaces as a missing table
fn map_catalog_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if message.contains("no such table") {
            return Error::CatalogMissing(message.to_string());
        }
    }
    Error::DatabaseError(err)
}
