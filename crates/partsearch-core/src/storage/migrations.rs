//! Catalog schema migrations
//!
//! Migrations are an ordered table of SQL scripts. Each one runs in its own
//! transaction and is recorded in `schema_version`, so a half-applied
//! script never leaves the version ahead of the schema.

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::{debug, info};

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "catalog tables",
        sql: CATALOG_TABLES,
    },
    Migration {
        version: 2,
        description: "part_view projection",
        sql: PART_VIEW,
    },
];

/// Schema version after every migration has run
pub const CURRENT_VERSION: i32 = MIGRATIONS[MIGRATIONS.len() - 1].version;

const VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY NOT NULL,
        description TEXT NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

const CATALOG_TABLES: &str = r#"
    CREATE TABLE category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        unit TEXT,
        unit_symbol TEXT
    );

    CREATE TABLE place (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );

    CREATE TABLE part (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        value REAL,
        category_id INTEGER NOT NULL REFERENCES category(id),
        place_id INTEGER REFERENCES place(id) ON DELETE SET NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX idx_part_name ON part(name);
    CREATE INDEX idx_part_category ON part(category_id);
    CREATE INDEX idx_part_place ON part(place_id);
    CREATE INDEX idx_part_value ON part(value);

    -- Stock history; the newest row is the current amount
    CREATE TABLE part_amount (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        part_id INTEGER NOT NULL REFERENCES part(id) ON DELETE CASCADE,
        amount INTEGER NOT NULL,
        timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX idx_part_amount_part ON part_amount(part_id, timestamp);
"#;

const PART_VIEW: &str = r#"
    CREATE VIEW part_view AS
    SELECT
        p.id,
        p.name,
        p.description,
        p.value,
        p.category_id,
        p.place_id,
        p.created_at,
        c.name AS category_name,
        c.unit,
        c.unit_symbol,
        pl.name AS place_name,
        COALESCE((
            SELECT a.amount FROM part_amount a
            WHERE a.part_id = p.id
            ORDER BY a.timestamp DESC, a.id DESC
            LIMIT 1
        ), 0) AS amount
    FROM part p
    JOIN category c ON c.id = p.category_id
    LEFT JOIN place pl ON pl.id = p.place_id;
"#;

async fn applied_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(VERSION_TABLE).execute(pool).await?;
    let (version,): (i32,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Apply every migration newer than the recorded version
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let applied = applied_version(pool).await?;
    if applied >= CURRENT_VERSION {
        debug!(version = applied, "Catalog schema is current");
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        info!(
            version = migration.version,
            "Applying catalog migration: {}", migration.description
        );

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Catalog migration {} failed", migration.version))?;
        sqlx::query("INSERT INTO schema_version (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    info!(version = CURRENT_VERSION, "Catalog schema migrated");
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let applied = applied_version(pool).await?;
    Ok(MigrationStatus {
        current_version: applied,
        target_version: CURRENT_VERSION,
        pending: MIGRATIONS.iter().filter(|m| m.version > applied).count(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Version recorded in the database
    pub current_version: i32,
    pub target_version: i32,
    /// Migrations not yet applied
    pub pending: usize,
}

impl MigrationStatus {
    pub fn needs_migration(&self) -> bool {
        self.pending > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory pool")
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i32 + 1);
        }
        assert_eq!(CURRENT_VERSION, MIGRATIONS.len() as i32);
    }

    #[tokio::test]
    async fn test_fresh_database_is_migrated() {
        let pool = memory_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert_eq!(status.pending, MIGRATIONS.len());
        assert!(status.needs_migration());

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration());
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let descriptions: Vec<(String,)> =
            sqlx::query_as("SELECT description FROM schema_version ORDER BY version")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            descriptions,
            vec![
                ("catalog tables".to_string(),),
                ("part_view projection".to_string(),)
            ]
        );
    }

    #[tokio::test]
    async fn test_part_view_reports_latest_amount() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::raw_sql(
            r#"
            INSERT INTO category (id, name, unit, unit_symbol) VALUES (1, 'Resistor', 'Ohm', 'Ω');
            INSERT INTO part (id, name, value, category_id) VALUES (1, 'R1', 4700.0, 1);
            INSERT INTO part (id, name, value, category_id) VALUES (2, 'R2', 100.0, 1);
            INSERT INTO part_amount (part_id, amount, timestamp) VALUES (1, 10, '2024-01-01 00:00:00');
            INSERT INTO part_amount (part_id, amount, timestamp) VALUES (1, 7, '2024-02-01 00:00:00');
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let rows: Vec<(i64, i64, String, Option<String>)> = sqlx::query_as(
            "SELECT id, amount, unit_symbol, place_name FROM part_view ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(
            rows,
            vec![
                (1, 7, "Ω".to_string(), None),
                (2, 0, "Ω".to_string(), None)
            ]
        );
    }
}
