//! Catalog database handle
//!
//! Opens the SQLite store behind the parts catalog and brings its schema up
//! to date before anything reads `part_view`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::storage::catalog::Catalog;
use crate::storage::migrations::{self, MigrationStatus};

const FILE_POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the catalog lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    /// Private to the pool and gone once it closes
    Memory,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(":memory:"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: Location,
    pub pool_size: u32,
    /// Apply pending migrations when the pool opens
    pub migrate: bool,
}

impl DatabaseConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            pool_size: FILE_POOL_SIZE,
            migrate: true,
        }
    }

    /// A memory database only exists on one connection, so the pool holds one.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool_size: 1,
            migrate: true,
        }
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        if self.location != Location::Memory {
            self.pool_size = size.max(1);
        }
        self
    }

    pub fn without_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.location {
            Location::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            Location::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };
        Ok(options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().max_connections(self.pool_size);
        match self.location {
            // Recycling the only connection would drop every table with it
            Location::Memory => options.idle_timeout(None).max_lifetime(None),
            Location::File(_) => options,
        }
    }
}

/// Pooled connection to the catalog store
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: Location,
}

impl Database {
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        if let Location::File(path) = &config.location {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create catalog directory: {}", parent.display())
                })?;
            }
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .with_context(|| format!("Failed to open catalog at {}", config.location))?;

        let db = Self {
            pool,
            location: config.location,
        };
        if config.migrate {
            db.migrate().await?;
        }

        debug!(location = %db.location, "Catalog database ready");
        Ok(db)
    }

    /// Open (or create) the catalog file at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::connect(DatabaseConfig::file(path)).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Catalog queries sharing this pool
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.pool.clone())
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Backing file, if the catalog is not in memory
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool)
            .await
            .with_context(|| format!("Failed to migrate catalog at {}", self.location))
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        migrations::migration_status(&self.pool)
            .await
            .context("Failed to read catalog schema version")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_catalog_is_migrated() {
        let db = Database::in_memory().await.unwrap();
        let status = db.migration_status().await.unwrap();

        assert!(!status.needs_migration());
        assert_eq!(status.current_version, migrations::CURRENT_VERSION);
        assert_eq!(db.location().to_string(), ":memory:");
        assert!(db.path().is_none());
    }

    #[tokio::test]
    async fn test_unmigrated_catalog_reports_pending() {
        let db = Database::connect(DatabaseConfig::in_memory().without_migrations())
            .await
            .unwrap();
        let status = db.migration_status().await.unwrap();

        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration());

        db.migrate().await.unwrap();
        assert!(!db.migration_status().await.unwrap().needs_migration());
    }

    #[test]
    fn test_pool_size_is_fixed_for_memory() {
        let config = DatabaseConfig::in_memory().with_pool_size(8);
        assert_eq!(config.pool_size, 1);

        let config = DatabaseConfig::file("parts.db").with_pool_size(0).without_migrations();
        assert_eq!(config.pool_size, 1);
        assert!(!config.migrate);
        assert_eq!(config.location, Location::File(PathBuf::from("parts.db")));
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = Database::in_memory().await.unwrap();

        let (enabled,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);

        let orphan = sqlx::query("INSERT INTO part (name, category_id) VALUES ('R1', 99)")
            .execute(db.pool())
            .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_file_catalog_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("inventory").join("catalog.db");

        let db = Database::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(db.location().to_string(), path.display().to_string());

        assert!(db.catalog().categories().await.unwrap().is_empty());
        db.close().await;
    }
}
