//! Storage layer - SQLite parts catalog
//!
//! Executes compiled search queries. The search modules never open a
//! connection themselves; everything database-facing lives here.
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Schema versioning and the `part_view` projection
//! - `catalog`: Query execution and catalog writes
//!
//! # Usage
//!
//! ```ignore
//! use partsearch_core::storage::{Catalog, Database};
//!
//! let db = Database::in_memory().await?;
//! let catalog: Catalog = db.catalog();
//! ```

pub mod catalog;
pub mod database;
pub mod migrations;

// Re-export commonly used types
pub use catalog::{Catalog, Category, NewPart, PartView, Place};
pub use database::{Database, DatabaseConfig, Location};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
