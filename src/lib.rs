#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! wetravel-db - schema bootstrap for the WeTravel database
//!
//! WeTravel is a social/travel-sharing application. This crate owns the
//! SQLite schema it runs on: six tables (users, posts, locations, comments,
//! likes, trips) created with `CREATE TABLE IF NOT EXISTS`, so running the
//! initializer again never touches existing data. Reading and writing rows
//! is left to the application layer.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | `wetravel-db` binary | `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: connection wrapper, table definitions, schema manager
//!   and the owning [`TravelDatabase`] handle
//! - **[`config`]**: configuration file and environment handling
//! - **[`utils`]**: output formats for the binary
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use wetravel_db::{initialize_database, WeTravelConfig};
//!
//! let config = WeTravelConfig::new(&None)?;
//! let report = initialize_database(&config)?;
//! for table in &report.tables {
//!     println!("{}", table); // e.g. "Users table created"
//! }
//! ```
//!
//! Foreign keys are enforced on every connection this crate opens unless
//! `enforce_foreign_keys = false` is configured. SQLite leaves enforcement
//! off by default, so connections opened elsewhere must enable it
//! themselves with `PRAGMA foreign_keys=ON`.

pub mod config;
pub mod database;
pub mod utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, get_sqlite_info, SqliteDatabaseInfo, TableInfo, WeTravelConfig};

// =============================================================================
// Database
// =============================================================================

pub use database::{
    initialize_database, initialize_database_with, ColumnInfo, DatabaseConn, ForeignKeyInfo,
    InitReport, SchemaDefinitions, SchemaManager, SchemaStatus, Table, TableDrift, TableInit,
    TravelDatabase, TripStatus,
};

pub use utils::OutputFormat;
