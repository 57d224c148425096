//! Database module
//!
//! This module provides all database functionality for wetravel-db,
//! organized into:
//!
//! - **core**: SQLite connection wrapper, table definitions, schema manager
//! - **travel**: the owning `TravelDatabase` handle
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # Table definitions, initialization, inspection
//! │
//! └── travel          # Handle that initializes on open
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use wetravel_db::database::TravelDatabase;
//!
//! let db = TravelDatabase::open("databaseWT.db", true)?;
//! for line in &db.report().tables {
//!     println!("{}", line);
//! }
//! db.close()?;
//! ```

pub mod core;
mod travel;

pub use core::{
    ColumnInfo, DatabaseConn, ForeignKeyInfo, InitReport, SchemaDefinitions, SchemaManager,
    SchemaStatus, Table, TableDrift, TableInit, TripStatus,
};
pub use travel::TravelDatabase;

use crate::config::WeTravelConfig;
use anyhow::Result;
use tracing::info;

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}

/// Create the schema in the configured database file
///
/// Opens (or creates) the file, ensures every table exists and closes the
/// connection again before returning.
pub fn initialize_database(config: &WeTravelConfig) -> Result<InitReport> {
    initialize_database_with(config, |_| {})
}

/// Like [`initialize_database`], calling `on_table` as each table is handled
///
/// Tables handled before a failure have already been passed to `on_table`
/// when the error is returned.
pub fn initialize_database_with<F>(config: &WeTravelConfig, on_table: F) -> Result<InitReport>
where
    F: FnMut(&TableInit),
{
    ensure_data_dir(&config.data_dir)?;

    let path = config.sqlite_path();
    info!("Connecting to database at {}", path);
    let db = TravelDatabase::open_with(&path, config.enforce_foreign_keys, on_table)?;
    let report = db.report().clone();
    db.close()?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> WeTravelConfig {
        WeTravelConfig {
            data_dir: dir.join("data").to_string_lossy().to_string(),
            database_file: "databaseWT.db".to_string(),
            enforce_foreign_keys: true,
        }
    }

    #[test]
    fn test_initialize_database_creates_file_and_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let report = initialize_database(&config).unwrap();
        assert_eq!(report.created_count(), 6);
        assert!(std::path::Path::new(&config.sqlite_path()).exists());

        let db = DatabaseConn::open_read_only(&config.sqlite_path()).unwrap();
        let manager = SchemaManager::new(&db.conn);
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_initialize_database_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        initialize_database(&config).unwrap();
        let second = initialize_database(&config).unwrap();
        assert_eq!(second.created_count(), 0);
        assert_eq!(second.tables.len(), 6);
    }

    #[test]
    fn test_initialize_database_surfaces_storage_errors() {
        let tmp = tempfile::tempdir().unwrap();
        // a regular file where the data directory should be
        let blocker = tmp.path().join("data");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let config = config_in(tmp.path());
        assert!(initialize_database(&config).is_err());
    }

    #[test]
    fn test_initialize_database_rejects_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        ensure_data_dir(&config.data_dir).unwrap();
        std::fs::write(config.sqlite_path(), vec![0x42u8; 8192]).unwrap();

        assert!(initialize_database(&config).is_err());
    }

    #[test]
    fn test_initialize_database_with_streams_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let mut seen = Vec::new();
        let report = initialize_database_with(&config, |t| seen.push(t.table)).unwrap();

        assert_eq!(seen, Table::ALL.to_vec());
        assert_eq!(report.tables.len(), seen.len());
    }
}
