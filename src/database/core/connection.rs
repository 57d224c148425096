//! Database connection management
//!
//! This module provides the SQLite connection wrapper used by the schema
//! initializer and the status inspector.

use anyhow::{anyhow, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Core database connection wrapper
///
/// `DatabaseConn` owns exactly one SQLite connection. The connection is
/// released when the wrapper is dropped; use [`DatabaseConn::close`] to
/// observe errors raised while closing.
pub struct DatabaseConn {
    pub conn: Connection,
}

/// One column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// One foreign-key column as reported by `PRAGMA foreign_key_list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyInfo {
    pub from: String,
    pub table: String,
    pub to: Option<String>,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created. The file is
    /// created if it does not exist yet; its parent directory must exist.
    pub fn open(path: Option<&str>, enforce_foreign_keys: bool) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure(enforce_foreign_keys)?;
        Ok(db)
    }

    /// Open a database file with foreign-key enforcement on
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path), true)
    }

    /// Create an in-memory database with foreign-key enforcement on
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None, true)
    }

    /// Open an existing database file for inspection only
    ///
    /// Never creates the file and never changes its journal mode.
    pub fn open_read_only(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| anyhow!("Failed to open database at '{}' read-only: {}", path, e))?;
        Ok(DatabaseConn { conn })
    }

    /// Apply per-connection settings
    ///
    /// Only connection-scoped pragmas are set here; the journal mode of the
    /// file is left to whoever owns it.
    fn configure(&self, enforce_foreign_keys: bool) -> Result<()> {
        // reads page 1, so a file that is not a database fails here
        let _: i64 = self
            .conn
            .query_row("PRAGMA schema_version", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to read database header: {}", e))?;

        self.conn
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;

        let fk_pragma = if enforce_foreign_keys {
            "PRAGMA foreign_keys=ON"
        } else {
            "PRAGMA foreign_keys=OFF"
        };
        self.conn
            .execute(fk_pragma, [])
            .map_err(|e| anyhow!("Failed to configure foreign keys: {}", e))?;

        Ok(())
    }

    /// Whether SQLite is currently enforcing foreign-key constraints
    pub fn foreign_keys_enabled(&self) -> Result<bool> {
        let enabled: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to read foreign key setting: {}", e))?;
        Ok(enabled == 1)
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(&self.conn, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name);
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get row count of {}: {}", table_name, e))?;
        Ok(count)
    }

    /// List the columns of a table in declaration order
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        table_columns(&self.conn, table_name)
    }

    /// List the foreign keys declared on a table
    pub fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyInfo>> {
        foreign_keys(&self.conn, table_name)
    }

    /// Column lists of the unique constraints and unique indexes of a table
    pub fn unique_constraints(&self, table_name: &str) -> Result<Vec<Vec<String>>> {
        unique_constraints(&self.conn, table_name)
    }

    /// Close the connection, reporting any error SQLite raises while doing so
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("Failed to close database: {}", e))
    }
}

pub(crate) fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )
        .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
    Ok(count > 0)
}

pub(crate) fn table_columns(conn: &Connection, table_name: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )
        .map_err(|e| anyhow!("Failed to prepare table_info query: {}", e))?;

    let rows = stmt
        .query_map([table_name], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? != 0,
            })
        })
        .map_err(|e| anyhow!("Failed to read columns of {}: {}", table_name, e))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| anyhow!("Failed to read columns of {}: {}", table_name, e))
}

pub(crate) fn foreign_keys(conn: &Connection, table_name: &str) -> Result<Vec<ForeignKeyInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )
        .map_err(|e| anyhow!("Failed to prepare foreign_key_list query: {}", e))?;

    let rows = stmt
        .query_map([table_name], |row| {
            Ok(ForeignKeyInfo {
                from: row.get(0)?,
                table: row.get(1)?,
                to: row.get(2)?,
            })
        })
        .map_err(|e| anyhow!("Failed to read foreign keys of {}: {}", table_name, e))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| anyhow!("Failed to read foreign keys of {}: {}", table_name, e))
}

pub(crate) fn unique_constraints(conn: &Connection, table_name: &str) -> Result<Vec<Vec<String>>> {
    let index_names: Vec<String> = {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND origin != 'pk' ORDER BY name",
            )
            .map_err(|e| anyhow!("Failed to prepare index_list query: {}", e))?;
        let rows = stmt
            .query_map([table_name], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to read indexes of {}: {}", table_name, e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read indexes of {}: {}", table_name, e))?
    };

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
        .map_err(|e| anyhow!("Failed to prepare index_info query: {}", e))?;

    let mut constraints = Vec::with_capacity(index_names.len());
    for index in &index_names {
        let columns = stmt
            .query_map([index], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to read index {}: {}", index, e))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| anyhow!("Failed to read index {}: {}", index, e))?;
        constraints.push(columns);
    }
    constraints.sort();

    Ok(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_foreign_keys_setting() {
        let db = DatabaseConn::open(None, true).unwrap();
        assert!(db.foreign_keys_enabled().unwrap());

        let db = DatabaseConn::open(None, false).unwrap();
        assert!(!db.foreign_keys_enabled().unwrap());
    }

    #[test]
    fn test_table_exists() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
    }

    #[test]
    fn test_table_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("INSERT INTO test_table (id) VALUES (1), (2), (3)")
            .unwrap();

        assert_eq!(db.table_count("test_table").unwrap(), 3);
    }

    #[test]
    fn test_table_columns() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, label TEXT NOT NULL DEFAULT 'x', n REAL)")
            .unwrap();

        let cols = db.table_columns("t").unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label", "n"]);
        assert!(cols[0].primary_key);
        assert!(cols[1].not_null);
        assert_eq!(cols[1].default_value.as_deref(), Some("'x'"));
        assert_eq!(cols[2].data_type, "REAL");

        assert!(db.table_columns("missing").unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_parent_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("no/such/dir/db.sqlite3");
        let result = DatabaseConn::open_path(path.to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_read_only_does_not_create_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.db");
        assert!(DatabaseConn::open_read_only(path.to_str().unwrap()).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_close() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("close.db");
        let db = DatabaseConn::open_path(path.to_str().unwrap()).unwrap();
        db.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_and_unique_constraints() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY, code TEXT UNIQUE)")
            .unwrap();
        db.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER, tag TEXT, \
             FOREIGN KEY (parent_id) REFERENCES parent(id), UNIQUE (parent_id, tag))",
        )
        .unwrap();

        assert_eq!(
            db.foreign_keys("child").unwrap(),
            vec![ForeignKeyInfo {
                from: "parent_id".to_string(),
                table: "parent".to_string(),
                to: Some("id".to_string()),
            }]
        );
        assert!(db.foreign_keys("parent").unwrap().is_empty());

        assert_eq!(
            db.unique_constraints("child").unwrap(),
            vec![vec!["parent_id".to_string(), "tag".to_string()]]
        );
        assert_eq!(
            db.unique_constraints("parent").unwrap(),
            vec![vec!["code".to_string()]]
        );
    }

    #[test]
    fn test_open_leaves_journal_mode_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("journal.db");
        let db = DatabaseConn::open_path(path.to_str().unwrap()).unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        let mode: String = db
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "delete");
    }
}
