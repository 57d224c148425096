use crate::database::core::{DatabaseConn, InitReport, SchemaManager, SchemaStatus, TableInit};
use anyhow::Result;
use tracing::{info, warn};

/// WeTravel database handle (SQLite backend)
///
/// Opening the handle guarantees the six tables exist. The connection is
/// owned by the handle and released when it is dropped or closed; nothing
/// about it is global.
pub struct TravelDatabase {
    db: DatabaseConn,
    report: InitReport,
}

impl TravelDatabase {
    /// Open the database at the specified path and initialize its schema
    ///
    /// Existing tables and rows are never modified. A table whose columns
    /// differ from the definition is reported but left as it is.
    pub fn open(path: &str, enforce_foreign_keys: bool) -> Result<Self> {
        Self::open_with(path, enforce_foreign_keys, |_| {})
    }

    /// Like [`TravelDatabase::open`], calling `on_table` as each table is
    /// handled
    pub fn open_with<F>(path: &str, enforce_foreign_keys: bool, on_table: F) -> Result<Self>
    where
        F: FnMut(&TableInit),
    {
        let db = DatabaseConn::open(Some(path), enforce_foreign_keys)?;
        Self::bootstrap(db, on_table)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(DatabaseConn::open_in_memory()?, |_| {})
    }

    fn bootstrap<F>(db: DatabaseConn, on_table: F) -> Result<Self>
    where
        F: FnMut(&TableInit),
    {
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("WeTravel database schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing WeTravel database schema");
            }
            SchemaStatus::Incomplete { missing } => {
                info!("Creating {} missing table(s)", missing.len());
            }
            SchemaStatus::Drifted { drifted, missing } => {
                for drift in &drifted {
                    warn!(
                        "Table {} does not match its definition; leaving it unchanged",
                        drift.table
                    );
                }
                if !missing.is_empty() {
                    info!("Creating {} missing table(s)", missing.len());
                }
            }
        }

        let report = schema.initialize_with(on_table)?;
        Ok(Self { db, report })
    }

    /// What the initialization on open did, table by table
    pub fn report(&self) -> &InitReport {
        &self.report
    }

    /// Get the underlying database connection
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Current schema status
    pub fn status(&self) -> Result<SchemaStatus> {
        SchemaManager::new(&self.db.conn).check_status()
    }

    /// Close the connection, surfacing errors raised while closing
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Table;

    #[test]
    fn test_open_in_memory_initializes() {
        let db = TravelDatabase::open_in_memory().unwrap();
        assert_eq!(db.report().created_count(), Table::ALL.len());
        assert_eq!(db.status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_reopen_file_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("databaseWT.db");
        let path = path.to_str().unwrap();

        let db = TravelDatabase::open(path, true).unwrap();
        db.connection()
            .execute(
                "INSERT INTO users (fist_name, last_name, username, email, password) VALUES ('Ada', 'Lee', 'ada', 'ada@example.com', 'pw')",
                [],
            )
            .unwrap();
        db.close().unwrap();

        let db = TravelDatabase::open(path, true).unwrap();
        assert_eq!(db.report().created_count(), 0);
        let users: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(users, 1);
    }

    #[test]
    fn test_foreign_key_enforcement_follows_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fk.db");
        let path = path.to_str().unwrap();

        let strict = TravelDatabase::open(path, true).unwrap();
        assert!(strict
            .connection()
            .execute("INSERT INTO posts (user_id) VALUES (99)", [])
            .is_err());
        strict.close().unwrap();

        let lax = TravelDatabase::open(path, false).unwrap();
        lax.connection()
            .execute("INSERT INTO posts (user_id) VALUES (99)", [])
            .unwrap();
    }

    #[test]
    fn test_open_with_reports_each_table() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stream.db");

        let mut lines = Vec::new();
        let db = TravelDatabase::open_with(path.to_str().unwrap(), true, |t| {
            lines.push(t.to_string())
        })
        .unwrap();

        assert_eq!(lines.len(), Table::ALL.len());
        assert_eq!(lines[0], "Users table created");
        assert_eq!(lines[5], "Trips table created");
        assert_eq!(db.report().tables.len(), lines.len());
    }
}
