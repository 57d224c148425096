//! Database schema management
//!
//! This module holds the six table definitions of the WeTravel database and
//! the manager that creates and inspects them. All statements use
//! `CREATE TABLE IF NOT EXISTS`, so initialization never touches existing
//! data.

use super::connection::{foreign_keys, table_columns, table_exists, unique_constraints};
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Schema definitions for all tables in the database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    pub const USERS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fist_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            phone_number TEXT,
            image_url TEXT
        );
    "#;

    pub const POSTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            content TEXT,
            image_url TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );
    "#;

    pub const LOCATIONS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL,
            latitude REAL,
            longitude REAL,
            address TEXT,
            city TEXT,
            state TEXT,
            country TEXT,
            FOREIGN KEY (post_id) REFERENCES posts(id)
        );
    "#;

    pub const COMMENTS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            comment_text TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (post_id) REFERENCES posts(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );
    "#;

    /// One like per user per post
    pub const LIKES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (post_id) REFERENCES posts(id),
            FOREIGN KEY (user_id) REFERENCES users(id),
            UNIQUE (post_id, user_id)
        );
    "#;

    /// Itinerary stops; `order_index` orders the stops of one user's trip
    pub const TRIPS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS trips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            location_name TEXT NOT NULL,
            planned_time TEXT,
            duration_hours REAL,
            note TEXT,
            location_place_id TEXT,
            order_index INTEGER NOT NULL,
            latitude REAL,
            longitude REAL,
            status TEXT DEFAULT 'Pending',
            actual_arrival_time TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );
    "#;
}

/// The tables making up the schema, in creation order
///
/// Referenced tables (`users`, `posts`) come before the tables pointing at
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Users,
    Posts,
    Locations,
    Comments,
    Likes,
    Trips,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Users,
        Table::Posts,
        Table::Locations,
        Table::Comments,
        Table::Likes,
        Table::Trips,
    ];

    /// SQL name of the table
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Posts => "posts",
            Table::Locations => "locations",
            Table::Comments => "comments",
            Table::Likes => "likes",
            Table::Trips => "trips",
        }
    }

    /// Capitalized name used in confirmation lines
    pub fn label(&self) -> &'static str {
        match self {
            Table::Users => "Users",
            Table::Posts => "Posts",
            Table::Locations => "Locations",
            Table::Comments => "Comments",
            Table::Likes => "Likes",
            Table::Trips => "Trips",
        }
    }

    pub fn create_sql(&self) -> &'static str {
        match self {
            Table::Users => SchemaDefinitions::USERS_TABLE,
            Table::Posts => SchemaDefinitions::POSTS_TABLE,
            Table::Locations => SchemaDefinitions::LOCATIONS_TABLE,
            Table::Comments => SchemaDefinitions::COMMENTS_TABLE,
            Table::Likes => SchemaDefinitions::LIKES_TABLE,
            Table::Trips => SchemaDefinitions::TRIPS_TABLE,
        }
    }

    /// Expected `(name, declared type)` pairs in declaration order
    pub fn columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Table::Users => &[
                ("id", "INTEGER"),
                ("fist_name", "TEXT"),
                ("last_name", "TEXT"),
                ("username", "TEXT"),
                ("email", "TEXT"),
                ("password", "TEXT"),
                ("phone_number", "TEXT"),
                ("image_url", "TEXT"),
            ],
            Table::Posts => &[
                ("id", "INTEGER"),
                ("user_id", "INTEGER"),
                ("content", "TEXT"),
                ("image_url", "TEXT"),
                ("created_at", "TIMESTAMP"),
            ],
            Table::Locations => &[
                ("id", "INTEGER"),
                ("post_id", "INTEGER"),
                ("latitude", "REAL"),
                ("longitude", "REAL"),
                ("address", "TEXT"),
                ("city", "TEXT"),
                ("state", "TEXT"),
                ("country", "TEXT"),
            ],
            Table::Comments => &[
                ("id", "INTEGER"),
                ("post_id", "INTEGER"),
                ("user_id", "INTEGER"),
                ("comment_text", "TEXT"),
                ("created_at", "TIMESTAMP"),
            ],
            Table::Likes => &[
                ("id", "INTEGER"),
                ("post_id", "INTEGER"),
                ("user_id", "INTEGER"),
                ("created_at", "TIMESTAMP"),
            ],
            Table::Trips => &[
                ("id", "INTEGER"),
                ("user_id", "INTEGER"),
                ("location_name", "TEXT"),
                ("planned_time", "TEXT"),
                ("duration_hours", "REAL"),
                ("note", "TEXT"),
                ("location_place_id", "TEXT"),
                ("order_index", "INTEGER"),
                ("latitude", "REAL"),
                ("longitude", "REAL"),
                ("status", "TEXT"),
                ("actual_arrival_time", "TEXT"),
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown table '{}'", s))
    }
}

/// Progress of one itinerary stop, stored in `trips.status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TripStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "Pending",
            TripStatus::Active => "Active",
            TripStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TripStatus::Pending),
            "active" => Ok(TripStatus::Active),
            "completed" => Ok(TripStatus::Completed),
            _ => Err(format!(
                "Unknown trip status '{}'. Valid values: Pending, Active, Completed",
                s
            )),
        }
    }
}

/// Outcome of creating one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableInit {
    pub table: Table,
    /// `false` when the table was already present and left untouched
    pub created: bool,
}

impl fmt::Display for TableInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created {
            write!(f, "{} table created", self.table.label())
        } else {
            write!(f, "{} table already exists", self.table.label())
        }
    }
}

/// Per-table result of [`SchemaManager::initialize`], in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub tables: Vec<TableInit>,
}

impl InitReport {
    pub fn created_count(&self) -> usize {
        self.tables.iter().filter(|t| t.created).count()
    }
}

/// Schema manager for the database
///
/// Creates the six tables and inspects an existing file. It never drops or
/// alters anything.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Tables are created in [`Table::ALL`] order. A failing statement
    /// aborts the remaining creations; tables created before it stay.
    pub fn initialize(&self) -> Result<InitReport> {
        self.initialize_with(|_| {})
    }

    /// Initialize the database schema, calling `on_table` after each table
    ///
    /// The callback sees every table handled before a failure, so callers
    /// can report progress as it happens.
    pub fn initialize_with<F>(&self, mut on_table: F) -> Result<InitReport>
    where
        F: FnMut(&TableInit),
    {
        let mut report = InitReport::default();

        for table in Table::ALL {
            let existed = table_exists(self.conn, table.name())?;

            self.conn
                .execute(table.create_sql(), [])
                .map_err(|e| anyhow!("Failed to create {} table: {}", table.name(), e))?;

            let entry = TableInit {
                table,
                created: !existed,
            };
            info!(table = table.name(), created = entry.created, "{}", entry);
            on_table(&entry);
            report.tables.push(entry);
        }

        Ok(report)
    }

    /// Check the current schema status
    ///
    /// Every existing table is compared with its definition: columns with
    /// type, primary key, NOT NULL and default, plus foreign keys and unique
    /// constraints. All differing and all missing tables are reported.
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let reference = Connection::open_in_memory()
            .map_err(|e| anyhow!("Failed to create reference database: {}", e))?;
        for table in Table::ALL {
            reference.execute(table.create_sql(), []).map_err(|e| {
                anyhow!("Failed to create reference {} table: {}", table.name(), e)
            })?;
        }

        let mut missing = Vec::new();
        let mut drifted = Vec::new();

        for table in Table::ALL {
            if !table_exists(self.conn, table.name())? {
                missing.push(table);
                continue;
            }

            let expected = table_shape(&reference, table.name())?;
            let actual = table_shape(self.conn, table.name())?;

            if expected != actual {
                warn!(table = table.name(), "table shape differs from its definition");
                drifted.push(TableDrift {
                    table,
                    expected,
                    actual,
                });
            }
        }

        if !drifted.is_empty() {
            Ok(SchemaStatus::Drifted { drifted, missing })
        } else if missing.len() == Table::ALL.len() {
            Ok(SchemaStatus::NotInitialized)
        } else if missing.is_empty() {
            Ok(SchemaStatus::Current)
        } else {
            Ok(SchemaStatus::Incomplete { missing })
        }
    }
}

/// Describe a table as comparable lines: columns in declaration order, then
/// sorted foreign keys, then sorted unique constraints
fn table_shape(conn: &Connection, table_name: &str) -> Result<Vec<String>> {
    let mut shape: Vec<String> = table_columns(conn, table_name)?
        .into_iter()
        .map(|c| {
            let mut line = format!("{} {}", c.name, c.data_type);
            if c.primary_key {
                line.push_str(" PRIMARY KEY");
            }
            if c.not_null {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = c.default_value {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            line
        })
        .collect();

    let mut fks: Vec<String> = foreign_keys(conn, table_name)?
        .into_iter()
        .map(|fk| {
            format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.from,
                fk.table,
                fk.to.unwrap_or_default()
            )
        })
        .collect();
    fks.sort();
    shape.extend(fks);

    shape.extend(
        unique_constraints(conn, table_name)?
            .into_iter()
            .map(|cols| format!("UNIQUE ({})", cols.join(", "))),
    );

    Ok(shape)
}

/// A table whose shape differs from its definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDrift {
    pub table: Table,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

/// Schema status enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// None of the tables exist
    NotInitialized,

    /// All tables exist with the expected shape
    Current,

    /// Some tables exist, these do not
    Incomplete { missing: Vec<Table> },

    /// At least one existing table differs from its definition; `missing`
    /// lists tables that do not exist at all
    Drifted {
        drifted: Vec<TableDrift>,
        missing: Vec<Table>,
    },
}

impl fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current => write!(f, "current"),
            SchemaStatus::Incomplete { missing } => {
                let names: Vec<&str> = missing.iter().map(|t| t.name()).collect();
                write!(f, "incomplete (missing: {})", names.join(", "))
            }
            SchemaStatus::Drifted { drifted, missing } => {
                let names: Vec<&str> = drifted.iter().map(|d| d.table.name()).collect();
                write!(f, "drifted ({})", names.join(", "))?;
                if !missing.is_empty() {
                    let names: Vec<&str> = missing.iter().map(|t| t.name()).collect();
                    write!(f, ", missing: {}", names.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
