//! Core database infrastructure
//!
//! This module provides the foundational database components:
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema initialization and inspection
//! - `SchemaStatus`: Schema state enumeration

mod connection;
mod schema;

pub use connection::{ColumnInfo, DatabaseConn, ForeignKeyInfo};
pub use schema::{
    InitReport, SchemaDefinitions, SchemaManager, SchemaStatus, Table, TableDrift, TableInit,
    TripStatus,
};
