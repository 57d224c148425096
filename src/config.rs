use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::database::{DatabaseConn, SchemaManager, SchemaStatus, Table};

/// Database file name used when the configuration does not name one
pub const DEFAULT_DATABASE_FILE: &str = "databaseWT.db";

pub struct WeTravelConfig {
    /// Path to the directory holding the database file
    pub data_dir: String,

    /// Database file name (or absolute path) inside `data_dir`
    pub database_file: String,

    /// Whether connections enforce the declared foreign keys
    pub enforce_foreign_keys: bool,
}

const EMPTY_CONFIG: &str = r#"### wetravel-db configuration file

### directory holding the database file
# data_dir = "~/.wetravel"

### database file name inside data_dir
# database_file = "databaseWT.db"

### reject rows whose user_id/post_id point at nothing
# enforce_foreign_keys = true
"#;

impl Default for WeTravelConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.wetravel", home_dir),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            enforce_foreign_keys: true,
        }
    }
}

impl WeTravelConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<WeTravelConfig> {
        let mut builder = Config::builder();

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let p = Self::config_file_path();
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    let dir = Self::default().data_dir;
                    std::fs::create_dir_all(dir.as_str())
                        .map_err(|e| anyhow!("Unable to create wetravel directory: {}", e))?;
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of WETRAVEL)
        // E.g., `WETRAVEL_DATA_DIR=/srv/wetravel wetravel-db` sets the data directory
        builder = builder.add_source(config::Environment::with_prefix("WETRAVEL"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<WeTravelConfig> {
        let defaults = Self::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => defaults.data_dir,
        };

        let database_file = config
            .get("database_file")
            .filter(|f| !f.trim().is_empty())
            .cloned()
            .unwrap_or(defaults.database_file);

        let enforce_foreign_keys = match config.get("enforce_foreign_keys") {
            Some(v) => parse_bool(v)
                .ok_or_else(|| anyhow!("Invalid value for enforce_foreign_keys: '{}'", v))?,
            None => defaults.enforce_foreign_keys,
        };

        Ok(WeTravelConfig {
            data_dir,
            database_file,
            enforce_foreign_keys,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        Path::new(self.data_dir.trim_end_matches('/'))
            .join(&self.database_file)
            .to_string_lossy()
            .to_string()
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!(
                "Foreign Keys:       {}",
                if self.enforce_foreign_keys {
                    "enforced"
                } else {
                    "not enforced"
                }
            ),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.wetravel/wetravel.toml", home_dir)
    }
}

fn expand_home(p: &str) -> String {
    match (p.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => p.to_string(),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Database info types (used by the status command)
// =============================================================================

/// Row count of one table
#[derive(Debug, Serialize, Clone)]
pub struct TableInfo {
    pub name: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

/// Information about the SQLite database
#[derive(Debug, Serialize, Clone)]
pub struct SqliteDatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub foreign_keys_enforced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tables: Vec<TableInfo>,
}

/// Get SQLite database information
///
/// Opens the file read-only; a missing file is reported, not created.
pub fn get_sqlite_info(config: &WeTravelConfig) -> SqliteDatabaseInfo {
    let sqlite_path = config.sqlite_path();
    let metadata = std::fs::metadata(&sqlite_path).ok();
    let sqlite_exists = metadata.is_some();

    let mut info = SqliteDatabaseInfo {
        path: sqlite_path.clone(),
        exists: sqlite_exists,
        size_bytes: metadata.as_ref().map(|m| m.len()),
        last_modified: metadata
            .and_then(|m| m.modified().ok())
            .map(|t| {
                chrono::DateTime::<chrono::Utc>::from(t)
                    .format("%Y-%m-%d %H:%M:%S UTC")
                    .to_string()
            }),
        foreign_keys_enforced: config.enforce_foreign_keys,
        schema: None,
        error: None,
        tables: Vec::new(),
    };

    if !sqlite_exists {
        return info;
    }

    let db = match DatabaseConn::open_read_only(&sqlite_path) {
        Ok(db) => db,
        Err(e) => {
            info.error = Some(e.to_string());
            return info;
        }
    };

    match SchemaManager::new(&db.conn).check_status() {
        Ok(status) => info.schema = Some(status),
        Err(e) => {
            info.error = Some(e.to_string());
            return info;
        }
    }

    match table_infos(&db) {
        Ok(tables) => info.tables = tables,
        Err(e) => info.error = Some(e.to_string()),
    }

    info
}

/// Existence and row count of every table, failing on the first read error
fn table_infos(db: &DatabaseConn) -> Result<Vec<TableInfo>> {
    Table::ALL
        .iter()
        .map(|table| -> Result<TableInfo> {
            let exists = db.table_exists(table.name())?;
            let row_count = if exists {
                Some(db.table_count(table.name())?)
            } else {
                None
            };
            Ok(TableInfo {
                name: table.name().to_string(),
                exists,
                row_count,
            })
        })
        .collect()
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
