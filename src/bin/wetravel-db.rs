use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::settings::Style;
use tabled::Tabled;
use tracing_subscriber::EnvFilter;
use wetravel_db::*;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.wetravel/wetravel.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty
    #[clap(short, long, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing tables in the database file (default)
    Init,

    /// Show the database file, schema state and row counts
    Status,

    /// Print the CREATE TABLE statements
    Schema {
        /// Only print this table: users, posts, locations, comments, likes, trips
        #[clap(value_name = "TABLE")]
        table: Option<Table>,
    },
}

#[derive(Tabled)]
struct TableRow {
    table: String,
    exists: String,
    rows: String,
}

#[derive(Serialize)]
struct SchemaEntry {
    table: Table,
    sql: String,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match WeTravelConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Init) {
        Commands::Init => run_init(&config, cli.format),
        Commands::Status => run_status(&config, cli.format),
        Commands::Schema { table } => run_schema(table, cli.format),
    }
}

fn run_init(config: &WeTravelConfig, output_format: OutputFormat) -> ExitCode {
    let streaming = !output_format.is_json();
    if streaming {
        println!("Connecting to database {}", config.sqlite_path());
    }

    let report = match initialize_database_with(config, |table| {
        if streaming {
            println!("{}", table);
        }
    }) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if output_format.is_json() {
        return print_json(&report, output_format);
    }
    ExitCode::SUCCESS
}

fn run_status(config: &WeTravelConfig, output_format: OutputFormat) -> ExitCode {
    let info = get_sqlite_info(config);

    if output_format.is_json() {
        return print_json(&info, output_format);
    }

    println!("WeTravel Database Status");
    println!("========================\n");
    println!("  Path:           {}", info.path);
    if !info.exists {
        println!("  Status:         not created (run: wetravel-db init)");
        return ExitCode::SUCCESS;
    }
    if let Some(size) = info.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    if let Some(ref modified) = info.last_modified {
        println!("  Modified:       {}", modified);
    }
    println!(
        "  Foreign keys:   {}",
        if info.foreign_keys_enforced {
            "enforced"
        } else {
            "not enforced"
        }
    );
    if let Some(ref error) = info.error {
        println!("  Error:          {}", error);
        return ExitCode::FAILURE;
    }
    if let Some(ref schema) = info.schema {
        println!("  Schema:         {}", schema);
    }
    println!();

    let rows: Vec<TableRow> = info
        .tables
        .iter()
        .map(|t| TableRow {
            table: t.name.clone(),
            exists: if t.exists { "yes" } else { "no" }.to_string(),
            rows: t
                .row_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = tabled::Table::new(rows);
    match output_format {
        OutputFormat::Markdown => table.with(Style::markdown()),
        _ => table.with(Style::rounded()),
    };
    println!("{}", table);
    ExitCode::SUCCESS
}

fn run_schema(only: Option<Table>, output_format: OutputFormat) -> ExitCode {
    let entries: Vec<SchemaEntry> = Table::ALL
        .into_iter()
        .filter(|t| only.map_or(true, |o| o == *t))
        .map(|table| SchemaEntry {
            table,
            sql: format_ddl(table.create_sql()),
        })
        .collect();

    if output_format.is_json() {
        return print_json(&entries, output_format);
    }

    for entry in &entries {
        println!("{}\n", entry.sql);
    }
    ExitCode::SUCCESS
}

fn print_json<T: Serialize>(value: &T, output_format: OutputFormat) -> ExitCode {
    match output_format.to_json(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Re-indent a statement from `SchemaDefinitions` for display
fn format_ddl(sql: &str) -> String {
    sql.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            if l.starts_with("CREATE") || l.starts_with(')') {
                l.to_string()
            } else {
                format!("    {}", l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
