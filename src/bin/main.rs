//! reportkit CLI - Run reports against a database
//!
//! Usage:
//!   reportkit run --schema <schema.toml> --entity <Entity> --columns <a,b> [--db <file>]
//!   reportkit columns --schema <schema.toml> --entity <Entity>
//!
//! Examples:
//!   reportkit run --schema crm.toml --db crm.sqlite --entity Company --columns name,quote_count --order quote_count:desc
//!   reportkit run --schema crm.toml --db crm.sqlite --entity Quote --columns id,description --limit 2 --offset 1 --output json
//!   reportkit columns --schema crm.toml --entity Quote

use clap::{Parser, Subcommand, ValueEnum};
use reportkit::config::{ConnectionConfig, Settings};
use reportkit::executor::SqliteExecutor;
use reportkit::report::{Report, ReportContext};
use reportkit::schema::Schema;
use reportkit::sql::SortDir;
use reportkit::table::Table;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(about = "reportkit - tabular reports over relational data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report
    Run {
        /// Path to the schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// SQLite database file (overrides configured connections)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Named connection from the config file
        #[arg(long, conflicts_with = "db")]
        connection: Option<String>,

        /// Config file (default: $REPORTKIT_CONFIG, ./reportkit.toml, user config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Root entity of the report
        #[arg(short, long)]
        entity: String,

        /// Comma-separated column names
        #[arg(short, long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Ordering, `column[:asc|desc]`; repeat or comma-separate
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,

        /// Maximum number of records
        #[arg(long)]
        limit: Option<u64>,

        /// Records to skip (needs a limit)
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// List the columns offered for an entity
    Columns {
        /// Path to the schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Entity to list
        #[arg(short, long)]
        entity: String,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Aligned text table
    Table,
    /// `{version, results, records}` JSON
    Json,
    /// The planned SQL, without running it
    Sql,
}

struct RunArgs {
    schema: PathBuf,
    db: Option<PathBuf>,
    connection: Option<String>,
    config: Option<PathBuf>,
    entity: String,
    columns: Vec<String>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: u64,
    output: OutputFormat,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            schema,
            db,
            connection,
            config,
            entity,
            columns,
            order,
            limit,
            offset,
            output,
        } => cmd_run(RunArgs {
            schema,
            db,
            connection,
            config,
            entity,
            columns,
            order,
            limit,
            offset,
            output,
        }),
        Commands::Columns { schema, entity } => cmd_columns(schema, entity),
    }
}

fn load_schema(path: &Path) -> Option<Schema> {
    match Schema::from_file(path) {
        Ok(schema) => Some(schema),
        Err(e) => {
            eprintln!("Error loading schema '{}': {}", path.display(), e);
            None
        }
    }
}

fn resolve_connection(args: &RunArgs, settings: &Settings) -> Result<ConnectionConfig, String> {
    if let Some(db) = &args.db {
        return Ok(ConnectionConfig::sqlite(db.to_string_lossy()));
    }
    if let Some(name) = &args.connection {
        let conn = settings.get_connection(name).map_err(|e| e.to_string())?;
        return conn.to_config().map_err(|e| e.to_string());
    }
    if let Some((_, conn)) = settings.default_connection() {
        return conn.to_config().map_err(|e| e.to_string());
    }
    ConnectionConfig::from_env().map_err(|e| e.to_string())
}

fn parse_order(spec: &str) -> Result<(String, SortDir), String> {
    match spec.split_once(':') {
        Some((name, dir)) => Ok((name.trim().to_string(), dir.parse::<SortDir>()?)),
        None => Ok((spec.trim().to_string(), SortDir::Asc)),
    }
}

fn cmd_run(args: RunArgs) -> ExitCode {
    let Some(schema) = load_schema(&args.schema) else {
        return ExitCode::FAILURE;
    };

    let settings = match &args.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let executor = match resolve_connection(&args, &settings)
        .and_then(|config| SqliteExecutor::connect(&config).map_err(|e| e.to_string()))
    {
        Ok(exec) => exec,
        Err(e) => {
            eprintln!("Connection error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let order = match args.order.iter().map(|o| parse_order(o)).collect::<Result<Vec<_>, _>>() {
        Ok(order) => order,
        Err(e) => {
            eprintln!("Invalid --order: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let columns: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let ctx = ReportContext::new(Arc::new(executor));
    let mut report = match Report::new(&schema, &args.entity, &columns, &settings.format, ctx) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Report error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let order: Vec<(&str, SortDir)> = order.iter().map(|(n, d)| (n.as_str(), *d)).collect();
    let limit = args.limit.or(settings.report.default_limit);
    let configured = report
        .set_order(&order)
        .and_then(|_| report.limit_offset(limit, args.offset));
    if let Err(e) = configured {
        eprintln!("Report error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match args.output {
        OutputFormat::Sql => report.plan_sql(settings.report.dialect).map(|statements| {
            for sql in statements {
                println!("{};\n", sql);
            }
        }),
        OutputFormat::Json => report.to_ext().map(|ext| {
            println!("{}", serde_json::to_string_pretty(&ext).unwrap_or_default());
        }),
        OutputFormat::Table => report.table().and_then(|table| {
            print_table(table);
            let count = report.count()?;
            println!();
            println!("{} of {} records", table.len(), count);
            Ok(())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Report error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_table(table: &Table) {
    let header: Vec<String> = table.columns().iter().map(|c| c.human_name()).collect();
    let cells = table.formatted();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(&header).trim_end());
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in &cells {
        println!("{}", line(row).trim_end());
    }
}

fn cmd_columns(schema: PathBuf, entity: String) -> ExitCode {
    let Some(schema) = load_schema(&schema) else {
        return ExitCode::FAILURE;
    };

    let names = match schema.column_names(&entity) {
        Ok(names) => names,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Entity: {}", entity);
    println!();
    for name in names {
        match schema.resolve_column(&entity, &name) {
            Ok(col) => {
                let label = col.label.unwrap_or_default();
                println!("  - {} ({:?}) {}", name, col.kind, label);
            }
            Err(e) => println!("  - {} (error: {})", name, e),
        }
    }

    ExitCode::SUCCESS
}
