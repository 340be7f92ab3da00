//! dbi: the RT Analytics database CLI
//!
//! # Usage
//!
//! ```bash
//! # Dump a table to CSV
//! dbi dump rt_staff staff.csv
//!
//! # Run a query
//! dbi query "SELECT utln, email FROM rt_staff WHERE active = ?" --bind true
//!
//! # Upsert a CSV by primary key
//! dbi load staff.csv rt_staff --mode upsert
//! ```

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dbi::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbi")]
#[command(author = "RT Analytics")]
#[command(version)]
#[command(about = "Query, load and dump RT Analytics tables", long_about = None)]
#[command(after_help = "EXAMPLES:
    dbi dump rt_staff staff.csv
    dbi query 'SELECT COUNT(*) FROM rt_staff' --format json
    dbi query --file purge.sql --set table=rt_staff --set term=2024F
    dbi load staff.csv rt_staff --mode upsert --match-col utln
    dbi lookup email jdoe01")]
struct Cli {
    /// Database user
    #[arg(long, env = "RT_DB_USERNAME", global = true)]
    user: Option<String>,

    /// Database password
    #[arg(long, env = "RT_DB_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Server host, optionally host:port
    #[arg(long, env = "RT_DB_SERVER", global = true)]
    server: Option<String>,

    /// Database name (file path for sqlite)
    #[arg(long, env = "RT_DB", global = true)]
    database: Option<String>,

    /// postgres, mysql, mssql or sqlite
    #[arg(long, env = "RT_DB_FLAVOR", global = true)]
    flavor: Option<Flavor>,

    /// Echo SQL statements
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ./dbi.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum LoadMode {
    Append,
    Replace,
    Upsert,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a table to CSV
    Dump {
        /// Name of the SQL table
        table: String,
        /// Path to the output CSV
        csv: PathBuf,
    },
    /// Run SQL from the command line or a file
    Query {
        /// SQL text
        sql: Option<String>,

        /// Read SQL from a file; {name} placeholders are filled from --set
        #[arg(long, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// Template values as key=value
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,

        /// Parameter bindings, in placeholder order
        #[arg(short, long, value_delimiter = ',')]
        bind: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Load a CSV into a table
    Load {
        csv: PathBuf,
        table: String,

        #[arg(long, value_enum, default_value = "append")]
        mode: LoadMode,

        /// Upsert match column (repeatable); defaults to the primary key
        #[arg(long = "match-col")]
        match_cols: Vec<String>,

        /// Keep existing rows on key conflicts instead of updating them
        #[arg(long)]
        ignore_conflicts: bool,
    },
    /// Count the rows of a table
    Count { table: String },
    /// Latest value of a date column (now, if the table is empty)
    LastDate { table: String, date_col: String },
    /// Check whether a table exists
    HasTable { table: String },
    /// Directory lookups
    Lookup {
        #[command(subcommand)]
        what: LookupCommand,
    },
}

#[derive(Subcommand)]
enum LookupCommand {
    /// Email address of a UTLN
    Email { utln: String },
    /// Identities for a UTLN
    Utln { utln: String },
    /// Identities for an email address
    ByEmail { email: String },
    /// Full directory profile of a UTLN
    Profile { utln: String },
    /// Course catalog entries
    Course { catalog_no: String },
    /// Mapping for a TechConnect tag
    Tag { tag: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dbi=debug" } else { "dbi=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let overrides = DatabaseSettings {
        user: cli.user.clone(),
        password: cli.password.clone(),
        server: cli.server.clone(),
        database: cli.database.clone(),
        flavor: cli.flavor,
        verbose: cli.verbose.then_some(true),
    };
    let spec = settings.database.clone().merge(overrides).to_spec();

    if cli.verbose {
        eprintln!("{} {}", "Connecting to:".dimmed(), spec.redacted_url());
    }
    let db = Database::connect(&spec)
        .await
        .with_context(|| format!("connecting to {}", spec.redacted_url()))?;

    let result = dispatch(cli, &db, &settings).await;
    db.close().await;
    result
}

async fn dispatch(cli: &Cli, db: &Database, settings: &Settings) -> Result<()> {
    match &cli.command {
        Commands::Dump { table, csv } => {
            let rows = dump_table(db, table, csv).await?;
            println!(
                "{} {} rows from {} to {}",
                "✓".green(),
                rows,
                table.cyan(),
                csv.display()
            );
        }
        Commands::Query {
            sql,
            file,
            set,
            bind,
            format,
        } => {
            if let Some(path) = file {
                let values: HashMap<String, String> = set.iter().cloned().collect();
                let affected = db.execute_sql_file(path, &values).await?;
                println!("{} {} rows affected", "✓".green(), affected);
                return Ok(());
            }
            let sql = sql
                .as_deref()
                .ok_or_else(|| anyhow!("provide SQL text or --file"))?;
            let params: Vec<Value> = bind.iter().map(|b| parse_binding(b)).collect();
            if returns_rows(sql) {
                let frame = db.read_sql(sql, &params).await?;
                format_output(&frame, *format)?;
            } else {
                let affected = db.execute(sql, &params).await?;
                println!("{} {} rows affected", "✓".green(), affected);
            }
        }
        Commands::Load {
            csv,
            table,
            mode,
            match_cols,
            ignore_conflicts,
        } => {
            let frame = Frame::read_csv(csv)
                .with_context(|| format!("reading {}", csv.display()))?;
            let written = match mode {
                LoadMode::Append => db.append_frame(&frame, table).await?,
                LoadMode::Replace => db.replace_frame(&frame, table).await?,
                LoadMode::Upsert => {
                    let mut options = UpsertOptions::default();
                    if !match_cols.is_empty() {
                        options.match_columns = Some(match_cols.clone());
                    }
                    if *ignore_conflicts {
                        options = options.ignore_conflicts();
                    }
                    db.upsert_frame(&frame, table, &options).await?
                }
            };
            println!(
                "{} {} rows read, {} affected in {}",
                "✓".green(),
                frame.len(),
                written,
                table.cyan()
            );
        }
        Commands::Count { table } => {
            println!("{}", db.record_count(table).await?);
        }
        Commands::LastDate { table, date_col } => {
            println!("{}", db.check_last_date(date_col, table).await?);
        }
        Commands::HasTable { table } => {
            if db.has_table(table).await? {
                println!("{} {} exists", "✓".green(), table.cyan());
            } else {
                println!("{} {} not found", "✗".red(), table.cyan());
            }
        }
        Commands::Lookup { what } => {
            let client = LookupClient::with_config(db.clone(), settings.lookup.clone());
            lookup(&client, what).await.map_err(|e| anyhow!("[{}] {}", e.code(), e))?;
        }
    }
    Ok(())
}

async fn lookup(client: &LookupClient, what: &LookupCommand) -> Result<(), LookupError> {
    match what {
        LookupCommand::Email { utln } => println!("{}", client.get_email(utln).await?),
        LookupCommand::Utln { utln } => print_json(&client.utln_lookup(utln).await?),
        LookupCommand::ByEmail { email } => print_json(&client.email_lookup(email).await?),
        LookupCommand::Profile { utln } => print_json(&client.person_profile(utln).await?),
        LookupCommand::Course { catalog_no } => {
            print_json(&client.course_lookup(catalog_no).await?)
        }
        LookupCommand::Tag { tag } => print_json(&client.tag_from_techconnect(tag).await?),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Numbers, booleans, then text.
fn parse_binding(binding: &str) -> Value {
    if let Ok(n) = binding.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = binding.parse::<f64>() {
        Value::Float(f)
    } else if binding == "true" {
        Value::Bool(true)
    } else if binding == "false" {
        Value::Bool(false)
    } else {
        Value::from(binding)
    }
}

fn returns_rows(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(
        first.as_str(),
        "select" | "with" | "show" | "pragma" | "values" | "explain" | "describe" | "desc"
    )
}

fn format_output(frame: &Frame, format: OutputFormat) -> Result<()> {
    if frame.is_empty() && !matches!(format, OutputFormat::Csv) {
        println!("{}", "(no results)".dimmed());
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&frame.to_records()),
        OutputFormat::Csv => frame.to_csv_writer(std::io::stdout().lock())?,
        OutputFormat::Table => {
            let columns = frame.columns();
            let cells: Vec<Vec<String>> = frame
                .rows()
                .iter()
                .map(|row| row.iter().map(Value::to_string).collect())
                .collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
            for row in &cells {
                for (w, cell) in widths.iter_mut().zip(row) {
                    *w = (*w).max(cell.chars().count());
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v, width = w))
                    .collect();
                println!("{}", line.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", frame.len().to_string().cyan());
        }
    }
    Ok(())
}
