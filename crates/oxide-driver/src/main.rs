//! oxide-sql CLI
//!
//! Runs statements against a configured connection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_driver::{ConnectionConfig, Driver, ReconnectPolicy, TracingMonitor};
use oxide_query::{Params, SqlValue};

/// Run SQL through the oxide driver.
#[derive(Parser)]
#[command(name = "oxide-sql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Connection configuration file (JSON object).
    #[arg(short, long, env = "OXIDE_SQL_CONFIG", conflicts_with = "connection")]
    config: Option<PathBuf>,

    /// Inline connection configuration (JSON object).
    #[arg(long, env = "OXIDE_SQL_CONNECTION")]
    connection: Option<String>,

    /// Reconnect after a lost connection, pausing this many seconds between
    /// attempts.
    #[arg(long, env = "OXIDE_SQL_RECONNECT")]
    reconnect: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print its rows.
    Query {
        /// SQL text; `:name` placeholders take values from --param.
        sql: String,

        /// Named parameter as `name=value`.
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, SqlValue)>,

        /// Print rows as JSON objects.
        #[arg(long)]
        json: bool,
    },

    /// Run a statement and print the number of affected rows.
    Exec {
        /// SQL text; `:name` placeholders take values from --param.
        sql: String,

        /// Named parameter as `name=value`.
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, SqlValue)>,
    },
}

/// Parses `name=value`; integers and floats keep their type, `null` is NULL.
fn parse_param(arg: &str) -> Result<(String, SqlValue), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {arg}"))?;
    let value = if value.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(n) = value.parse::<i64>() {
        SqlValue::Int(n)
    } else if let Ok(f) = value.parse::<f64>() {
        SqlValue::Float(f)
    } else {
        SqlValue::Text(String::from(value))
    };
    Ok((String::from(name.trim_start_matches(':')), value))
}

fn params(named: Vec<(String, SqlValue)>) -> Params {
    if named.is_empty() {
        Params::None
    } else {
        Params::Named(named)
    }
}

fn render(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::from("NULL"),
        other => other.to_key(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match (&cli.config, &cli.connection) {
        (Some(path), _) => ConnectionConfig::from_file(path)?,
        (None, Some(json)) => ConnectionConfig::from_json(json)?,
        (None, None) => anyhow::bail!("no connection configured: pass --config or --connection"),
    };
    let mut driver = Driver::open(config).context("connecting")?;
    if let Some(seconds) = cli.reconnect {
        driver.set_reconnect_policy(ReconnectPolicy::Unbounded {
            interval: std::time::Duration::from_secs(seconds),
        });
    }
    if cli.verbose {
        driver.set_monitor(Arc::new(TracingMonitor::new().level(Level::DEBUG)));
    }

    match cli.command {
        Commands::Query {
            sql,
            params: named,
            json,
        } => {
            let mut result = driver.query(&sql, params(named))?;
            if json {
                for row in result.to_maps()? {
                    println!("{}", serde_json::to_string(&row)?);
                }
            } else {
                println!("{}", result.columns().join("\t"));
                while let Some(row) = result.next()? {
                    let line = row.values().iter().map(render).collect::<Vec<_>>();
                    println!("{}", line.join("\t"));
                }
            }
            info!("{} row(s)", result.row_count());
        }

        Commands::Exec { sql, params: named } => {
            let affected = driver.exec(&sql, params(named))?;
            println!("{affected}");
            info!(affected, "statement executed");
        }
    }

    Ok(())
}
