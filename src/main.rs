use clap::{Parser, Subcommand};
use invoice_lines::{
    Config, CorrectionStore, Engine, RawLine, SqliteCorrectionStore, apply_correction,
    parse_format,
};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "invoice-lines", version, about = "Interpret vendor invoice lines")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Correction database, overriding `db_path` from the config.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log filter (RUST_LOG syntax); RUST_LOG wins when set.
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Process a JSON array of extracted lines and print the result.
    Process {
        /// JSON file with the raw line objects.
        lines: PathBuf,
        #[arg(long)]
        vendor: String,
    },
    /// Learn the format of an item for a vendor.
    Correct {
        #[arg(long)]
        vendor: String,
        /// Item code.
        #[arg(long, required_unless_present = "name", conflicts_with = "name")]
        item: Option<String>,
        /// Item name, for vendors whose lines carry no code.
        #[arg(long)]
        name: Option<String>,
        /// Confirmed format, e.g. "2/5LB" or "100CT".
        #[arg(long)]
        format: String,
    },
    /// List learned corrections for a vendor.
    Corrections {
        #[arg(long)]
        vendor: String,
    },
    /// Show how a format string is read.
    Parse { text: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // init tracing; stdout is reserved for JSON output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = Config::load_or_default(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| PathBuf::from(&cfg.db_path));

    match cli.command {
        Command::Parse { text } => {
            println!("{}", serde_json::to_string_pretty(&parse_format(&text))?);
        }
        Command::Process { lines, vendor } => {
            let store = SqliteCorrectionStore::new(&db_path)?;
            let values: Vec<Value> = serde_json::from_str(&fs::read_to_string(&lines)?)?;
            let engine = Engine::new(&store, &cfg);
            let result = engine.process_values(&vendor, &values, None);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Correct {
            vendor,
            item,
            name,
            format,
        } => {
            let store = SqliteCorrectionStore::new(&db_path)?;
            let line = RawLine::for_item(item, name);
            let entry = apply_correction(&store, &vendor, &line, &format)?;
            info!(vendor = %vendor, format = %entry.format, total = entry.total_value, "Learned");
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Corrections { vendor } => {
            let store = SqliteCorrectionStore::new(&db_path)?;
            let mut entries = serde_json::Map::new();
            for (item, entry) in store.list_corrections(&vendor)? {
                entries.insert(item, serde_json::to_value(entry)?);
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
