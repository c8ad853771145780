//! walkv CLI
//!
//! Command-line interface for operating on a walkv WAL file directly.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use walkv::wal::{LogEnd, Operation, WalReader, WalRecovery};
use walkv::{Config, Store, SyncPolicy};

/// walkv CLI
#[derive(Parser, Debug)]
#[command(name = "walkv-cli")]
#[command(about = "CLI for the walkv embedded key-value store")]
#[command(version)]
struct Args {
    /// Write-ahead log file
    #[arg(short, long, default_value = "write_ahead.log")]
    wal: PathBuf,

    /// Give up on a contended WAL lock after this many milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Sync only every N writes instead of after every write
    #[arg(long)]
    sync_every: Option<usize>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys and counters
    Stats,

    /// Check the log without modifying it
    Verify,

    /// Print every record in the log
    Dump,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.log_file.as_ref()) {
        eprintln!("Failed to open log file: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,walkv=debug"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn run(args: Args) -> walkv::Result<ExitCode> {
    let config = store_config(&args);

    match args.command {
        Commands::Verify => verify(&args.wal),
        Commands::Dump => dump(&args.wal),
        Commands::Get { key } => with_store(config, |store| get(store, &key)),
        Commands::Set { key, value } => with_store(config, |store| set(store, &key, &value)),
        Commands::Del { key } => with_store(config, |store| del(store, &key)),
        Commands::Stats => with_store(config, stats),
    }
}

fn store_config(args: &Args) -> Config {
    let mut builder = Config::builder().wal_path(&args.wal);
    if let Some(ms) = args.lock_timeout_ms {
        builder = builder.lock_timeout(Duration::from_millis(ms));
    }
    if let Some(count) = args.sync_every {
        builder = builder.sync_policy(SyncPolicy::EveryNEntries { count });
    }
    builder.build()
}

/// Open (and recover) the store, run `f`, then close it
fn with_store<F>(config: Config, f: F) -> walkv::Result<ExitCode>
where
    F: FnOnce(&Store) -> walkv::Result<ExitCode>,
{
    let store = Store::open(config)?;
    let code = f(&store)?;
    store.close()?;
    Ok(code)
}

fn get(store: &Store, key: &str) -> walkv::Result<ExitCode> {
    match store.get(key.as_bytes())? {
        Some(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("(nil)");
            Ok(ExitCode::from(1))
        }
    }
}

fn set(store: &Store, key: &str, value: &str) -> walkv::Result<ExitCode> {
    store.set(key.as_bytes(), value.as_bytes())?;
    println!("OK");
    Ok(ExitCode::SUCCESS)
}

fn del(store: &Store, key: &str) -> walkv::Result<ExitCode> {
    if store.delete(key.as_bytes())? {
        println!("OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("(nil)");
        Ok(ExitCode::from(1))
    }
}

fn stats(store: &Store) -> walkv::Result<ExitCode> {
    let stats = store.stats();
    for key in store.keys() {
        println!("{}", String::from_utf8_lossy(&key));
    }
    println!("live keys:  {}", stats.live_keys);
    println!("tombstones: {}", stats.tombstones);
    println!("wal bytes:  {}", stats.wal_bytes);
    Ok(ExitCode::SUCCESS)
}

fn verify(wal: &Path) -> walkv::Result<ExitCode> {
    let report = WalRecovery::verify(wal)?;
    println!("records:   {}", report.records_replayed);
    println!("sets:      {}", report.sets);
    println!("deletes:   {}", report.deletes);
    println!("valid len: {}", report.valid_len);
    if report.was_truncated() {
        println!("torn tail: {} bytes", report.truncated_bytes);
    }
    Ok(ExitCode::SUCCESS)
}

fn dump(wal: &Path) -> walkv::Result<ExitCode> {
    let reader = WalReader::open(wal, None)?;
    let mut entries = reader.entries()?;
    for item in entries.by_ref() {
        let (offset, entry) = item?;
        let key = String::from_utf8_lossy(entry.key());
        match &entry.operation {
            Operation::Set { value, .. } => println!(
                "{:>10}  {}  SET {} {}",
                offset,
                entry.timestamp,
                key,
                String::from_utf8_lossy(value)
            ),
            Operation::Delete { .. } => {
                println!("{:>10}  {}  DEL {}", offset, entry.timestamp, key)
            }
        }
    }
    if let Some(LogEnd::TruncatedTail { offset }) = entries.end() {
        println!("{:>10}  (incomplete record)", offset);
    }
    Ok(ExitCode::SUCCESS)
}
