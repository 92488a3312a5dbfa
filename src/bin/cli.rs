//! StratumKV CLI
//!
//! Local inspection and maintenance of a store directory. Opens the store
//! in-process, runs one command, closes it.

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stratumkv::{Config, DatabaseHandle, Entry, KeyValueStore};
use tracing_subscriber::{fmt, EnvFilter};

/// StratumKV CLI
#[derive(Parser, Debug)]
#[command(name = "stratumkv-cli")]
#[command(about = "Inspect and maintain a StratumKV store")]
#[command(version)]
struct Args {
    /// Parent directory of the store
    #[arg(short, long, default_value = "./stratumkv_data")]
    parent: String,

    /// Subdirectory under the parent
    #[arg(short, long, default_value = "database")]
    directory: String,

    /// Store name
    #[arg(short, long, default_value = "default")]
    name: String,

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
    Put {
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

    /// Entries at or before a key, descending
    Prev {
        key: String,

        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Entries after a key, ascending
    Next {
        key: String,

        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Values from the smallest key forward
    Earliest {
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Values from the largest key backward
    Latest {
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Count all entries
    Count,

    /// Wipe the store and reopen it empty
    Reset,

    /// Delete the store from disk
    Destroy,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stratumkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .parent_dir(&args.parent)
        .directory(&args.directory)
        .name(&args.name)
        .build();

    tracing::debug!("StratumKV CLI v{}", stratumkv::VERSION);

    if let Err(e) = run(&config, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(config: &Config, command: Commands) -> stratumkv::Result<()> {
    let handle = Arc::new(DatabaseHandle::from_config(config));
    let store = KeyValueStore::with_policies(
        Arc::clone(&handle),
        config.read_error_policy,
        config.batch_retry,
    );

    match command {
        Commands::Get { key } => match store.read(key.as_bytes()).into_result()? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            store.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Prev { key, limit } => print_entries(&store.get_prev(key.as_bytes(), limit)?),
        Commands::Next { key, limit } => print_entries(&store.get_next(key.as_bytes(), limit)?),
        Commands::Earliest { limit } => print_values(&store.get_values_earliest(limit)?),
        Commands::Latest { limit } => print_values(&store.get_values_latest(limit)?),
        Commands::Count => println!("{}", store.get_total()?),
        Commands::Reset => {
            handle.reset()?;
            println!("OK");
        }
        Commands::Destroy => {
            handle.close();
            handle.destroy(handle.path());
            println!("OK");
        }
    }

    handle.close();
    Ok(())
}

fn print_entries(entries: &[Entry]) {
    for entry in entries {
        println!(
            "{}\t{}",
            String::from_utf8_lossy(&entry.key),
            String::from_utf8_lossy(&entry.value)
        );
    }
}

fn print_values(values: &[Vec<u8>]) {
    for value in values {
        println!("{}", String::from_utf8_lossy(value));
    }
}
