//! docshelf CLI
//!
//! Command-line access to a file-backed shelf. Values are JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docshelf::store::FileBackend;
use docshelf::{Shelf, ShelfConfig, StoreBackend};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// docshelf CLI
#[derive(Parser, Debug)]
#[command(name = "docshelf")]
#[command(about = "Dictionary-style access to a document database")]
#[command(version)]
struct Args {
    /// Root directory of the file store
    #[arg(short, long, default_value = "./docshelf_data")]
    data_dir: PathBuf,

    /// Database name
    #[arg(long, default_value = "shelve")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value of a key
    Get {
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        key: String,

        /// The value, as JSON (e.g. '[1, 2]' or '"text"')
        value: String,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// List all keys
    Keys,

    /// List all key/value pairs
    Items,

    /// Print the number of keys
    Len,

    /// Create the database
    Createdb,

    /// Delete the database and everything in it
    Deletedb,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,docshelf=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> docshelf::Result<()> {
    let backend = FileBackend::new(args.data_dir.clone());
    tracing::debug!("docshelf v{} on {}", docshelf::VERSION, args.data_dir.display());

    match args.command {
        Commands::Createdb => return backend.create_db(&args.db),
        Commands::Deletedb => return backend.delete_db(&args.db),
        _ => {}
    }

    let config = ShelfConfig::builder()
        .location(&args.db)
        .create_if_missing(matches!(args.command, Commands::Set { .. }))
        .build();
    let mut shelf: Shelf<Value, _> = Shelf::open(&backend, config)?;

    match args.command {
        Commands::Get { key } => println!("{}", shelf.get(&key)?),
        Commands::Set { key, value } => {
            let value: Value = docshelf::codec::decode(&value)?;
            shelf.set(&key, value)?;
        }
        Commands::Del { key } => shelf.delete(&key)?,
        Commands::Keys => {
            for key in shelf.keys()? {
                println!("{}", key);
            }
        }
        Commands::Items => {
            for item in shelf.items()? {
                let (key, value) = item?;
                println!("{}\t{}", key, value);
            }
        }
        Commands::Len => println!("{}", shelf.len()?),
        Commands::Createdb | Commands::Deletedb => {}
    }

    shelf.close()
}
