use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use bucket_kv::{BucketStore, SledBackend};
use clap::{AppSettings, Parser, Subcommand};
use log::debug;

#[derive(Parser)]
#[clap(name = "bucket-kv", author, version)]
#[clap(about = "Key/value buckets stored as records in a local sled database", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Directory of the sled database, defaults to the current directory
    #[clap(long, env = "BUCKET_KV_DIR", parse(from_os_str))]
    dir: Option<PathBuf>,

    /// Application name recorded on new buckets
    #[clap(long, env = "BUCKET_KV_APP", default_value = "bucket-kv")]
    app: String,

    /// Bucket to operate on
    #[clap(long, env = "BUCKET_KV_BUCKET")]
    bucket: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Put {
        #[clap(required = true)]
        key: String,
        #[clap(required = true)]
        value: String,
    },
    /// Print the value stored under a key
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Get {
        #[clap(required = true)]
        key: String,
    },
    /// Remove a key
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Rm {
        #[clap(required = true)]
        key: String,
    },
    /// Print every entry whose key starts with a prefix, as JSON
    Ls { prefix: Option<String> },
    /// Delete the bucket and all of its entries
    Teardown,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    debug!("bucket-kv version: {:?}", env!("CARGO_PKG_VERSION"));
    debug!("bucket {:?} of app {:?} in {:?}", args.bucket, args.app, dir);

    let store = BucketStore::new(SledBackend::open(dir)?, args.app, args.bucket)?;

    match &args.command {
        Commands::Put { key, value } => store.put(key, value.as_bytes())?,
        Commands::Get { key } => match store.get(key) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(e) if e.is_not_found() => {
                println!("Key not found");
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
        Commands::Rm { key } => store.delete(key)?,
        Commands::Ls { prefix } => {
            let entries: BTreeMap<String, String> = store
                .list(prefix.as_deref().unwrap_or(""))?
                .into_iter()
                .map(|(key, value)| (key, String::from_utf8_lossy(&value).into_owned()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Teardown => store.teardown()?,
    }

    Ok(())
}
