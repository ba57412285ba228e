//! UEN registry sync CLI
//!
//! - `fetch`: dump the ACRA UEN collection from data.gov.sg
//! - `local` / `analyze`: inspect dumped records
//! - `network` / `remote`: read-only checks against the registry contract
//! - `upload`: reconcile local records into the registry

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod data;
mod upload;

use config::{ChainArgs, FileConfig};

#[derive(Parser)]
#[command(name = "uen")]
#[command(author, version, about = "Sync Singapore UEN records into an on-chain registry")]
struct Cli {
    /// JSON config file; its values fill any flag left unset.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show library logs (`info`), unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// No logs at all.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every child dataset of the UEN collection, keeping live entities.
    Fetch {
        /// Output directory [default: <data-root>/full_uen_filtered_list]
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Data root (used when --out-dir is not given).
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Collection id.
        #[arg(long, default_value = uen_opendata::ACRA_UEN_COLLECTION)]
        collection: String,

        /// Delay before each request in milliseconds [default: 1000]
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Records per datastore_search page [default: 20000]
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Load the local dataset and summarise it.
    Local {
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Use the full dump instead of the sample set.
        #[arg(long)]
        full: bool,
    },

    /// Identifier shape statistics over a directory of dump files.
    Analyze {
        /// [default: <data-root>/full_uen_filtered_list]
        dir: Option<PathBuf>,
    },

    /// Check the RPC endpoint and print its chain id.
    Network {
        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Read-only queries against the registry contract.
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Upload local records missing from the registry.
    Upload(upload::UploadArgs),
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Count stored identifiers and print the first few with their names.
    List {
        #[command(flatten)]
        chain: ChainArgs,

        /// How many identifiers to print with names.
        #[arg(long, default_value_t = 10)]
        names: usize,
    },
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    let file = FileConfig::load_optional(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            out_dir,
            data_root,
            collection,
            delay_ms,
            page_size,
        } => data::cmd_fetch(
            &file,
            out_dir,
            data_root.as_deref(),
            &collection,
            delay_ms,
            page_size,
        ),
        Commands::Local { data_root, full } => data::cmd_local(&file, data_root.as_deref(), full),
        Commands::Analyze { dir } => data::cmd_analyze(&file, dir),
        Commands::Network { chain } => upload::cmd_network(&file, &chain),
        Commands::Remote { command } => match command {
            RemoteCommands::List { chain, names } => upload::cmd_remote_list(&file, &chain, names),
        },
        Commands::Upload(args) => upload::cmd_upload(&file, &args),
    }
}
