//! Burrow client binary
//!
//! Run with: cargo run --bin burrow-client -- --host 10.0.0.1 get ~/notes.txt

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use burrow_client::Client;
use burrow_core::protocol::DEFAULT_PORT;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Username used by the server for `~` expansion (defaults to $USER)
    #[arg(short, long)]
    username: Option<String>,

    /// Seconds to wait for the connection to be established
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a file
    Get {
        /// Remote file path
        remote: String,
        /// Local directory to save into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Upload a file
    Put {
        /// Local file path
        local: PathBuf,
        /// Remote target path (defaults to the local file name)
        remote: Option<String>,
    },
    /// List directory contents
    Ls {
        /// Remote directory path
        remote: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let username = args
        .username
        .or_else(|| std::env::var("USER").ok().filter(|user| !user.is_empty()))
        .unwrap_or_else(|| "root".to_string());
    let client = Client::new(args.host, args.port, username)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout));

    match args.command {
        Commands::Get { remote, output_dir } => {
            let saved = client
                .download(&remote, &output_dir)
                .await
                .with_context(|| format!("Download of {remote} failed"))?;
            println!("{}", saved.display());
        }
        Commands::Put { local, remote } => {
            let sent = client
                .upload(&local, remote.as_deref())
                .await
                .with_context(|| format!("Upload of {} failed", local.display()))?;
            println!("{sent} bytes sent");
        }
        Commands::Ls { remote } => {
            let names = client
                .list(&remote)
                .await
                .with_context(|| format!("Listing of {remote} failed"))?;
            for name in names {
                println!("{}", String::from_utf8_lossy(&name));
            }
        }
    }

    Ok(())
}
