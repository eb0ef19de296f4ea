//! ip2loc-feed - serve IP2Location range records over HTTP
//!
//! Usage examples
//! --------------
//!
//! - Serve on the default address, fetching from the default upstream
//!   $ ip2loc-feed
//!
//! - Serve with a config file and a different upstream
//!   $ ip2loc-feed --config ip2loc-feed.toml --upstream http://archive.internal:4000
//!
//! - Parse a local archive once and print the records as NDJSON
//!   $ ip2loc-feed dump --file IP2LOCATION-LITE-DB3.IPV6.CSV.zip

use clap::{Parser, Subcommand};
use ip2loc_feed::api::routes::encode_records;
use ip2loc_feed::{ArchiveSource, Config, Pipeline, fetch_archive, run_with_shutdown};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ip2loc-feed", version, about)]
struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the upstream archive URL
    #[arg(long, global = true)]
    upstream: Option<String>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "ip2loc_feed=debug")
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the record feed over HTTP (default)
    Serve {
        /// Override the bind address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run the pipeline once and write NDJSON records to stdout
    Dump {
        /// Read the archive from a local file instead of the upstream server
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    if let Err(e) = main_impl(args).await {
        error!(kind = e.kind(), "{e}");
        std::process::exit(1);
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn main_impl(args: CliArgs) -> ip2loc_feed::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = args.upstream {
        config.upstream.url = url;
    }

    match args.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            config.validate()?;
            run_with_shutdown(config).await
        }
        Commands::Dump { file } => {
            config.validate()?;
            let source = match file {
                Some(path) => ArchiveSource::new(std::fs::read(&path)?),
                None => fetch_archive(&config.upstream).await?,
            };

            let summary = Pipeline::from_config(&config.pipeline).run(source).await?;
            let body = encode_records(&summary.records)?;

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&body)?;
            stdout.flush()?;
            Ok(())
        }
    }
}
