//! Clio - query expansion proxy
//!
//! Runs a keyword query against an Elasticsearch-compatible engine, then
//! replaces the result set with a more-like-this expansion seeded by the top
//! hits. Also discovers significant keywords and streams large result sets.

mod commands;
mod core;
mod error;
mod gateway;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{keywords, search as search_cmd, serve, stream, QueryArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clio")]
#[command(about = "Clio - query expansion for keyword search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expanded search
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Page size
        #[arg(short, long, default_value_t = 10)]
        limit: u64,

        /// Offset into the expanded results
        #[arg(long)]
        offset: Option<u64>,

        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Discover significant keywords for a query
    Keywords {
        #[command(flatten)]
        query: QueryArgs,

        /// Number of keywords to return
        #[arg(long)]
        max_terms: Option<usize>,

        /// Documents sampled per shard
        #[arg(long)]
        sample_size: Option<u64>,

        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Stream every expanded result as JSON lines
    Stream {
        #[command(flatten)]
        query: QueryArgs,

        /// Documents per scroll page
        #[arg(long)]
        chunk_size: Option<u64>,
    },

    /// Run the HTTP gateway
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Search { query, limit, offset, json } => {
            search_cmd::run(query, *limit, *offset, *json).await?;
        }
        Commands::Keywords { query, max_terms, sample_size, json } => {
            keywords::run(query, *max_terms, *sample_size, *json).await?;
        }
        Commands::Stream { query, chunk_size } => {
            stream::run(query, *chunk_size).await?;
        }
        Commands::Serve { host, port } => {
            serve::run(host.clone(), *port).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let c = core::config::load_config()?;
                println!("{:#?}", c);
            }
            ConfigAction::Path => println!("{}", core::config::default_config_path().display()),
        },
    }

    Ok(())
}
