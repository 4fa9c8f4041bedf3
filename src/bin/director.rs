//! Director binary

use clap::{Parser, Subcommand};
use fedplane::{common::Config, Director};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fedplane-director")]
#[command(about = "fedplane director: server overrides, listing and quorum object lookups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start director server
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Config file (defaults to $FEDPLANE_CONFIG, then fedplane.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Extra statically filtered server URLs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        filtered: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            id,
            config,
            bind,
            filtered,
        } => {
            // Load config from file, then override with CLI arguments
            let config = match config {
                Some(path) => Config::load_from(&path)?,
                None => Config::load()?,
            };

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut director_config = config.director.unwrap_or_default();
            if let Some(bind) = bind {
                director_config.bind_addr = bind;
            }
            director_config.filtered_servers.extend(filtered);

            let node_id = id.unwrap_or(config.node_id);
            Director::new(director_config, node_id).serve().await?;
        }
    }

    Ok(())
}
