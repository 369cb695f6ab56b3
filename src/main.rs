//! ctf-gallery: run the public gallery, the admin API, or check a URL
//! against the SSRF filter.
//!
//! Usage:
//!   cargo run -- public-app
//!   cargo run -- admin-api --bind 127.0.0.1:9000
//!   cargo run -- check-url 'http://localhost:9000/admin'

use anyhow::Result;
use clap::{Parser, Subcommand};
use ctf_gallery::{
    admin,
    config::{Config, RuntimeConfig},
    public::{self, proxy},
    ssrf::SystemResolver,
};
use serde_json::json;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ctf-gallery")]
#[command(about = "Image gallery, fetch proxy and admin API for the SSRF/SSTI training lab", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the image gallery and the /fetch proxy
    PublicApp {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Serve the internal admin API
    AdminApi {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Print the SSRF filter verdict for a URL without fetching it
    CheckUrl {
        /// Target exactly as it would appear in /fetch?url=
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(RuntimeConfig::load_from_env().log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    match cli.command {
        Commands::PublicApp { bind } => {
            if let Some(bind) = bind {
                config.public.bind = bind;
            }
            public::start_public_server(config.public).await?;
        }
        Commands::AdminApi { bind } => {
            if let Some(bind) = bind {
                config.admin.bind = bind;
            }
            admin::start_admin_server(config.admin).await?;
        }
        Commands::CheckUrl { url } => check_url(&config, &url).await?,
    }
    Ok(())
}

async fn check_url(config: &Config, raw: &str) -> Result<()> {
    let policy = config.ssrf_policy()?;
    let target = proxy::resolve_target(raw, &config.public)?;
    let verdict = proxy::check_target(&target, &policy, &SystemResolver).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "target": target.url.as_str(),
            "port": target.port,
            "verdict": verdict,
        }))?
    );
    Ok(())
}
