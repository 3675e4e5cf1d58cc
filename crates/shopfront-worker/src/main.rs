//! shopfront-worker - serve the product site offline-first.
//!
//! Pre-caches the configured asset list from the upstream site, then answers
//! every request from that cache when it can and from the network when it
//! cannot. Point a browser (or the shopfront shell) at the listen address.

mod proxy;
mod startup;
#[cfg(test)]
mod testing;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shopfront_core::{CacheFirstWorker, CacheStorage, HttpFetcher, ShellConfig, WorkerHost};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "shopfront-worker")]
#[command(about = "Offline-first cache in front of the shopfront site")]
struct Args {
    /// Address to listen on (defaults to the configured listen address)
    #[arg(long)]
    listen: Option<String>,

    /// Origin to fetch from (defaults to the configured site address)
    #[arg(long)]
    upstream: Option<String>,

    /// Directory holding the caches
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Print the stored caches and exit
    #[arg(long)]
    list: bool,

    /// Fetch the asset list again even if it is already cached
    #[arg(long)]
    reinstall: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    init_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(debug: bool) {
    // RUST_LOG wins over --debug when set
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.debug);

    let mut config = ShellConfig::load().context("Failed to load configuration")?;
    if let Some(upstream) = args.upstream {
        config.upstream = Some(upstream);
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    if args.init_config {
        config.save().context("Failed to write configuration")?;
        println!("Wrote {}", ShellConfig::config_path()?.display());
        return Ok(());
    }

    let cache_dir = match args.cache_dir {
        Some(dir) => dir,
        None => config.cache_dir()?,
    };
    let storage = CacheStorage::open_dir(cache_dir.clone())
        .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?;

    if args.list {
        print_caches(&storage);
        return Ok(());
    }

    let origin = config.upstream_url()?;
    info!(upstream = %origin, cache = %config.cache_name, "shopfront worker starting");

    let fetcher = Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);
    let host = Arc::new(WorkerHost::new(origin, storage, fetcher));

    let configured = CacheFirstWorker::from_config(&config);
    let pending = startup::restore_cached(&host, configured, args.reinstall).await;

    let addr = proxy::start_server(Arc::clone(&host), &config.listen).await?;
    info!("Open http://{} in a browser", addr);

    if let Some(worker) = pending {
        let host = Arc::clone(&host);
        // Errors are logged by `install`; the restored cache keeps serving.
        tokio::spawn(async move {
            let _ = startup::install(&host, worker).await;
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("shopfront worker shutting down");
    Ok(())
}

fn print_caches(storage: &CacheStorage) {
    let names = storage.keys();
    if names.is_empty() {
        println!("No caches stored.");
        return;
    }

    for name in names {
        let Some(cache) = storage.get(name) else {
            continue;
        };
        println!("{} ({} entries, {} bytes)", name, cache.len(), cache.body_bytes());
        for entry in cache.entries() {
            println!("  {:>3}  {:<10}  {}", entry.status, entry.age_display(), entry.url);
        }
    }
}
