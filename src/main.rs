//! CLI entry point for the resource cache.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use resource_cache::config::{CacheConfig, FileConfig, load_default_file_config};
use resource_cache::resolver::DownloadOptions;
use resource_cache::resource::{Resource, ResourceStatus};
use resource_cache::tracker::ResourceTracker;
use tracing::{debug, info, warn};

mod cli;
mod progress_ui;

use cli::Args;

/// Exit status when `--timeout` elapsed before every download finished.
const EXIT_TIMED_OUT: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_config(&args)?;
    info!(cache_dir = %config.cache_dir.display(), parallel = config.parallel_downloads, "resource cache starting");

    let tracker = Arc::new(
        ResourceTracker::builder()
            .config(config)
            .download_options(DownloadOptions::new(args.pack, args.versioned))
            .build()
            .context("Failed to create resource tracker")?,
    );

    let mut resources: Vec<Arc<Resource>> = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let resource = tracker
            .register(url, args.version_id.as_ref())
            .with_context(|| format!("Failed to register {url}"))?;
        resources.push(resource);
    }

    let use_bar = !args.quiet && io::stderr().is_terminal();
    let (progress_handle, stop) =
        progress_ui::spawn_progress_ui(use_bar, Arc::clone(&tracker), args.urls.clone());

    let finished = tracker
        .await_all(&args.urls, args.timeout.map(Duration::from_secs))
        .await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    let finished = finished.context("Failed to wait for downloads")?;

    let mut failed = 0usize;
    for (url, resource) in args.urls.iter().zip(&resources) {
        match (resource.status(), resource.local_file()) {
            (ResourceStatus::Downloaded, Some(path)) => println!("{url}\t{}", path.display()),
            _ => {
                failed += 1;
                println!("{url}\tERROR");
            }
        }
    }

    tracker.shutdown();

    if !finished {
        warn!(timeout_secs = args.timeout, "timed out waiting for downloads");
        return Ok(ExitCode::from(EXIT_TIMED_OUT));
    }
    info!(total = resources.len(), failed, "done");
    if failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the runtime config: CLI flag, then config file, then default.
fn resolve_config(args: &Args) -> Result<CacheConfig> {
    let file_config = if args.no_config {
        None
    } else if let Some(path) = &args.config {
        Some(
            FileConfig::load(path)
                .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        )
    } else {
        let loaded = load_default_file_config().context("Failed to load default config file")?;
        if let (Some(path), true) = (&loaded.path, loaded.loaded_from_file()) {
            debug!(path = %path.display(), "using config file");
        }
        loaded.config
    };

    let mut config = file_config
        .as_ref()
        .map(CacheConfig::from_file)
        .unwrap_or_default();

    if let Some(dir) = &args.cache_dir {
        config.cache_dir.clone_from(dir);
    }
    if let Some(parallel) = args.parallel {
        config.parallel_downloads = usize::from(parallel);
    }
    if let Some(policy) = args.update_policy {
        config.update_policy = policy;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
