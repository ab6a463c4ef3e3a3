//! quake-viz: clustered earthquake visualization server.
//!
//! Single-binary Tokio application that:
//! 1. Fetches recent events from the USGS summary feeds
//! 2. Groups them into magnitude clusters and colors each cluster
//! 3. Caches the clusters per recency period
//! 4. Serves an HTML view and its JSON payload over HTTP

mod config;
mod render;
mod server;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::{error, info, warn};

use clustering::{seed_from_clock, ClusterCache, Pipeline, PipelineSettings};
use common::{AppConfig, Error, Period};
use usgs_client::{EventFeed, UsgsClient};

use render::{build_payload, Renderer};
use server::AppState;

/// Clustered earthquake visualization server
#[derive(Parser)]
#[command(name = "quake-viz", about = "Clustered earthquake visualization server")]
struct Cli {
    /// TOML config file (defaults to ./config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file and environment.
    #[arg(long)]
    bind: Option<String>,

    /// Cluster a single period (e.g. "3h", "10d"), log the result, then exit.
    #[arg(long, value_name = "DURATION")]
    once: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quake_viz=info,usgs_client=info,clustering=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("quake-viz starting up...");

    let cfg = match config::load_config(cli.config.as_deref(), cli.bind.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    log_config(&cfg);

    let feed = match UsgsClient::new(&cfg.feed) {
        Ok(f) => f,
        Err(e) => {
            error!("Feed client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let seed = seed_from_clock();
    let pipeline = Pipeline::new(
        Arc::new(feed),
        ClusterCache::new(),
        seed,
        PipelineSettings::from_config(&cfg),
    );
    info!("Clustering seed: {}", seed);

    // ── One-shot mode ────────────────────────────────────────────────
    if let Some(dur) = cli.once {
        if let Err(e) = run_once(&pipeline, &dur).await {
            error!("Lookup failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // ── Server mode ──────────────────────────────────────────────────
    let renderer = match Renderer::new() {
        Ok(r) => r,
        Err(e) => {
            error!("Template initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    let state = Arc::new(AppState { pipeline, renderer });

    if let Err(e) = serve(&cfg.server.bind_addr, state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("quake-viz shut down.");
}

fn log_config(cfg: &AppConfig) {
    info!("Feed: {} (magnitude={})", cfg.feed.base_url, cfg.feed.magnitude);
    info!(
        "Pipeline: deadline={}ms, coalesce_misses={}",
        cfg.pipeline.deadline_ms, cfg.pipeline.coalesce_misses
    );
    info!(
        "Cache TTLs: hour={}s, day={}s, week={}s, month={}s",
        cfg.cache.past_hour_secs,
        cfg.cache.past_day_secs,
        cfg.cache.past_7_days_secs,
        cfg.cache.past_30_days_secs,
    );
}

async fn run_once<F: EventFeed>(pipeline: &Pipeline<F>, dur: &str) -> Result<(), Error> {
    let period = Period::resolve(dur);
    info!("Running single lookup for {:?} → {}", dur, period);

    let clusters = pipeline.lookup(period).await?;
    let payload = build_payload(period, &clusters);

    info!("{}: {} clusters", payload.period, payload.elements.len());
    for element in &payload.elements {
        info!(
            "  → {} M{:.1} x{} at {}",
            element.color,
            element.centroid.magnitude,
            element.points.len(),
            element.centroid.place,
        );
    }
    Ok(())
}

async fn serve<F: EventFeed>(addr: &str, state: Arc<AppState<F>>) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving on http://{}/visual. Press Ctrl+C to stop.", addr);

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
