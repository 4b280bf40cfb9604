// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Coordinate pairs (input) and travel time records (output)
// - util:      Shared helpers (window timestamps, logging)
// - provider:  Travel time API client behind a trait
// - collector: Tick schedule and the polling loop
// - output:    In-memory table and its CSV serialization
// - metrics:   Global request / pass counters
//
mod config;
mod schema;
mod util;
mod provider;
mod collector;
mod output;
mod metrics;
// ------------------------------------------------------------
// External dependencies
// ------------------------------------------------------------

use anyhow::Context;
use rustls::crypto::{CryptoProvider, ring};

use collector::clock::SystemClock;
use collector::runner::Collector;
use config::Config;
use metrics::METRICS;
use provider::google::GoogleDistanceMatrix;

use std::sync::Arc;

const CONFIG_PATH: &str = "config.json";

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize cryptography backend (rustls) and logging
// - Load configuration and the coordinate pair list
// - Run the collector until the window closes or the cap is hit
// - Write the output table exactly once
//
// Input and configuration failures abort before any request is
// sent. Nothing is written if the process is killed mid-run.
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --------------------------------------------------------
    // rustls >= 0.23 requires an explicit CryptoProvider
    // installation, once, before the HTTP client is built.
    // --------------------------------------------------------
    CryptoProvider::install_default(ring::default_provider())
        .map_err(|_| anyhow::anyhow!("failed to install rustls CryptoProvider"))?;

    util::init_logging();

    // --------------------------------------------------------
    // Load configuration from disk
    //
    // NOTE:
    // - The config file contains the API key.
    // - It must not be committed to version control.
    // --------------------------------------------------------
    let config = Config::load(CONFIG_PATH)?;

    let pairs = schema::load_pairs(&config.input.path)
        .with_context(|| format!("loading coordinate pairs from {}", config.input.path.display()))?;
    log::info!(
        "loaded {} coordinate pair(s) from {}",
        pairs.len(),
        config.input.path.display()
    );

    let provider = GoogleDistanceMatrix::new(&config.api, config.log_requests())
        .context("building HTTP client")?;

    let collector = Collector::new(
        Arc::new(provider),
        Arc::new(SystemClock),
        pairs,
        config.window.clone(),
    );

    let (table, summary) = collector.run().await;
    log::info!("{}", METRICS.summary_line());
    if table.is_empty() {
        log::warn!(
            "no records collected ({:?} after {} pass(es))",
            summary.termination,
            summary.passes
        );
    }

    // --------------------------------------------------------
    // Save results
    // --------------------------------------------------------
    let path = config.output.dir.join(output::file_name(
        &config.output.route_name,
        &config.window.start,
        &config.window.end,
    ));
    table
        .write_csv(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("{} record(s) written to {}", table.len(), path.display());

    Ok(())
}
