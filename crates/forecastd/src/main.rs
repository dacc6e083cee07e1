//! forecastd — the WarpGrid forecast daemon.
//!
//! Loads a `forecast.toml`, connects the metric collector, and runs one
//! forecast loop per scaling target until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! forecastd run --config forecast.toml
//! forecastd run --config forecast.toml --target default/api
//! forecastd metrics --config forecast.toml
//! ```

mod forecast_loop;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use warpgrid_collector::{MetricCollector, PrometheusCollector};
use warpgrid_forecast::ForecastConfig;
use warpgrid_predict::{PredictorFactory, ProcessRunner};

use crate::forecast_loop::ForecastLoop;

#[derive(Parser)]
#[command(name = "forecastd", about = "WarpGrid forecast daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the forecast loops for the configured targets.
    Run {
        /// Path to the forecast configuration.
        #[arg(long, default_value = "forecast.toml")]
        config: PathBuf,

        /// Only run this target.
        #[arg(long)]
        target: Option<String>,
    },
    /// List the metric types the collector can serve.
    Metrics {
        /// Path to the forecast configuration.
        #[arg(long, default_value = "forecast.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,forecastd=debug,warpgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, target } => run(&config, target.as_deref()).await,
        Command::Metrics { config } => list_metrics(&config),
    }
}

fn load(path: &Path) -> anyhow::Result<ForecastConfig> {
    ForecastConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))
}

fn build_collector(config: &ForecastConfig) -> PrometheusCollector {
    let mut collector = PrometheusCollector::new();
    if let Some(timeout) = config.collector.query_timeout {
        collector = collector.with_query_timeout(timeout);
    }
    for metric in &config.collector.metrics {
        collector.add_custom_metric(metric.metric_type(), metric.query.clone());
    }
    collector
}

fn list_metrics(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    let collector = build_collector(&config);
    for name in collector.list_metric_types() {
        println!("{name}");
    }
    Ok(())
}

async fn run(path: &Path, only: Option<&str>) -> anyhow::Result<()> {
    let config = load(path)?;
    info!(config = %path.display(), targets = config.targets.len(), "forecast daemon starting");

    // ── Collector ──────────────────────────────────────────────

    let mut collector = build_collector(&config);
    collector
        .set_server_address(&config.collector.address)
        .await
        .context("connecting metric collector")?;
    info!(address = %config.collector.address, "metric collector connected");

    // ── Predictors ─────────────────────────────────────────────

    let runner = match &config.runner.interpreter {
        Some(interpreter) => ProcessRunner::with_interpreter(interpreter),
        None => ProcessRunner::new(),
    };
    let factory = PredictorFactory::new(Arc::new(runner), &config.runner.algorithms_dir);

    let mut loops = Vec::new();
    for target in &config.targets {
        if only.is_some_and(|name| name != target.name) {
            continue;
        }
        let metric_type = collector
            .find_metric_type(&target.metric)
            .cloned()
            .with_context(|| format!("{}: unknown metric {}", target.name, target.metric))?;
        let worker = collector
            .create_worker(&metric_type)
            .with_context(|| format!("{}: creating worker", target.name))?;
        let predictor = factory
            .try_new_predictor(&target.model)
            .with_context(|| format!("{}: creating predictor", target.name))?;

        loops.push((
            ForecastLoop::new(&target.name, worker, predictor, target.initial_replicas),
            target.interval,
        ));
    }

    if loops.is_empty() {
        anyhow::bail!("no scaling targets to run");
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start forecast loops ───────────────────────────────────

    let handles: Vec<_> = loops
        .into_iter()
        .map(|(mut forecast, interval)| {
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                forecast.run(interval, shutdown).await;
                (forecast.name().to_string(), forecast.replicas())
            })
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Ok((name, replicas)) = handle.await {
            info!(scaling_target = %name, replicas, "forecast loop stopped");
        }
    }

    info!("forecast daemon stopped");
    Ok(())
}
