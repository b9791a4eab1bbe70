//! GasBal forecasting CLI
//!
//! Runs ensemble forecasts and reliability reports against the configured
//! model and data directories. Results are printed as JSON on stdout; logs
//! go to stderr.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gasbal_ai_service::data::{parse_decimal, DATE_FORMAT};
use gasbal_ai_service::{FeatureSet, ForecastService, ServiceConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "gasbal-forecast")]
#[command(author = "GasBal Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ensemble gas volume forecasts and reliability reports", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensemble forecast for one valve
    Predict {
        #[arg(short, long)]
        entity: String,

        /// Feature value as NAME=VALUE; repeatable
        #[arg(short, long = "feature", value_parser = parse_feature)]
        features: Vec<(String, f64)>,

        /// Forecast date (YYYY-MM-DD), needed by calendar models
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Reliability score of one valve, or of every valve with --all
    Reliability {
        #[arg(short, long, required_unless_present = "all")]
        entity: Option<String>,

        #[arg(long)]
        all: bool,
    },
    /// Per-model error metrics for one valve
    Metrics {
        #[arg(short, long)]
        entity: String,
    },
    /// Inverse-error weight suggestions for one valve
    Weights {
        #[arg(short, long)]
        entity: String,
    },
    /// Models that load for one valve, with load failures
    Models {
        #[arg(short, long)]
        entity: String,
    },
}

fn parse_feature(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty feature name in {raw:?}"));
    }
    let value = parse_decimal(value.trim()).ok_or_else(|| format!("invalid number in {raw:?}"))?;
    Ok((name.to_string(), value))
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| format!("{raw:?}: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    config.apply_env_overrides();

    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("GasBal forecast v{}", gasbal_ai_service::VERSION);

    let service = ForecastService::from_config(&config).context("Invalid configuration")?;

    match args.command {
        Command::Predict {
            entity,
            features,
            date,
        } => {
            let features: FeatureSet = features.into_iter().collect();
            let outcome = service
                .predict_ensemble(&entity, &features, date)
                .await
                .with_context(|| format!("Failed to forecast {entity}"))?;
            print_json(&outcome)
        }
        Command::Reliability { entity, all } => {
            if all {
                let summary = service
                    .fleet_summary()
                    .context("Failed to summarise reliability")?;
                print_json(&summary)
            } else {
                let entity = entity.context("--entity is required without --all")?;
                let score = service
                    .reliability_score(&entity)
                    .with_context(|| format!("Failed to score {entity}"))?;
                print_json(&score)
            }
        }
        Command::Metrics { entity } => {
            let metrics = service
                .model_metrics(&entity)
                .with_context(|| format!("Failed to compute metrics for {entity}"))?;
            print_json(&metrics)
        }
        Command::Weights { entity } => {
            let weights = service
                .suggest_weights(&entity)
                .with_context(|| format!("Failed to suggest weights for {entity}"))?;
            print_json(&weights)
        }
        Command::Models { entity } => {
            let models = service
                .registry()
                .entity(&entity)
                .await
                .with_context(|| format!("Failed to load models for {entity}"))?;
            print_json(&serde_json::json!({
                "entity": entity,
                "available": models.available(),
                "failures": models.failures(),
            }))
        }
    }
}
