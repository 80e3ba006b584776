// notescout: discover hot posts for a topic and run them through the
// fetch / analyze / strategize pipeline.
//
// Usage: notescout <topic> [--resume] [--output <dir>]
// Everything else comes from NOTESCOUT_* / MEDIACRAWLER_* environment variables.

use anyhow::{Context, Result, bail};
use notescout::{
    ChromiumDiscoverer, HttpAnalyzer, HttpDetailClient, HttpStrategist, JsonStateStore,
    LogProgress, PipelineConfig, PipelineOrchestrator, StageStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    topic: String,
    resume: bool,
    output_dir: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut topic = std::env::var("NOTESCOUT_TOPIC").ok();
    let mut resume = false;
    let mut output_dir = PathBuf::from(
        std::env::var("NOTESCOUT_OUTPUT_DIR").unwrap_or_else(|_| "output".to_string()),
    );

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--resume" => resume = true,
            "--output" => {
                output_dir = args.next().map(PathBuf::from).context("--output needs a directory")?;
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => topic = Some(arg),
        }
    }

    let Some(topic) = topic else {
        bail!("usage: notescout <topic> [--resume] [--output <dir>]");
    };
    Ok(Args {
        topic,
        resume,
        output_dir,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    let config = PipelineConfig::builder()
        .topic(args.topic)
        .output_dir(args.output_dir)
        .apply_env()?
        .build()?;

    let orchestrator = PipelineOrchestrator::builder(config.clone())
        .discoverer(Arc::new(ChromiumDiscoverer))
        .detail_api(Arc::new(HttpDetailClient::from_config(&config)?))
        .analyzer(Arc::new(HttpAnalyzer::from_config(&config)?))
        .strategist(Arc::new(HttpStrategist::from_config(&config)?))
        .store(Arc::new(JsonStateStore::from_config(&config)))
        .progress(LogProgress)
        .build()?;

    let state = if args.resume {
        orchestrator.resume().await?
    } else {
        orchestrator.run_fresh().await
    };

    tracing::info!(
        "Snapshot: {} ({} error(s) logged)",
        config.state_path().display(),
        state.errors.len()
    );
    if state.overall_status() == Some(StageStatus::Failed) {
        bail!(
            "pipeline failed at stage {}",
            state.failed_at.map_or("unknown", |s| s.as_str())
        );
    }
    Ok(())
}
