mod cli;

use crate::cli::{Command, CLI};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use snip_generator::RandomHexGenerator;
use snip_shortener::{RepositoryOptions, Shortener, ShortenerService};
use snip_store::{BackendSelector, Probe, RestConfig, StorageConfig};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct ProbeReport {
    backend: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeSummary {
    backends: Vec<ProbeReport>,
    selected: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    snip_telemetry::init(config.log_format.into())?;

    let storage = storage_config(&config);
    info!(
        rest = storage.rest.is_some(),
        redis = storage.redis_url.is_some(),
        memory_fallback = storage.memory_fallback,
        log_format = %config.log_format,
        "starting snip"
    );

    let selector =
        BackendSelector::from_config(&storage).context("invalid storage configuration")?;
    let generator = RandomHexGenerator::builder().bytes(config.id_bytes).build();
    let options = RepositoryOptions::builder()
        .strict_dedup(config.strict_dedup)
        .build();
    let service = ShortenerService::with_options(selector, generator, options);

    match &config.command {
        Command::Shorten { url } => {
            let resolution = service.shorten(url).await?;
            print_json(&resolution)?;
        }
        Command::Resolve { id } => {
            let mapping = service.resolve(id).await?;
            print_json(&mapping)?;
        }
        Command::Backfill => {
            let report = service.run_backfill().await?;
            print_json(&report)?;
        }
        Command::Probe => {
            let summary = probe(service.selector()).await?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn storage_config(config: &CLI) -> StorageConfig {
    let rest = match (&config.rest_url, &config.rest_token) {
        (Some(url), Some(token)) => Some(RestConfig::builder().url(url).token(token).build()),
        _ => None,
    };

    StorageConfig {
        rest,
        redis_url: config.redis_url.clone(),
        operation_timeout: Duration::from_millis(config.store_timeout_ms),
        probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        memory_fallback: !config.disable_memory_fallback,
    }
}

async fn probe(selector: &BackendSelector) -> anyhow::Result<ProbeSummary> {
    let backends = selector
        .probe_all()
        .await
        .into_iter()
        .map(|(kind, probe)| match probe {
            Probe::Reachable => ProbeReport {
                backend: kind.to_string(),
                reachable: true,
                reason: None,
            },
            Probe::Unreachable { reason } => ProbeReport {
                backend: kind.to_string(),
                reachable: false,
                reason: Some(reason),
            },
        })
        .collect();

    let handle = selector.acquire_store().await?;
    Ok(ProbeSummary {
        backends,
        selected: handle.kind().to_string(),
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}
