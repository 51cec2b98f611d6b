use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{HarvestReport, HarvestStatus};
use harvester_engine::{write_feature_collection, Harvester, HarvestSettings, WfsFetcher};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::{AppConfig, LayerConfig, API_KEY_VAR};

/// Applies command-line overrides on top of the loaded config.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(bbox) = cli.bbox {
        config.bbox = Some(bbox);
    }
    if cli.all {
        config.bbox = None;
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(encoding) = cli.encoding {
        config.encoding = encoding.into();
    }
    Ok(config)
}

/// Layers named on the command line, or every configured layer.
pub fn select_layers<'a>(config: &'a AppConfig, names: &[String]) -> Vec<&'a LayerConfig> {
    if names.is_empty() {
        return config.layers.iter().collect();
    }
    names
        .iter()
        .filter_map(|name| {
            let layer = config.layer(name);
            if layer.is_none() {
                engine_warn!("unknown layer {name:?}, skipping");
            }
            layer
        })
        .collect()
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;

    if cli.list {
        for layer in &config.layers {
            println!("{}\t{}\t{}", layer.name, layer.type_name, layer.id_field);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let layers = select_layers(&config, &cli.layers);
    if layers.is_empty() {
        bail!("no layers to harvest");
    }
    let settings = config.harvest_settings()?;

    let api_key = std::env::var(API_KEY_VAR).ok().filter(|key| !key.trim().is_empty());
    if api_key.is_none() {
        engine_warn!("{API_KEY_VAR} is not set; requests go out without a key");
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("interrupted, finishing with what was collected");
            ctrl_c.cancel();
        }
    });

    match config.bbox {
        Some(bbox) => engine_info!("target region {bbox}"),
        None => engine_info!("target is the whole dataset"),
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for layer in layers {
        if cancel.is_cancelled() {
            break;
        }
        let outcome =
            harvest_layer(&config, layer, api_key.clone(), settings.clone(), &cancel).await;
        match outcome {
            Ok(report) if layer_succeeded(&report) => {
                succeeded.push(format!(
                    "{} ({}, {} records)",
                    layer.name,
                    report.status,
                    report.len()
                ));
            }
            Ok(report) if report.is_empty() && report.status != HarvestStatus::Failed => {
                engine_warn!("{}: no data", layer.name);
                failed.push(format!("{} (no data)", layer.name));
            }
            Ok(report) => {
                failed.push(format!("{} ({})", layer.name, report.status));
            }
            Err(err) => {
                engine_error!("{}: {err:#}", layer.name);
                failed.push(layer.name.clone());
            }
        }
    }

    engine_info!("succeeded: {}", summary_line(&succeeded));
    engine_info!("failed: {}", summary_line(&failed));

    if failed.is_empty() && !cancel.is_cancelled() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn harvest_layer(
    config: &AppConfig,
    layer: &LayerConfig,
    api_key: Option<String>,
    settings: HarvestSettings,
    cancel: &CancellationToken,
) -> Result<HarvestReport> {
    engine_info!("harvesting {} ({})", layer.name, layer.type_name);
    let fetcher = WfsFetcher::new(config.fetch_settings(layer, api_key))
        .with_context(|| format!("configuring fetcher for {}", layer.name))?;
    let harvester = Harvester::new(Arc::new(fetcher), settings);

    let report = harvester.harvest(config.bbox, &layer.id_field, cancel).await;
    log_report(&layer.name, &report);

    if !report.is_empty() {
        save(&config.output_dir, &layer.name, &report)?;
    }
    Ok(report)
}

fn save(dir: &Path, layer: &str, report: &HarvestReport) -> Result<()> {
    let harvested_at = chrono::Utc::now().to_rfc3339();
    let path = write_feature_collection(dir, layer, &report.records, &harvested_at)
        .with_context(|| format!("writing {layer}"))?;
    engine_info!("saved {} records to {}", report.len(), path.display());
    Ok(())
}

fn log_report(layer: &str, report: &HarvestReport) {
    engine_info!(
        "{layer}: {} with {} records ({} requests, {} retries, {} passes)",
        report.status,
        report.len(),
        report.stats.requests,
        report.stats.retries,
        report.stats.passes
    );
    for region in &report.unresolved_regions {
        engine_warn!(
            "{layer}: {region} still exceeds the offset ceiling; coverage may be incomplete"
        );
    }
    for failure in &report.region_failures {
        let region = failure
            .region
            .map_or_else(|| "<all>".to_string(), |region| region.to_string());
        engine_warn!(
            "{layer}: region {region} (factor {}) failed at offset {}: {}",
            failure.factor, failure.offset, failure.reason
        );
    }
}

/// A layer counts as harvested only when it produced records.
fn layer_succeeded(report: &HarvestReport) -> bool {
    report.status != HarvestStatus::Failed && !report.is_empty()
}

fn summary_line(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
