//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::LoaderConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    pools: PoolInfo,
    plugins: PluginInfo,
    observability: ObservabilityInfo,
}

#[derive(Serialize)]
struct PoolInfo {
    file_workers: usize,
    shared_workers: usize,
}

#[derive(Serialize)]
struct PluginInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_height: Option<u32>,
}

#[derive(Serialize)]
struct ObservabilityInfo {
    log_format: String,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&config))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &LoaderConfig) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        pools: PoolInfo {
            file_workers: 1,
            shared_workers: config.loader.worker_threads,
        },
        plugins: PluginInfo {
            max_width: config.plugins.target.max_width,
            max_height: config.plugins.target.max_height,
        },
        observability: ObservabilityInfo {
            log_format: config.observability.log_format.clone(),
            log_level: config.observability.log_level.clone(),
            metrics_port: config.observability.metrics_port,
        },
    }
}

fn print_config_info(config: &LoaderConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 imagesync Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Worker Pools");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ File pool: 1 worker");
    println!("   └─ Shared pool: {} workers", config.loader.worker_threads);

    println!("\n🔌 Plugins");
    println!("   └─ Target size: {}", config.plugins.target);

    let obs = &config.observability;
    println!("\n📈 Observability");
    println!("   ├─ Log format: {}", obs.log_format);
    println!("   ├─ Log level: {}", obs.log_level);
    match obs.metrics_port {
        Some(port) => println!("   └─ Metrics: 0.0.0.0:{}", port),
        None => println!("   └─ Metrics: disabled"),
    }
}
