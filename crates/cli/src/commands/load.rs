//! `load` command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use config_loader::ConfigLoader;
use contracts::{ImageProxy, LoaderConfig, PluginHost, PluginId};
use image_loader::{ImageLoader, LoaderSnapshot};
use observability::ResolutionStatsAggregator;
use synchronizer::{PoolSnapshot, SimpleImage};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::LoadArgs;
use crate::error::{CliError, Result};

/// Host without any plugin; files never need one
struct LocalHost;

impl PluginHost for LocalHost {
    fn connect(&self, plugin: &PluginId) {
        warn!(plugin = %plugin, "No plugin host available, connection never completes");
    }

    fn disconnect(&self, _plugin: &PluginId) {}
}

/// One delivered callback
struct Delivery {
    synchronized: bool,
    elapsed: Duration,
}

/// Execute the `load` command
pub async fn run_load(args: &LoadArgs) -> Result<()> {
    let config = load_config(args)?;

    if let Some(port) = args.metrics_port.or(config.observability.metrics_port) {
        if let Err(e) = observability::init_metrics_only(port) {
            warn!(port, error = %e, "Metrics exporter not started");
        }
    }

    let repeat = args.repeat.max(1);
    let loader = ImageLoader::builder(config, Arc::new(LocalHost)).build()?;
    let images: Vec<Arc<SimpleImage>> = args
        .paths
        .iter()
        .map(|path| Arc::new(SimpleImage::file(path)))
        .collect();
    let expected = images.len() * repeat;

    info!(files = images.len(), repeat, "Issuing synchronization requests");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let started = Instant::now();
    for image in &images {
        for _ in 0..repeat {
            let tx = tx.clone();
            let watched = Arc::clone(image);
            loader.request_synchronization(
                image.clone(),
                Box::new(move || {
                    let _ = tx.send(Delivery {
                        synchronized: watched.is_synchronized(),
                        elapsed: started.elapsed(),
                    });
                }),
            );
        }
    }
    drop(tx);

    let mut aggregator = ResolutionStatsAggregator::new();
    let mut delivered = 0;
    let collect = collect(&mut rx, expected, &mut aggregator, &mut delivered);
    let timed_out = match args.timeout {
        0 => {
            collect.await;
            false
        }
        secs => tokio::time::timeout(Duration::from_secs(secs), collect)
            .await
            .is_err(),
    };

    let snapshot = loader.metrics();
    let pools = loader.pool_metrics();
    loader.shutdown().await;

    if timed_out {
        return Err(CliError::Timeout {
            waited: Duration::from_secs(args.timeout),
            delivered,
            expected,
        });
    }

    let failed: Vec<&PathBuf> = args
        .paths
        .iter()
        .zip(&images)
        .filter(|(_, image)| !image.is_synchronized())
        .map(|(path, _)| path)
        .collect();

    print_summary(&snapshot, &pools, &aggregator, started.elapsed());
    for path in &failed {
        println!("  ✗ {}", path.display());
    }

    if args.expect_all && !failed.is_empty() {
        return Err(CliError::Unsynchronized {
            failed: failed.len(),
            total: images.len(),
        });
    }

    Ok(())
}

fn load_config(args: &LoadArgs) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) if !path.exists() => return Err(CliError::config_not_found(path)),
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => LoaderConfig::default(),
    };

    if let Some(workers) = args.workers {
        info!(workers, "Overriding worker_threads from CLI");
        config.loader.worker_threads = workers;
        ConfigLoader::validate(&config)?;
    }

    Ok(config)
}

async fn collect(
    rx: &mut mpsc::UnboundedReceiver<Delivery>,
    expected: usize,
    aggregator: &mut ResolutionStatsAggregator,
    delivered: &mut usize,
) {
    while *delivered < expected {
        let Some(delivery) = rx.recv().await else {
            break;
        };
        *delivered += 1;
        aggregator.update("file", delivery.synchronized, delivery.elapsed);
    }
}

fn print_summary(
    snapshot: &LoaderSnapshot,
    pools: &[(String, PoolSnapshot)],
    aggregator: &ResolutionStatsAggregator,
    took: Duration,
) {
    println!("\n📊 Loader");
    println!("   ├─ Duration: {:.3}s", took.as_secs_f64());
    println!("   ├─ Resolutions started: {}", snapshot.started);
    println!("   ├─ Requests joined: {}", snapshot.joined);
    println!("   ├─ Fast path: {}", snapshot.fast_path);
    println!("   └─ Callbacks delivered: {}", snapshot.callbacks);
    println!("\n🧵 Worker pools");
    for line in pool_lines(pools) {
        println!("{line}");
    }
    println!();
    print!("{}", aggregator.summary());
}

fn pool_lines(pools: &[(String, PoolSnapshot)]) -> Vec<String> {
    let last = pools.len().saturating_sub(1);
    pools
        .iter()
        .enumerate()
        .map(|(i, (name, pool))| {
            let branch = if i == last { "└─" } else { "├─" };
            format!(
                "   {branch} {name}: {} submitted, {} completed, {} panicked",
                pool.submitted, pool.completed, pool.panicked
            )
        })
        .collect()
}
