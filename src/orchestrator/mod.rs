//! Orchestrator: starts and stops the crawl process — runs worker
//! loops, supervises Parser Consumer processes, exports metrics on an
//! interval, and turns SIGINT/SIGTERM into a cooperative shutdown.
//!
//! Workers are plain futures joined with [`futures::future::join_all`]
//! rather than `tokio::spawn`'d tasks: the scheduling model is a single
//! cooperative process (see the crate's concurrency notes), so nothing
//! is gained by giving each worker its own task, and keeping them as
//! borrowing futures avoids `Arc`-wrapping every shared service.

mod shutdown;
mod supervisor;
mod worker;

use crate::config::{Config, RuntimeConfig, UserAgentConfig};
use crate::fetcher::{build_http_client, Fetcher};
use crate::frontier::FrontierManager;
use crate::kvc::KvClient;
use crate::metrics;
use crate::politeness::PolitenessEnforcer;
use crate::storage::StorageService;
use crate::SumiError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use supervisor::ParserProcessArgs;

/// How often the orchestrator exports metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(60);
/// Connection pool size per `KvClient`. Sized independently of
/// `--max-workers` since the pool blocks acquisition rather than
/// failing when saturated; a pool much smaller than the worker count
/// just means more time spent waiting for a free connection.
const KVC_POOL_SIZE: usize = 64;
/// Worker count handed to each supervised `sumi-parser` process.
const DEFAULT_PARSER_WORKERS: usize = 80;
/// Number of separate `sumi-parser` OS processes the orchestrator
/// supervises, so link extraction never competes with fetch workers
/// for the same process's CPU.
const DEFAULT_PARSER_PROCESSES: usize = 2;

pub async fn run(config: RuntimeConfig) -> Result<(), SumiError> {
    let data_dir = config.data_dir.clone();
    std::fs::create_dir_all(&data_dir)?;

    let supplemental = config.config.as_ref().map(|path| crate::config::load_config(path)).transpose()?;

    let user_agent_config = UserAgentConfig {
        crawler_name: config.user_agent.clone(),
        crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        contact_url: "https://github.com/sumi-ripple/sumi-ripple".to_string(),
        contact_email: config.email.clone().unwrap_or_default(),
    };
    let http_client = build_http_client(&user_agent_config)?;
    let fetcher = Arc::new(Fetcher::new(http_client, config.max_workers));

    let redis_url = config.redis_url();
    let text_kvc = KvClient::new(&redis_url, KVC_POOL_SIZE)?;
    let binary_kvc = KvClient::new(&redis_url, KVC_POOL_SIZE)?;

    let excluded = excluded_hosts(supplemental.as_ref());
    let politeness = PolitenessEnforcer::new(
        &text_kvc,
        fetcher.clone(),
        config.user_agent.clone(),
        config.min_fetch_delay_seconds,
        excluded,
    );
    politeness.seed_exclusions().await?;

    let frontier = FrontierManager::new(&text_kvc, &data_dir);
    if let Some(seed_file) = &config.seed_file {
        let seeds = read_seed_file(seed_file)?;
        let added = frontier.add_seeds(&seeds).await?;
        tracing::info!(added, total = seeds.len(), "seeded frontier");
    }

    let storage = StorageService::new(&data_dir, &text_kvc);

    metrics::install(config.metrics_port)
        .map_err(|e| SumiError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    tracing::info!(port = config.metrics_port, "metrics endpoint listening");

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    shutdown::spawn_signal_watcher(shutdown_flag.clone());

    let parser_args = ParserProcessArgs {
        redis_host: config.redis_host.clone(),
        redis_port: config.redis_port,
        redis_db: config.redis_db,
        redis_password: config.redis_password(),
        data_dir: data_dir.clone(),
        workers: DEFAULT_PARSER_WORKERS,
    };
    let parser_binary = parser_binary_path();
    let supervisor_handles: Vec<_> = (0..DEFAULT_PARSER_PROCESSES)
        .map(|_| {
            let binary = parser_binary.clone();
            let args = parser_args.clone();
            let flag = shutdown_flag.clone();
            tokio::spawn(async move { supervisor::supervise(binary, args, flag).await })
        })
        .collect();

    let worker_pool = async {
        let mut handles = Vec::with_capacity(config.max_workers);
        for worker_id in 0..config.max_workers {
            handles.push(worker::run(
                worker_id,
                &text_kvc,
                &binary_kvc,
                &fetcher,
                &politeness,
                &storage,
                &data_dir,
                shutdown_flag.clone(),
            ));
        }
        futures::future::join_all(handles).await;
    };

    let metrics_loop = async {
        while !shutdown_flag.load(Ordering::Relaxed) {
            tokio::time::sleep(METRICS_INTERVAL).await;
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }
            metrics::export_tick(&text_kvc, &binary_kvc, config.max_workers, &data_dir).await;
        }
    };

    tokio::join!(worker_pool, metrics_loop);

    for handle in supervisor_handles {
        handle.abort();
    }
    tracing::info!("orchestrator shutdown complete");
    Ok(())
}

fn excluded_hosts(config: Option<&Config>) -> HashSet<String> {
    config
        .map(|c| c.blacklist.iter().map(|d| d.domain.clone()).collect())
        .unwrap_or_default()
}

fn read_seed_file(path: &Path) -> Result<Vec<String>, SumiError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

/// The `sumi-parser` binary lives alongside the currently-running
/// orchestrator binary in the same build's output directory.
fn parser_binary_path() -> std::path::PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("sumi-parser")))
        .unwrap_or_else(|| std::path::PathBuf::from("sumi-parser"))
}
