//! Parser Consumer process entry point. Spawned (and supervised) by the
//! orchestrator; pops fetched pages off the Fetch Queue, extracts
//! links, and records visits, independently of the main crawl process
//! so a crash here never takes down fetch workers.

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sumi_ripple::config::ParserConfig;
use sumi_ripple::kvc::KvClient;
use sumi_ripple::parser::consumer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ParserConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("sumi_ripple=info,warn"))
        .with_target(false)
        .init();

    let redis_url = config.redis_url();
    tracing::info!(workers = config.workers, "starting parser consumer");

    // One pooled client shared by every worker task in this process,
    // the same discipline the orchestrator uses for its fetch workers
    // (§4.1: pool acquisition blocks rather than each caller opening
    // its own connection). `Pool`'s internal semaphore+mutex already
    // make concurrent use from many tasks safe.
    let kvc = Arc::new(KvClient::new(&redis_url, 64)?);

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("parser consumer shutting down");
        signal_flag.store(true, Ordering::Relaxed);
    });

    let mut handles = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        let kvc = kvc.clone();
        let data_dir = config.data_dir.clone();
        let flag = shutdown.clone();
        handles.push(tokio::spawn(async move {
            consumer::run(&kvc, &data_dir, flag).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
