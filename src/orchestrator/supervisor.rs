//! Parser Consumer process supervisor: spawns the `sumi-parser` binary
//! and restarts it with exponential backoff (capped) if it exits
//! unexpectedly. The Fetch Queue is a durable Redis list, so a restart
//! never loses in-flight items — PC just resumes popping where it left
//! off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Arguments forwarded to each spawned `sumi-parser` process.
#[derive(Clone)]
pub struct ParserProcessArgs {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: u8,
    pub redis_password: Option<String>,
    pub data_dir: std::path::PathBuf,
    pub workers: usize,
}

impl ParserProcessArgs {
    fn to_argv(&self) -> Vec<String> {
        let mut argv = vec![
            "--redis-host".to_string(),
            self.redis_host.clone(),
            "--redis-port".to_string(),
            self.redis_port.to_string(),
            "--redis-db".to_string(),
            self.redis_db.to_string(),
            "--data-dir".to_string(),
            self.data_dir.to_string_lossy().into_owned(),
            "--workers".to_string(),
            self.workers.to_string(),
        ];
        if let Some(password) = &self.redis_password {
            argv.push("--redis-password".to_string());
            argv.push(password.clone());
        }
        argv
    }
}

/// Runs one supervised `sumi-parser` process slot until `shutdown` is
/// set, restarting it with exponential backoff on unexpected exit.
/// Intended to be run as its own `tokio::spawn`'d task, one per PC
/// process the orchestrator wants alive concurrently.
pub async fn supervise(binary_path: std::path::PathBuf, args: ParserProcessArgs, shutdown: Arc<AtomicBool>) {
    let mut backoff = BASE_BACKOFF;

    while !shutdown.load(Ordering::Relaxed) {
        tracing::info!(path = %binary_path.display(), "starting parser consumer process");
        let mut child = match Command::new(&binary_path).args(args.to_argv()).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn parser consumer process");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        let wait = tokio::select! {
            status = child.wait() => Some(status),
            _ = wait_for_shutdown(&shutdown) => {
                let _ = child.start_kill();
                None
            }
        };

        match wait {
            Some(Ok(status)) if status.success() => {
                tracing::info!("parser consumer process exited cleanly");
                backoff = BASE_BACKOFF;
            }
            Some(Ok(status)) => {
                tracing::warn!(?status, "parser consumer process exited unexpectedly, restarting");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "failed to wait on parser consumer process");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            None => break,
        }
    }
}

async fn wait_for_shutdown(flag: &Arc<AtomicBool>) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
