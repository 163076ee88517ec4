//! Cooperative shutdown: SIGINT/SIGTERM are translated into a single
//! `Arc<AtomicBool>` flag workers check at their loop's only suspension
//! boundary (the top of each iteration), rather than being handled with
//! `tokio::select!` inside every I/O call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resolves once SIGINT or SIGTERM (or, off unix, Ctrl-C alone) arrives.
pub async fn wait_for_signal() {
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

/// Spawns the signal-wait future and flips `flag` once it resolves.
pub fn spawn_signal_watcher(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        flag.store(true, Ordering::Relaxed);
    });
}
