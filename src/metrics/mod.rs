//! Metrics: a Prometheus scrape endpoint plus the counters, gauges, and
//! histograms the orchestrator's worker loop and periodic export task
//! feed into it. Built on the `metrics` facade so recording sites don't
//! depend on the exporter; `metrics-exporter-prometheus` is the only
//! backend wired up, bound to `--metrics-port`.

pub mod fd;

use crate::kvc::{KvClient, PoolStats};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to install prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

/// Installs the global Prometheus recorder and starts its scrape
/// endpoint on `port`. Reads `PROMETHEUS_MULTIPROC_DIR` for compatibility
/// with multi-process aggregation setups; only the orchestrator consults
/// it, since parser processes don't serve their own scrape endpoint.
pub fn install(port: u16) -> Result<PrometheusHandle, MetricsError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let mut builder = PrometheusBuilder::new().with_http_listener(addr);

    if let Ok(dir) = std::env::var("PROMETHEUS_MULTIPROC_DIR") {
        tracing::info!(dir, "PROMETHEUS_MULTIPROC_DIR set; accepted for compatibility");
    }

    builder = builder.set_buckets_for_metric(
        metrics_exporter_prometheus::Matcher::Prefix("sumi_fetch_duration".to_string()),
        &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
    )?;

    let handle = builder.install_recorder()?;
    Ok(handle)
}

/// Records a completed fetch: count, error label (if any), and the
/// three timing phases the fetcher measures.
pub fn record_fetch(fetch_type: &'static str, error_type: Option<&str>, dns: Option<Duration>, total: Duration) {
    match error_type {
        Some(label) => {
            counter!("sumi_fetch_errors_total", "fetch_type" => fetch_type, "error_type" => label.to_string())
                .increment(1);
        }
        None => {
            counter!("sumi_fetches_total", "fetch_type" => fetch_type).increment(1);
        }
    }

    if let Some(dns) = dns {
        histogram!("sumi_fetch_duration_seconds", "phase" => "dns_lookup", "fetch_type" => fetch_type)
            .record(dns.as_secs_f64());
    }
    histogram!("sumi_fetch_duration_seconds", "phase" => "total", "fetch_type" => fetch_type)
        .record(total.as_secs_f64());
}

/// Counts one page visited (successful or not) and one unit toward the
/// pages/sec rate.
pub fn record_page_visited() {
    counter!("sumi_pages_visited_total").increment(1);
}

/// Counts URLs newly added to the frontier.
pub fn record_urls_added(n: u64) {
    counter!("sumi_urls_added_total").increment(n);
}

pub fn set_frontier_size(size: i64) {
    gauge!("sumi_frontier_ready_size").set(size as f64);
}

pub fn set_active_workers(n: usize) {
    gauge!("sumi_active_workers").set(n as f64);
}

/// Reports one KVC client's pool occupancy, labeled `text` or `binary`
/// to match the two independent `KvClient` instances.
pub fn record_pool_stats(client_label: &'static str, stats: PoolStats) {
    gauge!("sumi_kvc_pool_created", "client" => client_label).set(stats.created as f64);
    gauge!("sumi_kvc_pool_in_use", "client" => client_label).set(stats.in_use as f64);
    gauge!("sumi_kvc_pool_available", "client" => client_label).set(stats.available as f64);
}

pub fn record_fd_breakdown(breakdown: &fd::FdBreakdown) {
    gauge!("sumi_fd_count", "category" => "kvc_sockets").set(breakdown.kvc_sockets as f64);
    gauge!("sumi_fd_count", "category" => "http_sockets").set(breakdown.http_sockets as f64);
    gauge!("sumi_fd_count", "category" => "frontier_files").set(breakdown.frontier_files as f64);
    gauge!("sumi_fd_count", "category" => "pipes").set(breakdown.pipes as f64);
    gauge!("sumi_fd_count", "category" => "prometheus").set(breakdown.prometheus as f64);
    gauge!("sumi_fd_count", "category" => "other").set(breakdown.other as f64);
}

/// Snapshot of the counters an orchestrator periodic export tick cares
/// about beyond what's already pushed incrementally during the loop.
pub async fn export_tick(text_kvc: &KvClient, binary_kvc: &KvClient, active_workers: usize, data_dir: &std::path::Path) {
    set_active_workers(active_workers);
    let text_stats = text_kvc.pool_stats();
    let binary_stats = binary_kvc.pool_stats();
    record_pool_stats("text", text_stats);
    record_pool_stats("binary", binary_stats);
    let kvc_connections = text_stats.created + binary_stats.created;
    record_fd_breakdown(&fd::inspect(data_dir, kvc_connections));

    if let Ok(size) = text_kvc.zcard("domains:ready").await {
        set_frontier_size(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fetch_does_not_panic_without_recorder() {
        record_fetch("page", None, Some(Duration::from_millis(5)), Duration::from_millis(50));
        record_fetch("robots_txt", Some("timeout"), None, Duration::from_secs(1));
    }
}
