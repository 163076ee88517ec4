//! File-descriptor breakdown for the periodic metrics export. Reads
//! `/proc/self/fd` on Linux and categorizes each entry by its symlink
//! target; anywhere else (no `/proc`, or a non-Linux unix) a single
//! `unknown` bucket is reported instead of failing, since exact
//! categorization is an operational nicety.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdBreakdown {
    /// Sockets attributed to the KVC pools, up to `kvc_connections`
    /// (the sum of both pools' `created` counts at inspection time) —
    /// `/proc/self/fd` symlinks only say `socket:[inode]`, with no
    /// protocol, so the known pool occupancy is what separates this
    /// from `http_sockets` rather than any inspection of the socket
    /// itself.
    pub kvc_sockets: usize,
    /// Remaining sockets, attributed to the fetcher's HTTP/HTTPS
    /// connections.
    pub http_sockets: usize,
    pub frontier_files: usize,
    pub pipes: usize,
    pub prometheus: usize,
    pub other: usize,
}

impl FdBreakdown {
    pub fn total(&self) -> usize {
        self.kvc_sockets + self.http_sockets + self.frontier_files + self.pipes + self.prometheus + self.other
    }
}

/// Categorizes every open FD of the current process. `data_dir` is used
/// to recognize frontier-file targets by path prefix; `kvc_connections`
/// is the known KVC pool occupancy, used to split the raw socket count
/// into `kvc_sockets` vs `http_sockets`.
pub fn inspect(data_dir: &std::path::Path, kvc_connections: usize) -> FdBreakdown {
    read_proc_self_fd(data_dir, kvc_connections).unwrap_or_else(|| FdBreakdown { other: 1, ..Default::default() })
}

#[cfg(target_os = "linux")]
fn read_proc_self_fd(data_dir: &std::path::Path, kvc_connections: usize) -> Option<FdBreakdown> {
    let entries = std::fs::read_dir("/proc/self/fd").ok()?;
    let frontier_prefix = data_dir.join("frontier");
    let mut raw_sockets = 0usize;
    let mut breakdown = FdBreakdown::default();

    for entry in entries.flatten() {
        let Ok(target) = std::fs::read_link(entry.path()) else { continue };
        categorize(&target, &frontier_prefix, &mut raw_sockets, &mut breakdown);
    }
    split_sockets(raw_sockets, kvc_connections, &mut breakdown);
    Some(breakdown)
}

fn split_sockets(raw_sockets: usize, kvc_connections: usize, breakdown: &mut FdBreakdown) {
    breakdown.kvc_sockets = raw_sockets.min(kvc_connections);
    breakdown.http_sockets = raw_sockets - breakdown.kvc_sockets;
}

#[cfg(target_os = "linux")]
fn categorize(target: &std::path::Path, frontier_prefix: &std::path::Path, raw_sockets: &mut usize, breakdown: &mut FdBreakdown) {
    let target_str = target.to_string_lossy();
    if target_str.starts_with("socket:") {
        *raw_sockets += 1;
    } else if target_str.starts_with("pipe:") {
        breakdown.pipes += 1;
    } else if target_str.contains("prometheus") || target_str.ends_with(".prom") {
        breakdown.prometheus += 1;
    } else if target.starts_with(frontier_prefix) {
        breakdown.frontier_files += 1;
    } else {
        breakdown.other += 1;
    }
}

#[cfg(not(target_os = "linux"))]
fn read_proc_self_fd(_data_dir: &std::path::Path, _kvc_connections: usize) -> Option<FdBreakdown> {
    None
}

/// Counts from a raw list of "target" strings, exposed for testing the
/// categorization rules without needing a real `/proc/self/fd`.
#[cfg(test)]
fn categorize_all(targets: &[&str], frontier_prefix: &std::path::Path, kvc_connections: usize) -> FdBreakdown {
    let mut raw_sockets = 0usize;
    let mut breakdown = FdBreakdown::default();
    for target in targets {
        categorize_owned(target, frontier_prefix, &mut raw_sockets, &mut breakdown);
    }
    split_sockets(raw_sockets, kvc_connections, &mut breakdown);
    breakdown
}

#[cfg(test)]
fn categorize_owned(target: &str, frontier_prefix: &std::path::Path, raw_sockets: &mut usize, breakdown: &mut FdBreakdown) {
    let path = std::path::PathBuf::from(target);
    if target.starts_with("socket:") {
        *raw_sockets += 1;
    } else if target.starts_with("pipe:") {
        breakdown.pipes += 1;
    } else if target.contains("prometheus") || target.ends_with(".prom") {
        breakdown.prometheus += 1;
    } else if path.starts_with(frontier_prefix) {
        breakdown.frontier_files += 1;
    } else {
        breakdown.other += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_sockets_and_pipes() {
        let prefix = std::path::PathBuf::from("/data/frontier");
        let breakdown = categorize_all(
            &["socket:[12345]", "socket:[12346]", "pipe:[6789]", "/data/frontier/bucket0/example.com.frontier", "/etc/resolv.conf"],
            &prefix,
            1,
        );
        assert_eq!(breakdown.kvc_sockets, 1);
        assert_eq!(breakdown.http_sockets, 1);
        assert_eq!(breakdown.pipes, 1);
        assert_eq!(breakdown.frontier_files, 1);
        assert_eq!(breakdown.other, 1);
        assert_eq!(breakdown.total(), 5);
    }

    #[test]
    fn test_split_sockets_caps_kvc_at_known_pool_occupancy() {
        let mut breakdown = FdBreakdown::default();
        split_sockets(3, 10, &mut breakdown);
        assert_eq!(breakdown.kvc_sockets, 3);
        assert_eq!(breakdown.http_sockets, 0);
    }

    #[test]
    fn test_inspect_never_panics() {
        let dir = tempfile::TempDir::new().unwrap();
        let breakdown = inspect(dir.path(), 0);
        assert!(breakdown.total() < 100_000);
    }
}
