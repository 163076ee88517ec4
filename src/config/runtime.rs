//! CLI-driven runtime configuration for the orchestrator binary. This
//! is distinct from [`super::Config`] (the optional TOML layer of
//! quality/blacklist/stub domain tables): `RuntimeConfig` carries every
//! flag needed to run a crawl and has a usable default for each one, so
//! `sumi-ripple --seed-file seeds.txt` alone is enough to start.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sumi-ripple")]
#[command(version = "2.0.0")]
#[command(about = "A polite, high-throughput single-node web crawler", long_about = None)]
pub struct RuntimeConfig {
    /// Path to a newline-separated file of seed URLs.
    #[arg(long, value_name = "PATH")]
    pub seed_file: Option<PathBuf>,

    /// Contact email advertised in the crawler's User-Agent string.
    #[arg(long)]
    pub email: Option<String>,

    /// Directory for frontier files and the content store.
    #[arg(long, value_name = "PATH", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Maximum number of concurrent worker tasks.
    #[arg(long, default_value_t = 500)]
    pub max_workers: usize,

    #[arg(long, default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, default_value_t = 0)]
    pub redis_db: u8,

    /// Overridden by the `REDIS_PASSWORD` environment variable, if set.
    #[arg(long)]
    pub redis_password: Option<String>,

    #[arg(long, default_value = "SumiRipple/2.0")]
    pub user_agent: String,

    /// Floor on the delay between requests to the same domain, in
    /// seconds; robots.txt `Crawl-delay` only raises this, never lowers
    /// it.
    #[arg(long, default_value_t = 70.0)]
    pub min_fetch_delay_seconds: f64,

    /// Port the Prometheus scrape endpoint listens on.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Optional supplemental TOML file of quality/blacklist/stub domain
    /// tables, layered on top of the flags above.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Validate configuration and print what would be crawled, without
    /// touching the KV service.
    #[arg(long)]
    pub dry_run: bool,
}

impl RuntimeConfig {
    /// Resolves the Redis password, letting `REDIS_PASSWORD` override
    /// `--redis-password` per the environment-variable rule.
    pub fn redis_password(&self) -> Option<String> {
        std::env::var("REDIS_PASSWORD").ok().or_else(|| self.redis_password.clone())
    }

    /// Builds the `redis://` connection URL from host/port/db/password.
    pub fn redis_url(&self) -> String {
        match self.redis_password() {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }
}

/// Reduced CLI surface for the `sumi-parser` Parser Consumer binary,
/// which is spawned (not hand-configured) by the orchestrator and only
/// needs enough to build its own independent KVC handles.
#[derive(Parser, Debug, Clone)]
#[command(name = "sumi-parser")]
#[command(about = "Parser Consumer worker process for sumi-ripple", long_about = None)]
pub struct ParserConfig {
    #[arg(long, default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, default_value_t = 0)]
    pub redis_db: u8,

    #[arg(long)]
    pub redis_password: Option<String>,

    #[arg(long, value_name = "PATH", default_value = "./data")]
    pub data_dir: PathBuf,

    #[arg(long, default_value_t = 80)]
    pub workers: usize,
}

impl ParserConfig {
    pub fn redis_password(&self) -> Option<String> {
        std::env::var("REDIS_PASSWORD").ok().or_else(|| self.redis_password.clone())
    }

    pub fn redis_url(&self) -> String {
        match self.redis_password() {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_without_password() {
        let cfg = RuntimeConfig::parse_from(["sumi-ripple", "--seed-file", "seeds.txt"]);
        assert_eq!(cfg.redis_url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_redis_url_with_flag_password() {
        std::env::remove_var("REDIS_PASSWORD");
        let cfg = RuntimeConfig::parse_from(["sumi-ripple", "--redis-password", "hunter2"]);
        assert_eq!(cfg.redis_url(), "redis://:hunter2@127.0.0.1:6379/0");
    }
}
