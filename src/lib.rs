//! Sumi-Ripple: a polite, high-throughput single-node web crawler.
//!
//! Maps link relationships between websites while respecting
//! robots.txt and per-domain rate limits. Frontier state, visited
//! records, and the seen-URL filter all live in an external KV service
//! so the crawl can resume across restarts.

pub mod config;
pub mod fetcher;
pub mod frontier;
pub mod frontier_files;
pub mod kvc;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod politeness;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Ripple operations
#[derive(Debug, Error)]
pub enum SumiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Visit record error: {0}")]
    Visit(#[from] storage::VisitError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetcher::FetchError),

    #[error("KV service error: {0}")]
    Kvc(#[from] kvc::KvcError),

    #[error("Frontier file error: {0}")]
    FrontierFile(#[from] frontier_files::FrontierFileError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] frontier::FrontierError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Ripple operations
pub type Result<T> = std::result::Result<T, SumiError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use url::{extract_domain, normalize_url};
