//! Sumi-Ripple: a polite, high-throughput single-node web crawler.
//!
//! This is the orchestrator binary. `--dry-run` operates purely against
//! the optional local config and needs no KV service connection; any
//! other invocation starts the full crawl.

use clap::Parser;
use sumi_ripple::config::RuntimeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RuntimeConfig::parse();
    setup_logging(config.verbose, config.quiet);

    if config.dry_run {
        return handle_dry_run(&config);
    }

    match sumi_ripple::orchestrator::run(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "orchestrator exited with a fatal error");
            Err(e.into())
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_ripple=info,warn"),
            1 => EnvFilter::new("sumi_ripple=debug,info"),
            2 => EnvFilter::new("sumi_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn require_supplemental_config(config: &RuntimeConfig) -> Result<sumi_ripple::config::Config, Box<dyn std::error::Error>> {
    let path = config
        .config
        .as_ref()
        .ok_or("this mode requires --config <path> (the supplemental TOML file of quality/blacklist/stub domain tables)")?;
    Ok(sumi_ripple::config::load_config(path)?)
}

fn handle_dry_run(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_config = require_supplemental_config(config)?;

    println!("=== Sumi-Ripple Dry Run ===\n");
    println!("Seed file: {:?}", config.seed_file);
    println!("Data dir: {}", config.data_dir.display());
    println!("Max workers: {}", config.max_workers);
    println!("Redis: {}:{}/{}", config.redis_host, config.redis_port, config.redis_db);
    println!("Min fetch delay: {}s", config.min_fetch_delay_seconds);

    println!("\nQuality Domains ({}):", toml_config.quality.len());
    for entry in &toml_config.quality {
        println!("  - {} ({} seeds)", entry.domain, entry.seeds.len());
    }

    println!("\nBlacklisted Domains ({}):", toml_config.blacklist.len());
    for entry in &toml_config.blacklist {
        println!("  - {}", entry.domain);
    }

    println!("\nStubbed Domains ({}):", toml_config.stub.len());
    for entry in &toml_config.stub {
        println!("  - {}", entry.domain);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
