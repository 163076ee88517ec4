//! Entry point for the `tests/integration/` test modules. Cargo only
//! auto-discovers `.rs` files directly under `tests/` as integration
//! test binaries, so this file exists purely to pull in the actual
//! suite next to it.

#[path = "integration/crawl_tests.rs"]
mod crawl_tests;
