//! Interceptor flow analyzer - command-line tool.
//!
//! Reads service manifests describing interceptor pipelines and endpoints,
//! and reports for each endpoint the result types a caller can observe,
//! split by whether an interceptor or the target resource produced them.
//!
//! # Usage
//!
//! ```bash
//! interceptor-flow [OPTIONS] <MANIFEST_PATH>
//! ```
//!
//! # Examples
//!
//! Analyze one manifest:
//! ```bash
//! interceptor-flow ./petstore.yaml
//! ```
//!
//! Analyze a directory of manifests as JSON:
//! ```bash
//! interceptor-flow ./manifests -f json -o report.json
//! ```
//!
//! Analyze a single service with verbose logging:
//! ```bash
//! interceptor-flow ./manifests -s petstore -v
//! ```

use anyhow::Result;
use clap::Parser;
use interceptor_flow::cli;
use log::info;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Interceptor flow analyzer starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    Ok(())
}
