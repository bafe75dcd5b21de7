use crate::manifest::ServiceManifest;
use crate::report::{AnalysisReport, ReportBuilder};
use crate::scanner::FileScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Interceptor flow analyzer - infer the result types callers observe through interceptor pipelines
#[derive(Parser, Debug)]
#[command(name = "interceptor-flow")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to a service manifest or a directory of manifests
    #[arg(value_name = "MANIFEST_PATH")]
    pub manifest_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Only analyze the named service
    #[arg(short = 's', long = "service", value_name = "SERVICE")]
    pub service: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.manifest_path.exists() {
        anyhow::bail!(
            "Manifest path does not exist: {}",
            args.manifest_path.display()
        );
    }

    info!("Manifest path: {}", args.manifest_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if let Some(ref service) = args.service {
        info!("Service: {}", service);
    }

    Ok(args)
}

/// Load every manifest under `args.manifest_path` and analyze its services
pub fn analyze(args: &CliArgs) -> Result<AnalysisReport> {
    info!("Scanning for manifests...");
    let scan_result = FileScanner::new(args.manifest_path.clone()).scan()?;
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }
    if scan_result.manifest_files.is_empty() {
        anyhow::bail!(
            "No manifest files found in {}",
            args.manifest_path.display()
        );
    }
    info!("Found {} manifest files", scan_result.manifest_files.len());

    let mut services = Vec::new();
    let mut matched = false;

    for path in &scan_result.manifest_files {
        let manifest = ServiceManifest::from_path(path)?;
        let table = manifest.type_table()?;
        let mut builder = ReportBuilder::new(&table);

        for service in &manifest.services {
            if args.service.as_ref().is_some_and(|wanted| *wanted != service.name) {
                debug!("Skipping service '{}'", service.name);
                continue;
            }
            matched = true;
            builder.add_service(service)?;
        }

        services.extend(builder.build().services);
    }

    if let (Some(wanted), false) = (&args.service, matched) {
        anyhow::bail!("Service '{}' not found in any manifest", wanted);
    }

    Ok(AnalysisReport { services })
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting interceptor flow analysis...");
    let report = analyze(&args)?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&report)?,
        OutputFormat::Json => serialize_json(&report)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote analysis report to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    let endpoint_count: usize = report.services.iter().map(|s| s.endpoints.len()).sum();
    info!("Analysis complete!");
    info!("Summary:");
    info!("  - Services analyzed: {}", report.services.len());
    info!("  - Endpoints analyzed: {}", endpoint_count);

    Ok(())
}
