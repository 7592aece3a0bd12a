use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reachscan::config::{self, ConfigResult};
use reachscan::core::{
    AdvisorySource, AnalyzerOptions, OsvClient, ReachabilityAnalyzer, ScanOptions, ScanReport,
    StaticAdvisorySource,
};
use reachscan::formatters::{JsonFormatter, TextFormatter};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "reachscan",
    version,
    author = "reachscan developers",
    about = "Finds calls into vulnerable dependency functions"
)]
struct Cli {
    /// Repository directory to analyze
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    input: PathBuf,

    /// Report format
    #[arg(short, long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Comma-separated list of languages to analyze (default: all)
    #[arg(short, long, value_name = "LANGS", value_delimiter = ',')]
    languages: Vec<String>,

    /// Read advisories from an OSV JSON file instead of querying osv.dev
    #[arg(long, value_name = "FILE")]
    advisories: Option<PathBuf>,

    /// Config file (default: nearest reachscan.toml at or above the input)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra gitignore-style exclusion patterns
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Do not honour the repository's .gitignore
    #[arg(long)]
    no_gitignore: bool,

    /// Regex-based extraction for JavaScript/TypeScript files the parser rejects
    #[arg(long)]
    legacy_fallback: bool,

    /// Persist per-file extraction results between runs
    #[arg(long)]
    disk_cache: bool,

    /// Debug logging and a fuller report
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "reachscan=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<ConfigResult> {
    let result = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_config_or_default(&cli.input)?,
    };
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(result)
}

fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();
    let settings = load_settings(&cli)?.config;

    let languages = if cli.languages.is_empty() {
        settings.languages()?
    } else {
        config::parse_languages(&cli.languages)?
    };
    let mut exclude = settings.exclude.clone();
    exclude.extend(cli.exclude.iter().cloned());

    let options = AnalyzerOptions {
        scan: ScanOptions {
            languages,
            exclude,
            respect_gitignore: settings.respect_gitignore && !cli.no_gitignore,
        },
        legacy_fallback: settings.legacy_fallback || cli.legacy_fallback,
        disk_cache: settings.disk_cache || cli.disk_cache,
    };

    let source: Box<dyn AdvisorySource + Sync> = match &cli.advisories {
        Some(path) => {
            let source = StaticAdvisorySource::from_json_file(path)?;
            info!("Loaded {} advisories from {}", source.len(), path.display());
            Box::new(source)
        }
        None => Box::new(
            OsvClient::new(settings.advisories.client_settings())
                .context("failed to build OSV client")?,
        ),
    };

    let analyzer = ReachabilityAnalyzer::new(source, options);
    let report = analyzer.analyze(&cli.input)?;
    info!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    emit(&report, cli.format, cli.verbose, cli.output.as_deref())
}

fn emit(report: &ScanReport, format: OutputFormat, verbose: bool, output: Option<&Path>) -> Result<()> {
    let text = TextFormatter::new().with_verbose(verbose);
    let json = JsonFormatter::new();

    let Some(path) = output else {
        let rendered = match format {
            OutputFormat::Text => text.format(report)?,
            OutputFormat::Json => json.format(report)?,
        };
        print!("{rendered}");
        return Ok(());
    };

    match format {
        OutputFormat::Text => text.format_to_file(report, path),
        OutputFormat::Json => json.format_to_file(report, path),
    }
    .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}
