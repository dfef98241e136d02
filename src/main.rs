use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};

use vocal_metrics::{AnalysisConfig, FallbackAnalyzer, MetricsRecord, Pipeline, SessionSummary, VoiceAnalyzer};

/// Analyze voice recordings and print their vocal metrics as JSON
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Audio files to analyze (WAV, FLAC, MP3, OGG, M4A, ...)
    #[arg(required_unless_present = "print_config")]
    files: Vec<PathBuf>,

    /// Path to a JSON config file (defaults to ~/.vocal-metrics/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Media type hint for every input (e.g. "audio/wav")
    #[arg(short, long)]
    media_type: Option<String>,

    /// Return demo metrics instead of analyzing (confidence is always 0)
    #[arg(long)]
    fallback: bool,

    /// Also print a summary across all successfully analyzed files
    #[arg(short, long)]
    summary: bool,

    /// Pretty-print JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (stdout carries the JSON results)
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(&args)?;

    if args.print_config {
        print_json(&serde_json::to_value(&config)?, args.pretty)?;
        return Ok(());
    }

    let analyzer: Arc<dyn VoiceAnalyzer> = if args.fallback {
        warn!("Using fallback analyzer: results are demo values");
        Arc::new(FallbackAnalyzer::default())
    } else {
        Arc::new(Pipeline::new(config).context("Invalid analysis configuration")?)
    };

    info!("Analyzing {} file(s)", args.files.len());

    // One blocking task per recording
    let handles: Vec<_> = args
        .files
        .iter()
        .cloned()
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            let media_type = args.media_type.clone();
            tokio::task::spawn_blocking(move || {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok::<_, anyhow::Error>(analyzer.analyze_voice(&bytes, media_type.as_deref()))
            })
        })
        .collect();

    let mut records: Vec<MetricsRecord> = Vec::new();
    let mut failures = 0usize;

    for (path, handle) in args.files.iter().zip(handles) {
        let file = path.display().to_string();
        let output = match handle.await.context("Analysis task panicked")? {
            Ok(Ok(record)) => {
                let value = json!({ "file": file, "metrics": &record });
                records.push(record);
                value
            }
            Ok(Err(e)) => {
                failures += 1;
                warn!("{}: {}", file, e);
                json!({ "file": file, "error": { "code": e.code(), "message": e.to_string() } })
            }
            Err(e) => {
                failures += 1;
                error!("{:#}", e);
                json!({ "file": file, "error": { "code": "io_error", "message": format!("{:#}", e) } })
            }
        };
        print_json(&output, args.pretty)?;
    }

    if args.summary {
        match SessionSummary::from_records(&records) {
            Some(summary) => print_json(&json!({ "summary": summary }), args.pretty)?,
            None => warn!("No successful analyses to summarize"),
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} recordings could not be analyzed", failures, args.files.len());
    }

    info!("Done");
    Ok(())
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => match AnalysisConfig::default_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("No default config location ({:#}); using built-in defaults", e);
                return Ok(AnalysisConfig::default());
            }
        },
    };
    info!("Config: {:?}", path);
    AnalysisConfig::load(&path)
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}
