//! Batch processing command for multiple documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use docscan_core::ParseResult;

use super::config::load_config;
use super::pipeline::{is_supported, Pipeline};
use super::process::{format_result, OutputFormat, StrategyArg};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (overrides config)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome for a single file.
struct FileOutcome {
    path: PathBuf,
    result: Option<ParseResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.extraction.strategy = strategy.into();
    }

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut pipeline = Pipeline::new(config);
    let mut outcomes = Vec::with_capacity(files.len());

    for path in files {
        let file_start = Instant::now();
        let outcome = process_file(&mut pipeline, &path).await;
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                if let Some(output_dir) = &args.output_dir {
                    write_output(output_dir, &path, &result, args.format)?;
                }
                outcomes.push(FileOutcome {
                    path,
                    result: Some(result),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if !args.continue_on_error {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    pb.abandon();
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
                warn!("Failed to process {}: {}", path.display(), error_msg);
                outcomes.push(FileOutcome {
                    path,
                    result: None,
                    error: Some(error_msg),
                    processing_time_ms,
                });
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&FileOutcome> = outcomes.iter().filter(|o| o.error.is_some()).collect();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for outcome in &failed {
            eprintln!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_file(pipeline: &mut Pipeline, path: &Path) -> anyhow::Result<ParseResult> {
    let document = pipeline.load_document(path)?;
    Ok(pipeline.extract(&document).await)
}

fn write_output(
    output_dir: &Path,
    input: &Path,
    result: &ParseResult,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let output_path = output_dir.join(format!("{}.{}", stem, format.extension()));
    fs::write(&output_path, format_result(result, format)?)?;
    debug!("Wrote output to {}", output_path.display());

    Ok(())
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "source",
        "invoice_number",
        "date",
        "customer",
        "rows",
        "total",
        "entities",
        "warnings",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let time = outcome.processing_time_ms.to_string();

        match &outcome.result {
            Some(result) => {
                let metadata = &result.metadata;
                let source = serde_json::to_value(result.source)?;
                wtr.write_record([
                    filename,
                    "success",
                    source.as_str().unwrap_or(""),
                    metadata.invoice_number.as_deref().unwrap_or(""),
                    metadata.date.as_deref().unwrap_or(""),
                    metadata.customer.as_deref().unwrap_or(""),
                    result.rows.len().to_string().as_str(),
                    total_amount(result).unwrap_or(""),
                    result.entities.len().to_string().as_str(),
                    result.warnings.join("; ").as_str(),
                    time.as_str(),
                    "",
                ])?;
            }
            None => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    "",
                    time.as_str(),
                    outcome.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Amount of the last summary line labeled as a total.
fn total_amount(result: &ParseResult) -> Option<&str> {
    result
        .summary
        .iter()
        .rev()
        .find(|line| line.label.to_lowercase().contains("total"))
        .map(|line| line.amount.as_str())
}
