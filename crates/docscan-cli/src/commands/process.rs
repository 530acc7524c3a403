//! Process command - structure a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use docscan_core::models::config::{DocscanConfig, Strategy};
use docscan_core::{ParseResult, ThresholdMethod};

use super::config::load_config;
use super::pipeline::Pipeline;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (image, or .txt with already recognized text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (overrides config)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Straighten rotated scans before OCR
    #[arg(long)]
    deskew: bool,

    /// Binarization method (overrides config)
    #[arg(long, value_enum)]
    threshold: Option<ThresholdArg>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV of table rows
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StrategyArg {
    /// Loose entities only
    Regex,
    /// Metadata, table and summary
    Zone,
    /// Remote oracle with zone fallback
    Oracle,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Regex => Strategy::Regex,
            StrategyArg::Zone => Strategy::Zone,
            StrategyArg::Oracle => Strategy::Oracle,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ThresholdArg {
    None,
    Simple,
    Otsu,
    Adaptive,
}

impl From<ThresholdArg> for ThresholdMethod {
    fn from(arg: ThresholdArg) -> Self {
        match arg {
            ThresholdArg::None => ThresholdMethod::None,
            ThresholdArg::Simple => ThresholdMethod::Simple,
            ThresholdArg::Otsu => ThresholdMethod::Otsu,
            ThresholdArg::Adaptive => ThresholdMethod::Adaptive,
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    pb.set_message("Loading document...");
    let mut pipeline = Pipeline::new(config);
    let document = pipeline.load_document(&args.input)?;

    pb.set_message("Extracting structure...");
    let result = pipeline.extract(&document).await;
    pb.finish_and_clear();

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for warning in &result.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn apply_overrides(config: &mut DocscanConfig, args: &ProcessArgs) {
    if let Some(strategy) = args.strategy {
        config.extraction.strategy = strategy.into();
    }
    if args.deskew {
        config.preprocessing.deskew = true;
    }
    if let Some(threshold) = args.threshold {
        config.preprocessing.threshold = threshold.into();
    }
}

pub fn format_result(result: &ParseResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

/// Table rows under the schema header. Empty when no table was found.
fn format_csv(result: &ParseResult) -> anyhow::Result<String> {
    let columns = result.schema.columns();
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(columns.iter().map(|c| c.name()))?;

    for row in &result.rows {
        wtr.write_record(columns.iter().map(|c| row.get(*c).unwrap_or("")))?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ParseResult) -> String {
    let mut output = String::new();
    let metadata = &result.metadata;

    let fields = [
        ("Invoice", &metadata.invoice_number),
        ("Date", &metadata.date),
        ("Due date", &metadata.due_date),
        ("Customer", &metadata.customer),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            output.push_str(&format!("{}: {}\n", label, value));
        }
    }

    if !result.schema.is_empty() {
        let header: Vec<&str> = result.schema.columns().iter().map(|c| c.name()).collect();
        output.push_str(&format!("\nItems ({}):\n", header.join(" | ")));
        for row in &result.rows {
            let cells: Vec<&str> = row.iter().map(|(_, cell)| cell.as_str()).collect();
            output.push_str(&format!("  {}\n", cells.join(" | ")));
        }
    } else if !result.raw_headers.is_empty() {
        output.push_str(&format!("\nUnrecognized header: {}\n", result.raw_headers.join(" ")));
    }

    if !result.summary.is_empty() {
        output.push_str("\nSummary:\n");
        for line in &result.summary {
            match line.currency {
                Some(currency) => {
                    output.push_str(&format!("  {}: {} {}\n", line.label, line.amount, currency))
                }
                None => output.push_str(&format!("  {}: {}\n", line.label, line.amount)),
            }
        }
    }

    output.push_str(&format!("\nEntities: {}\n", result.entities.len()));
    output
}
