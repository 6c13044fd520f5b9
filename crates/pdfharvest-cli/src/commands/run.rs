//! Extraction run: process a directory, analyze, and write outputs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use pdfharvest_core::batch::{BatchProcessor, FileOutcome};
use pdfharvest_core::charts::{ChartOutcome, ChartRenderer};
use pdfharvest_core::export::{ExportOutcome, Exporter, ensure_dir};
use pdfharvest_core::models::config::HarvestConfig;
use pdfharvest_core::models::record::{BatchResult, DocumentType};
use pdfharvest_core::{Analyzer, PatternSet, RecordBuilder};

use super::config::load_config;

/// Kind of document to extract.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum DocumentKind {
    /// Vendor invoices
    Invoice,
    /// Business and financial reports
    Report,
}

impl From<DocumentKind> for DocumentType {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Invoice => DocumentType::Invoice,
            DocumentKind::Report => DocumentType::Report,
        }
    }
}

/// Arguments for an extraction run.
#[derive(Args)]
pub struct RunArgs {
    /// Type of documents in the input directory
    #[arg(short = 't', long = "type", value_enum, required = true)]
    doc_type: Option<DocumentKind>,

    /// Directory containing PDF files
    #[arg(short, long, required = true)]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Anomaly threshold in standard deviations
    #[arg(long)]
    threshold: Option<f64>,

    /// Group records by a field (repeat for nested groups)
    #[arg(short, long = "group-by")]
    group_by: Vec<String>,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,
}

pub fn run(args: RunArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let (Some(kind), Some(input)) = (args.doc_type, args.input.as_deref()) else {
        anyhow::bail!("--type and --input are required");
    };
    let document_type = DocumentType::from(kind);

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args, document_type);

    // Everything that can be misconfigured is checked before any file is read
    let patterns = PatternSet::compile(
        document_type,
        &config.extraction.pattern_set(document_type),
    )
    .with_context(|| format!("invalid {} pattern set", document_type))?;

    let analyzer = Analyzer::from_config(&patterns, &config.analysis)
        .context("invalid analysis configuration")?;

    let files = BatchProcessor::discover(input)?;
    if files.is_empty() {
        println!(
            "{} No PDF files found in {}",
            style("ℹ").blue(),
            input.display()
        );
    } else {
        println!(
            "{} Found {} {} files to process",
            style("ℹ").blue(),
            files.len(),
            document_type
        );
    }

    ensure_dir(&args.output)
        .with_context(|| format!("cannot create output directory {}", args.output.display()))?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    let processor = BatchProcessor::new(
        &patterns,
        RecordBuilder::from_config(&config.extraction),
    );
    let batch = processor.process_files(&files, |path, outcome| {
        if let FileOutcome::Failed(failure) = outcome {
            debug!("{} failed: {}", path.display(), failure.reason);
        }
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        pb.inc(1);
    });
    pb.finish_and_clear();

    let report = analyzer.analyze(&batch);
    info!(
        "{} anomalies at {}σ",
        report.anomalies.len(),
        analyzer.threshold()
    );

    let exports = Exporter::new(&args.output, &patterns)
        .with_config(config.output.clone())
        .export(&batch, &report);

    let charts = if config.output.charts {
        ChartRenderer::new(args.output.join("charts"))
            .with_size(config.output.chart_width, config.output.chart_height)
            .render(&batch, &report)
    } else {
        Vec::new()
    };

    print_summary(&batch, report.anomalies.len(), &exports, &charts, &args.output);
    println!();
    println!(
        "{} Finished in {:?}",
        style("✓").green(),
        start.elapsed()
    );

    let failed: Vec<&ExportOutcome> = exports.iter().filter(|o| !o.is_ok()).collect();
    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|o| o.target.to_string()).collect();
        anyhow::bail!("failed to write {}", names.join(", "));
    }

    Ok(())
}

fn apply_overrides(config: &mut HarvestConfig, args: &RunArgs, document_type: DocumentType) {
    if let Some(threshold) = args.threshold {
        config.analysis.anomaly_threshold = threshold;
    }
    if !args.group_by.is_empty() {
        config
            .analysis
            .set_group_by(document_type, args.group_by.clone());
    }
    if args.no_charts {
        config.output.charts = false;
    }
}

fn print_summary(
    batch: &BatchResult,
    anomalies: usize,
    exports: &[ExportOutcome],
    charts: &[ChartOutcome],
    output: &Path,
) {
    println!();
    println!(
        "{} Processed {} files",
        style("✓").green(),
        batch.total()
    );
    println!(
        "   {} extracted, {} failed, {} anomalies",
        style(batch.records.len()).green(),
        style(batch.failures.len()).red(),
        style(anomalies).yellow()
    );

    if !batch.failures.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for failure in &batch.failures {
            println!("  - {}: {}", failure.filename, failure.reason);
        }
    }

    println!();
    println!("{} {}", style("Outputs in").bold(), output.display());
    for outcome in exports {
        match &outcome.result {
            Ok(()) => println!("  {} {}", style("✓").green(), outcome.target),
            Err(e) => println!("  {} {}: {}", style("✗").red(), outcome.target, e),
        }
    }

    let rendered = charts.iter().filter(|c| c.is_ok()).count();
    if !charts.is_empty() {
        println!(
            "  {} {} of {} charts",
            if rendered == charts.len() {
                style("✓").green()
            } else {
                style("!").yellow()
            },
            rendered,
            charts.len()
        );
        for chart in charts.iter().filter(|c| !c.is_ok()) {
            if let Err(e) = &chart.result {
                println!("    {} {}", style("✗").red(), e);
            }
        }
    }
}
