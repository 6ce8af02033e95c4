//! rb-analyze: aggregate reliable-broadcast benchmark artifacts
//!
//! ```text
//! rb-analyze summary  results/*round-50_echo-20 --out summary.parquet
//! rb-analyze links    results/*round-50_echo-20 --per-peer --max-payload 8192
//! rb-analyze overhead --baseline results/baseline --treatment results/round-50_echo-20
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use anyhow::Context;
use arrow::array::RecordBatch;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rb_bench_analysis::batch::ErrorMode;
use rb_bench_analysis::config::AnalysisConfig;
use rb_bench_analysis::pipeline::{
    Analysis, AnalysisReport, ExperimentSource, LinkGrouping, OverheadAnalysis,
};
use rb_bench_analysis::table::write_parquet;
use rb_bench_analysis::units::Unit;

#[derive(Parser, Debug)]
#[command(name = "rb-analyze", version, about = "Reliable-broadcast benchmark analysis")]
struct Cli {
    /// JSON analysis config (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Abort on the first unreadable or malformed artifact
    #[arg(long, global = true)]
    strict: bool,

    /// Ignore artifacts with a payload above this many bytes
    #[arg(long, global = true)]
    max_payload: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-configuration summary of peer records
    Summary {
        /// Experiment directories (keys decoded from round-/echo- tags)
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Baseline directories (no protocol tags)
        #[arg(long)]
        baseline: Vec<PathBuf>,
        /// Write group statistics as Parquet
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write delivery totals as Parquet
        #[arg(long)]
        delivery_out: Option<PathBuf>,
    },
    /// Link-level statistics by locality
    Links {
        /// Experiment directories (keys decoded from round-/echo- tags)
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Baseline directories (no protocol tags)
        #[arg(long)]
        baseline: Vec<PathBuf>,
        /// Partition by destination peer as well
        #[arg(long)]
        per_peer: bool,
        /// Write group statistics as Parquet
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Throughput and latency overhead against a baseline
    Overhead {
        /// Baseline directories
        #[arg(long, required = true)]
        baseline: Vec<PathBuf>,
        /// Treatment directories, all with one configuration key
        #[arg(long, required = true)]
        treatment: Vec<PathBuf>,
        /// Fail when the two sides do not cover the same keys
        #[arg(long)]
        require_aligned: bool,
        /// Write overhead rows as Parquet
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn sources(dirs: &[PathBuf], baseline: &[PathBuf]) -> Vec<ExperimentSource> {
    baseline
        .iter()
        .map(ExperimentSource::baseline)
        .chain(dirs.iter().map(ExperimentSource::decode))
        .collect()
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if cli.strict {
        config = config.with_error_mode(ErrorMode::Strict);
    }
    if cli.max_payload.is_some() {
        config = config.with_max_payload_size(cli.max_payload);
    }
    Ok(config)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn print_report(report: &AnalysisReport) {
    for group in &report.groups {
        println!("{}  (records: {})", group.key(), group.record_count());
        for (metric, stats) in group.metrics() {
            let unit = stats.unit().map_or("-", Unit::symbol);
            println!(
                "    {:<13} mean {:>12} std {:>12} n {:>4} [{unit}]",
                metric.name(),
                fmt_opt(stats.mean()),
                fmt_opt(stats.std_dev()),
                stats.sample_count(),
            );
        }
    }
    for rate in &report.delivery {
        println!(
            "delivery {}: {}/{} ({})",
            rate.key(),
            rate.received(),
            rate.expected(),
            fmt_opt(rate.ratio())
        );
    }
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.path.display(), skipped.error);
    }
    println!(
        "groups: {}, records: {}, skipped: {}, filtered: {}, excluded: {}, substituted: {} ({})",
        report.groups.len(),
        report.record_count,
        report.skipped.len(),
        report.filtered,
        report.excluded,
        report.substituted,
        report.generated_at.to_rfc3339(),
    );
}

fn print_overhead(analysis: &OverheadAnalysis) {
    for row in &analysis.overhead.rows {
        println!(
            "{}  throughput overhead {:>8.2} %  latency {:>+10.3} {}",
            row.key,
            row.throughput_overhead_pct,
            row.latency_overhead_abs,
            row.latency_unit
        );
    }
    let report = &analysis.overhead;
    for key in &report.baseline_only {
        eprintln!("only in baseline: {key}");
    }
    for key in &report.treatment_only {
        eprintln!("only in treatment: {key}");
    }
    for key in &report.undefined {
        eprintln!("undefined overhead: {key}");
    }
}

fn write_out<F>(path: Option<&Path>, batch: F) -> anyhow::Result<()>
where
    F: FnOnce() -> rb_bench_analysis::Result<RecordBatch>,
{
    if let Some(path) = path {
        write_parquet(path, &batch()?).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Summary {
            dirs,
            baseline,
            out,
            delivery_out,
        } => {
            let analysis = Analysis::new(config)?;
            let report = analysis.summarize(&sources(&dirs, &baseline))?;
            print_report(&report);
            write_out(out.as_deref(), || report.stats_batch())?;
            write_out(delivery_out.as_deref(), || report.delivery_batch())?;
        }
        Command::Links {
            dirs,
            baseline,
            per_peer,
            out,
        } => {
            let grouping = if per_peer {
                LinkGrouping::Destination
            } else {
                LinkGrouping::Locality
            };
            let analysis = Analysis::new(config)?;
            let report = analysis.links(&sources(&dirs, &baseline), grouping)?;
            print_report(&report);
            write_out(out.as_deref(), || report.stats_batch())?;
        }
        Command::Overhead {
            baseline,
            treatment,
            require_aligned,
            out,
        } => {
            let config = if require_aligned {
                config.with_require_aligned(true)
            } else {
                config
            };
            let analysis = Analysis::new(config)?;
            let baseline = sources(&[], &baseline);
            let treatment = sources(&treatment, &[]);
            let result = analysis.compare(&baseline, &treatment)?;
            print_overhead(&result);
            write_out(out.as_deref(), || result.overhead_batch())?;
        }
    }
    Ok(())
}
