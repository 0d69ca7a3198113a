//! CLI entry point for the data-quality engine.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sieve::loader::{self, LoadOptions, LoadedDataset};
use sieve::{
    ColumnSpec, ColumnType, JsonFileSink, Outcome, Pipeline, Profiler, StrategyConfig,
    TracingSink,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Auditable batch data-quality engine",
    long_about = "Profiles a CSV dataset, resolves missing values, outliers and duplicates, \
                  validates every stage and writes the cleaned data plus a quality report.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RUST_LOG              Overrides --log-level (tracing EnvFilter syntax)\n\n\
                  EXAMPLES:\n  \
                  # Clean with the default strategy\n  \
                  sieve run -i data.csv -o out/\n\n  \
                  # Clean with a strategy file and declared column types\n  \
                  sieve run -i data.csv -c strategy.json -t price=float -t ts=timestamp\n\n  \
                  # Lowercase a text column while loading\n  \
                  sieve run -i orders.csv --lowercase product\n\n  \
                  # Inspect data quality without changing anything\n  \
                  sieve profile -i data.csv"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the result)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write the cleaned dataset and report
    Run {
        /// Path to the CSV file to process
        #[arg(short, long)]
        input: PathBuf,

        /// Strategy configuration (JSON). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for the cleaned CSV and the report
        #[arg(short, long, default_value = "./outputs")]
        output: PathBuf,

        /// Declared column type, as NAME=TYPE; may be repeated
        #[arg(short = 't', long = "type", value_parser = parse_column_spec)]
        types: Vec<ColumnSpec>,

        /// Text column to lowercase while loading; may be repeated
        #[arg(long = "lowercase", value_name = "COLUMN")]
        lowercase: Vec<String>,

        /// Print the report as JSON to stdout instead of a summary
        ///
        /// Disables all logging so stdout only holds the report.
        #[arg(long)]
        json: bool,
    },

    /// Profile a dataset without changing it
    Profile {
        /// Path to the CSV file to profile
        #[arg(short, long)]
        input: PathBuf,

        /// Strategy configuration (JSON); used for duplicate and outlier candidates
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Declared column type, as NAME=TYPE; may be repeated
        #[arg(short = 't', long = "type", value_parser = parse_column_spec)]
        types: Vec<ColumnSpec>,

        /// Text column to lowercase while loading; may be repeated
        #[arg(long = "lowercase", value_name = "COLUMN")]
        lowercase: Vec<String>,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_column_spec(raw: &str) -> std::result::Result<ColumnSpec, String> {
    let (name, ty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TYPE, got '{raw}'"))?;
    let column_type = match ty.trim().to_ascii_lowercase().as_str() {
        "integer" | "int" => ColumnType::Integer,
        "float" | "number" => ColumnType::Float,
        "text" | "string" => ColumnType::Text,
        "boolean" | "bool" => ColumnType::Boolean,
        "timestamp" | "datetime" | "date" => ColumnType::Timestamp,
        other => return Err(format!("unknown column type '{other}'")),
    };
    Ok(ColumnSpec::new(name.trim(), column_type))
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json_output = match &args.command {
        Command::Run { json, .. } | Command::Profile { json, .. } => *json,
    };
    init_logging(&args.log_level, args.quiet, json_output);

    dotenv().ok();

    match args.command {
        Command::Run {
            input,
            config,
            output,
            types,
            lowercase,
            json,
        } => {
            let options = LoadOptions { lowercase };
            run(&input, config.as_deref(), &output, &types, &options, json, args.quiet)
        }
        Command::Profile {
            input,
            config,
            types,
            lowercase,
            json,
        } => profile(&input, config.as_deref(), &types, &LoadOptions { lowercase }, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    let Some(path) = path else {
        info!("No strategy file given; using defaults");
        return Ok(StrategyConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read strategy file {}", path.display()))?;
    let config: StrategyConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid strategy file {}", path.display()))?;
    config.validate()?;
    info!("Loaded strategy from {}", path.display());
    Ok(config)
}

fn load_dataset(input: &Path, types: &[ColumnSpec], options: &LoadOptions) -> Result<LoadedDataset> {
    let loaded = loader::load_csv_with(input, types, options)?;
    let unparseable = loaded.unparseable_total();
    if unparseable > 0 {
        warn!("{} entries did not match their column type and were read as missing", unparseable);
    }
    Ok(loaded)
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

fn run(
    input: &Path,
    config: Option<&Path>,
    output: &Path,
    types: &[ColumnSpec],
    options: &LoadOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let loaded = load_dataset(input, types, options)?;

    if !output.exists() {
        fs::create_dir_all(output)?;
        info!("Created output directory: {}", output.display());
    }
    let stem = file_stem(input);
    let report_path = output.join(format!("{stem}_report.json"));
    let data_path = output.join(format!("{stem}_cleaned.csv"));

    let mut builder = Pipeline::builder()
        .config(config)
        .sink(JsonFileSink::new(&report_path));
    if !json {
        builder = builder.sink(TracingSink);
    }
    if !quiet && !json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.phase.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    info!("{}", "=".repeat(80));
    info!("Starting data-quality run...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run(loaded.dataset).map_err(|e| {
        error!("Run failed: {}", e);
        anyhow!("Run failed: {}", e)
    })?;

    for e in &result.sink_errors {
        error!("Could not persist report: {}", e);
    }
    loader::write_csv(&result.dataset, &data_path)?;

    if json {
        println!("{}", result.report.to_json_pretty()?);
    } else {
        print_summary(&result.report, &data_path, &report_path);
    }

    match result.outcome {
        Outcome::Completed => Ok(()),
        Outcome::PartialSuccess => {
            warn!("Run finished with partial success; see the report for details");
            Ok(())
        }
        Outcome::Aborted | Outcome::Cancelled => bail!("Run {}", result.outcome),
    }
}

/// Human-readable run summary.
///
/// Uses `println!` so the summary shows regardless of log level.
fn print_summary(report: &sieve::QualityReport, data_path: &Path, report_path: &Path) {
    let summary = report.summary();
    println!("\n{}", "=".repeat(80));
    println!(
        "RUN {}",
        report
            .outcome()
            .map(|o| o.to_string().to_uppercase())
            .unwrap_or_default()
    );
    println!("{}", "=".repeat(80));
    println!(
        "  Rows:     {} -> {} ({} removed)",
        summary.rows_before,
        summary.rows_after,
        summary.rows_removed()
    );
    println!(
        "  Columns:  {} -> {} ({} removed)",
        summary.columns_before,
        summary.columns_after,
        summary.columns_removed()
    );
    println!(
        "  Quality:  {:.1}% -> {:.1}% ({:+.1} pts)",
        summary.quality_score_before * 100.0,
        summary.quality_score_after * 100.0,
        summary.quality_improvement()
    );
    println!();
    println!("  Missing-value actions: {}", report.missing_actions().len());
    println!("  Outliers resolved:     {}", report.outliers().len());
    println!("  Duplicate groups:      {}", report.duplicate_groups().len());
    println!("  Retries:               {}", report.retries().len());
    println!("  Failed items:          {}", report.failed_items().len());
    println!(
        "  Validation failures:   {}",
        report.validation_failures().count()
    );
    println!();
    println!("  Cleaned data: {}", data_path.display());
    println!("  Report:       {}", report_path.display());
}

fn profile(
    input: &Path,
    config: Option<&Path>,
    types: &[ColumnSpec],
    options: &LoadOptions,
    json: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let loaded = load_dataset(input, types, options)?;
    let profile = Profiler::profile(&loaded.dataset, &config);

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DATASET PROFILE");
    println!("{}\n", "=".repeat(80));
    println!("  File: {}", input.display());
    println!("  Rows: {}", profile.row_count);
    println!("  Columns: {}", profile.column_count);
    println!("  Completeness: {:.1}%", profile.completeness * 100.0);
    println!();

    println!(
        "{:<20} {:<10} {:<10} {:<10} {:<10} {:<10}",
        "Column", "Declared", "Inferred", "Missing %", "Mismatch", "Outliers"
    );
    println!("{}", "-".repeat(75));
    for col in &profile.columns {
        println!(
            "{:<20} {:<10} {:<10} {:<10.1} {:<10} {:<10}",
            truncate_str(&col.name, 19),
            col.declared_type,
            col.inferred_type,
            col.missing_rate * 100.0,
            col.type_mismatches,
            col.outlier_candidates
        );
    }
    println!();

    let numeric: Vec<_> = profile
        .columns
        .iter()
        .filter_map(|c| c.stats.as_ref().map(|s| (&c.name, s)))
        .collect();
    if !numeric.is_empty() {
        println!("NUMERIC STATISTICS");
        println!("{}", "-".repeat(75));
        for (name, stats) in numeric {
            println!(
                "  {:<18} mean={:.3} median={:.3} q1={:.3} q3={:.3} std={:.3}",
                truncate_str(name, 18),
                stats.mean,
                stats.median,
                stats.q1,
                stats.q3,
                stats.std
            );
        }
        println!();
    }

    println!("DUPLICATES");
    println!("{}", "-".repeat(40));
    if profile.duplicate_candidates.is_empty() {
        println!("  No duplicate candidates found");
    } else {
        println!(
            "  {} groups, {} rows would be removed",
            profile.duplicate_candidates.len(),
            profile.duplicate_row_count()
        );
    }
    Ok(())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
