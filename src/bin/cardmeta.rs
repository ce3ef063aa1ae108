use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use cardmeta::categorize::{self, CategorizeConfig, Classifier};
use cardmeta::config::{self, CategorizeJob, ConfigLoader, FilterJob, MergeJob};
use cardmeta::error::PipelineError;
use cardmeta::filter::{self, FilterConfig};
use cardmeta::merge::{self, MergeConfig};
use cardmeta::output::{CategorizeSummary, FilterSummary, JsonOutput, MergeSummary, OutputMode};
use cardmeta::progress::{LogSink, ProgressSink};
use cardmeta::report;
use cardmeta::sidetable::SideTable;

#[derive(Parser)]
#[command(name = "cardmeta")]
#[command(about = "Chunked merge, deduplication and biome categorization for AMR metagenomics tables")]
#[command(version, author)]
struct Cli {
    /// Print the final run summary as JSON and suppress progress lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Left-join a large table against an in-memory side table")]
    Merge(MergeArgs),
    #[command(about = "Keep or drop rows by a predicate on one column")]
    Filter(FilterArgs),
    #[command(about = "Derive organism type and metagenome biome categories")]
    Categorize(CategorizeArgs),
    #[command(about = "Execute the jobs described in a JSON config file")]
    Run(RunArgs),
}

#[derive(Args, Clone)]
struct MergeArgs {
    #[arg(long)]
    source: Utf8PathBuf,

    #[arg(long)]
    side_table: Utf8PathBuf,

    #[arg(long)]
    output: Utf8PathBuf,

    #[arg(long, default_value = config::DEFAULT_KEY_COLUMN)]
    key: String,

    /// Where to write the missing-key frequency table.
    #[arg(long)]
    diagnostics: Option<Utf8PathBuf>,

    /// Side-table columns to carry into the output (default: all).
    #[arg(long, value_delimiter = ',')]
    side_columns: Option<Vec<String>>,

    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Keep only the first occurrence of each key.
    #[arg(long)]
    unique: bool,

    /// Skip the pre-pass row count used for percentage progress.
    #[arg(long)]
    no_count: bool,
}

#[derive(Args, Clone)]
#[command(group = clap::ArgGroup::new("predicate").required(true))]
struct FilterArgs {
    #[arg(long)]
    source: Utf8PathBuf,

    #[arg(long)]
    output: Utf8PathBuf,

    /// Column the predicate is evaluated against.
    #[arg(long)]
    column: String,

    /// Keep rows whose value contains this substring (case-sensitive).
    #[arg(long, group = "predicate")]
    contains: Option<String>,

    /// Keep rows whose value equals one of these strings.
    #[arg(long, value_delimiter = ',', group = "predicate")]
    one_of: Option<Vec<String>>,

    /// Keep rows whose value is non-empty after trimming.
    #[arg(long, group = "predicate")]
    non_empty: bool,

    /// Drop matching rows instead of keeping them.
    #[arg(long)]
    invert: bool,

    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[derive(Args, Clone)]
struct CategorizeArgs {
    #[arg(long)]
    source: Utf8PathBuf,

    #[arg(long)]
    output: Utf8PathBuf,

    #[arg(long, default_value = config::DEFAULT_KEY_COLUMN)]
    key: String,

    #[arg(long, default_value = config::DEFAULT_ORGANISM_COLUMN)]
    organism_column: String,

    #[arg(long, default_value = config::DEFAULT_LIBRARY_SOURCE_COLUMN)]
    library_source_column: String,

    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long)]
    unique: bool,

    /// Write only key, organism_type and metagenome_category columns.
    #[arg(long)]
    minimal: bool,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(pipeline) = report.downcast_ref::<PipelineError>() {
            return ExitCode::from(map_exit_code(pipeline));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PipelineError) -> u8 {
    match error {
        PipelineError::MissingColumn { .. }
        | PipelineError::OpenInput { .. }
        | PipelineError::ReadInput { .. }
        | PipelineError::MissingConfig
        | PipelineError::ConfigRead(_)
        | PipelineError::ConfigParse(_)
        | PipelineError::InvalidChunkSize
        | PipelineError::InvalidPredicate(_) => 2,
        PipelineError::WriteOutput { .. } | PipelineError::Filesystem(_) => 3,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Merge(args) => run_merge(args, output_mode),
        Commands::Filter(args) => run_filter(args, output_mode),
        Commands::Categorize(args) => run_categorize(args, output_mode),
        Commands::Run(args) => run_config(args, output_mode),
    }
}

fn progress_sink(output_mode: OutputMode) -> Box<dyn ProgressSink> {
    match output_mode {
        OutputMode::Text => Box::new(LogSink),
        OutputMode::Json => Box::new(JsonOutput),
    }
}

fn run_merge(args: MergeArgs, output_mode: OutputMode) -> miette::Result<()> {
    let job = MergeJob {
        source: args.source,
        side_table: args.side_table,
        output: args.output,
        key_column: args.key,
        diagnostics: args.diagnostics,
        side_columns: args.side_columns,
        chunk_size: args.chunk_size,
        unique: args.unique,
        count_rows: !args.no_count,
    };
    execute_merge(&job, output_mode)
}

fn run_filter(args: FilterArgs, output_mode: OutputMode) -> miette::Result<()> {
    let job = FilterJob {
        source: args.source,
        output: args.output,
        column: args.column,
        contains: args.contains,
        one_of: args.one_of,
        non_empty: args.non_empty,
        invert: args.invert,
        chunk_size: args.chunk_size,
    };
    execute_filter(&job, output_mode)
}

fn run_categorize(args: CategorizeArgs, output_mode: OutputMode) -> miette::Result<()> {
    let job = CategorizeJob {
        source: args.source,
        output: args.output,
        key_column: args.key,
        organism_column: args.organism_column,
        library_source_column: args.library_source_column,
        chunk_size: args.chunk_size,
        unique: args.unique,
        minimal: args.minimal,
    };
    execute_categorize(&job, output_mode)
}

fn run_config(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    if config.merge.is_none() && config.filter.is_none() && config.categorize.is_none() {
        return Err(miette::Report::msg(
            "config file declares no merge, filter or categorize job",
        ));
    }
    if let Some(job) = &config.merge {
        execute_merge(job, output_mode)?;
    }
    if let Some(job) = &config.filter {
        execute_filter(job, output_mode)?;
    }
    if let Some(job) = &config.categorize {
        execute_categorize(job, output_mode)?;
    }
    Ok(())
}

fn execute_merge(job: &MergeJob, output_mode: OutputMode) -> miette::Result<()> {
    let sink = progress_sink(output_mode);

    let side = match &job.side_columns {
        Some(columns) => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            SideTable::load_columns(&job.side_table, &job.key_column, &columns, sink.as_ref())
        }
        None => SideTable::load(&job.side_table, &job.key_column, sink.as_ref()),
    }
    .into_diagnostic()?;

    let config: MergeConfig = job.to_merge_config();
    let report = merge::merge(&config, &side, sink.as_ref()).into_diagnostic()?;
    if let Some(diagnostics) = &job.diagnostics {
        report::write_missing_keys(diagnostics, &report, &side).into_diagnostic()?;
    }

    let summary = MergeSummary::from_report(&report, &config.output, job.diagnostics.as_deref());
    match output_mode {
        OutputMode::Json => JsonOutput::print_merge(&summary).into_diagnostic()?,
        OutputMode::Text => tracing::info!(
            rows_read = summary.rows_read,
            rows_written = summary.rows_written,
            missing_rows = summary.missing_rows,
            distinct_missing_keys = summary.distinct_missing_keys,
            "merge finished, output {}",
            summary.output
        ),
    }
    Ok(())
}

fn execute_filter(job: &FilterJob, output_mode: OutputMode) -> miette::Result<()> {
    let sink = progress_sink(output_mode);
    let config: FilterConfig = job.to_filter_config().into_diagnostic()?;
    let report = filter::filter(&config, sink.as_ref()).into_diagnostic()?;

    let summary = FilterSummary::from_report(&report, &config.output);
    match output_mode {
        OutputMode::Json => JsonOutput::print_filter(&summary).into_diagnostic()?,
        OutputMode::Text => tracing::info!(
            rows_read = summary.rows_read,
            rows_written = summary.rows_written,
            rows_dropped = summary.rows_dropped,
            "filter finished, output {}",
            summary.output
        ),
    }
    Ok(())
}

fn execute_categorize(job: &CategorizeJob, output_mode: OutputMode) -> miette::Result<()> {
    let sink = progress_sink(output_mode);
    let classifier = Classifier::builtin();
    let config: CategorizeConfig = job.to_categorize_config();
    let report = categorize::categorize(&config, &classifier, sink.as_ref()).into_diagnostic()?;

    let summary = CategorizeSummary::from_report(&report, &config.output);
    match output_mode {
        OutputMode::Json => JsonOutput::print_categorize(&summary).into_diagnostic()?,
        OutputMode::Text => tracing::info!(
            rows_read = summary.rows_read,
            rows_written = summary.rows_written,
            isolate_rows = summary.isolate_rows,
            "categorize finished, output {}",
            summary.output
        ),
    }
    Ok(())
}
