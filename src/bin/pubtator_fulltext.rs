use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pubtator_fulltext::app::{App, FetchOptions};
use pubtator_fulltext::config::{ConfigLoader, DEFAULT_OUTPUT, ResolvedConfig};
use pubtator_fulltext::error::FulltextError;
use pubtator_fulltext::fetcher::BatchFetcher;
use pubtator_fulltext::merger::CollectionMerger;
use pubtator_fulltext::output::{
    JsonOutput, LogSink, OutputMode, print_fetch_summary, print_merge_summary,
};
use pubtator_fulltext::pubtator::PubtatorHttpClient;
use pubtator_fulltext::rate_limit::RateLimiter;

#[derive(Parser)]
#[command(name = "pubtator-fulltext")]
#[command(
    about = "Download PubTator Central full text in resumable batches and merge it into one BioC collection"
)]
#[command(version, author)]
struct Cli {
    /// Print a JSON summary on stdout instead of the plain report.
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file (defaults to ./pubtator-fulltext.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download missing batches into the temp directory")]
    Fetch(FetchArgs),
    #[command(about = "Merge the batch files of a temp directory into one collection")]
    Merge(MergeArgs),
    #[command(about = "Fetch, then merge")]
    Run(RunArgs),
}

#[derive(Args, Clone)]
struct FetchArgs {
    /// Tab-separated file with a column of PMC identifiers.
    #[arg(long)]
    input: Utf8PathBuf,

    /// Number of identifiers requested at once.
    #[arg(long)]
    document_batch: Option<usize>,

    /// Directory holding batch files and the progress log.
    #[arg(long)]
    temp_dir: Utf8PathBuf,

    /// Progress log file name inside the temp directory.
    #[arg(long)]
    log_file: Option<String>,

    /// Header of the identifier column.
    #[arg(long)]
    id_column: Option<String>,
}

#[derive(Args, Clone)]
struct MergeArgs {
    #[arg(long)]
    temp_dir: Utf8PathBuf,

    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: Utf8PathBuf,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    fetch: FetchArgs,

    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<FulltextError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FulltextError) -> u8 {
    match error {
        FulltextError::InvalidBatchSize(_)
        | FulltextError::InvalidRateLimit(_)
        | FulltextError::InputRead { .. }
        | FulltextError::MissingColumn { .. }
        | FulltextError::ConfigRead(_)
        | FulltextError::ConfigParse(_) => 2,
        FulltextError::PubtatorHttp(_) | FulltextError::PubtatorStatus { .. } => 3,
        _ => 1,
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
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => {
            let app = build_app(&config, args.id_column.as_deref())?;
            let options = fetch_options(&config, args)?;
            let report = app.fetch(&options, &LogSink)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_fetch(&report).into_diagnostic()?,
                OutputMode::Interactive => print_fetch_summary(&report),
            }
            Ok(())
        }
        Commands::Merge(args) => {
            let report =
                CollectionMerger::today().merge(&args.temp_dir, &args.output, &LogSink)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_merge(&report).into_diagnostic()?,
                OutputMode::Interactive => print_merge_summary(&report),
            }
            Ok(())
        }
        Commands::Run(args) => {
            let app = build_app(&config, args.fetch.id_column.as_deref())?;
            let options = fetch_options(&config, args.fetch)?;
            let result = app.run(&options, args.output, &LogSink)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_run(&result).into_diagnostic()?,
                OutputMode::Interactive => {
                    print_fetch_summary(&result.fetch);
                    print_merge_summary(&result.merge);
                }
            }
            Ok(())
        }
    }
}

fn build_app(
    config: &ResolvedConfig,
    id_column: Option<&str>,
) -> Result<App<PubtatorHttpClient>, FulltextError> {
    let client = PubtatorHttpClient::new(&config.export_url, config.timeout)?;
    let limiter = RateLimiter::new(config.rate_calls, config.rate_period)?;
    let fetcher = BatchFetcher::new(client, limiter)
        .with_id_column(id_column.unwrap_or(config.id_column.as_str()));
    Ok(App::new(fetcher, CollectionMerger::today()))
}

fn fetch_options(config: &ResolvedConfig, args: FetchArgs) -> Result<FetchOptions, FulltextError> {
    let batch_size = args.document_batch.unwrap_or(config.batch_size);
    if batch_size == 0 {
        return Err(FulltextError::InvalidBatchSize(batch_size));
    }
    Ok(FetchOptions {
        ids_source: args.input,
        batch_size,
        temp_dir: args.temp_dir,
        log_file: args.log_file.unwrap_or_else(|| config.log_file.clone()),
    })
}
