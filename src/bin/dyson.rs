use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dyson::app::{self, App, FetchOptions, FetchResult};
use dyson::config::{ConfigLoader, ConfigOverrides};
use dyson::engine::EngineHttpClient;
use dyson::error::DysonError;
use dyson::features::load_collections;
use dyson::fetch::HttpArchiveFetcher;
use dyson::output::{JsonOutput, LogSink, OutputMode};
use dyson::store::DataStore;

#[derive(Parser)]
#[command(name = "dyson")]
#[command(about = "Satellite image chips for geographic feature collections")]
#[command(version)]
struct Cli {
    /// Print command results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Request, download and composite image chips, then rebuild the manifest")]
    Fetch(FetchArgs),
    #[command(about = "Rebuild dataset.json from the per-record metadata on disk")]
    Aggregate(DataDirArgs),
    #[command(about = "Render index.html from dataset.json")]
    Site(DataDirArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    data_dir: Option<String>,

    #[arg(long)]
    features_dir: Option<String>,

    #[arg(long)]
    engine_url: Option<String>,

    /// Cloud-masked image collection to clip from
    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// List download urls without downloading
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct DataDirArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DysonError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DysonError) -> u8 {
    match error {
        DysonError::ConfigRead(_)
        | DysonError::ConfigParse(_)
        | DysonError::InvalidConfig(_)
        | DysonError::FeatureRead { .. }
        | DysonError::InvalidGeometry(_) => 2,
        DysonError::EngineHttp(_)
        | DysonError::EngineStatus { .. }
        | DysonError::EngineResponse(_)
        | DysonError::DownloadHttp(_)
        | DysonError::DownloadStatus { .. }
        | DysonError::MissingDocumentId(_) => 3,
        DysonError::CorruptArchive(_)
        | DysonError::DocumentIdMismatch { .. }
        | DysonError::MissingBand { .. }
        | DysonError::BandMismatch(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, output_mode),
        Commands::Aggregate(args) => {
            let store = data_store(&args)?;
            let result = match output_mode {
                OutputMode::Json => app::aggregate(&store, &JsonOutput)?,
                OutputMode::Human => app::aggregate(&store, &LogSink)?,
            };
            match output_mode {
                OutputMode::Json => JsonOutput::print_aggregate(&result).into_diagnostic()?,
                OutputMode::Human => {
                    println!("{} records -> {}", result.entries, result.manifest_path)
                }
            }
            Ok(())
        }
        Commands::Site(args) => {
            let store = data_store(&args)?;
            let result = match output_mode {
                OutputMode::Json => app::build_site(&store, &JsonOutput)?,
                OutputMode::Human => app::build_site(&store, &LogSink)?,
            };
            match output_mode {
                OutputMode::Json => JsonOutput::print_site(&result).into_diagnostic()?,
                OutputMode::Human => println!(
                    "{} records in {} categories -> {}",
                    result.records, result.categories, result.path
                ),
            }
            Ok(())
        }
    }
}

fn data_store(args: &DataDirArgs) -> miette::Result<DataStore> {
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            data_dir: args.data_dir.clone(),
            ..ConfigOverrides::default()
        },
    )?;
    Ok(DataStore::new(resolved.data_dir))
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            data_dir: args.data_dir,
            features_dir: args.features_dir,
            engine_url: args.engine_url,
            image_source: args.source,
            batch_size: args.batch_size,
        },
    )?;
    let region = resolved.region_options()?;
    let engine = EngineHttpClient::new(resolved.engine_url()?)?;
    let fetcher = HttpArchiveFetcher::new()?;
    let collections = load_collections(resolved.features_dir.as_std_path())?;
    let store = DataStore::new(resolved.data_dir.clone());
    let app = App::new(store, engine, fetcher);
    let options = FetchOptions {
        dry_run: args.dry_run,
    };

    let result = match output_mode {
        OutputMode::Json => app.fetch(&collections, region, options, &JsonOutput)?,
        OutputMode::Human => app.fetch(&collections, region, options, &LogSink)?,
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_fetch(&result).into_diagnostic()?,
        OutputMode::Human => print_fetch_summary(&result),
    }
    Ok(())
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}dyson summary{reset}");
    println!(
        "{green}materialized: {}{reset}",
        result.count("materialized") + result.count("recorded")
    );
    println!("{yellow}skipped: {}{reset}", result.count("skipped"));
    if result.count("planned") > 0 {
        println!("{cyan}planned: {}{reset}", result.count("planned"));
        for item in result.items.iter().filter(|item| item.action == "planned") {
            println!(
                "  {} {} {}",
                item.category,
                item.id,
                item.url.as_deref().unwrap_or_default()
            );
        }
    }
    if let Some(entries) = result.manifest_entries {
        println!("{green}manifest entries: {entries}{reset}");
    }
}
