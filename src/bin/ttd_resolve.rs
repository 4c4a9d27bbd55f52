use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ttd_uniprot_resolver::client::UniprotIdMappingClient;
use ttd_uniprot_resolver::config::{ConfigLoader, ResolverConfig, TARGET_DOWNLOAD_FILE};
use ttd_uniprot_resolver::domain::AttributionPolicy;
use ttd_uniprot_resolver::error::ResolveError;
use ttd_uniprot_resolver::extract::AccessionExtractor;
use ttd_uniprot_resolver::output::{
    JsonOutput, OutputMode, TracingSink, read_table_tsv, write_table_tsv,
};
use ttd_uniprot_resolver::pipeline::{ProgressSink, ResolutionReport, Resolver};
use ttd_uniprot_resolver::targets::target_infos;

#[derive(Parser)]
#[command(name = "ttd-resolve")]
#[command(about = "Resolve TTD target accessions to UniProtKB entries")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve every target in a TTD download directory")]
    Resolve(ResolveArgs),
    #[command(about = "Print target records with their UniProtKB ids")]
    Targets(TargetsArgs),
}

#[derive(Args, Clone)]
struct SourceArgs {
    #[arg(help = "Directory holding P1-01-TTD_target_download.txt")]
    source_dir: PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    attribution: Option<AttributionPolicy>,

    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct ResolveArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, help = "Write the table as entity_id<TAB>canonical_id rows")]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct TargetsArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, help = "Reuse a table written by `resolve --output` instead of calling UniProt")]
    table: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ResolveError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ResolveError) -> u8 {
    match error {
        ResolveError::SourceNotFound(_) | ResolveError::ConfigRead(_) => 2,
        ResolveError::Connection(_)
        | ResolveError::Http(_)
        | ResolveError::Status { .. }
        | ResolveError::Decode(_)
        | ResolveError::BatchTimeout(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    match cli.command {
        Commands::Resolve(args) => runtime.block_on(run_resolve(args, output_mode)),
        Commands::Targets(args) => runtime.block_on(run_targets(args, output_mode)),
    }
}

fn load_config(args: &SourceArgs) -> Result<ResolverConfig, ResolveError> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(policy) = args.attribution {
        config.attribution = policy;
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    config.validate()
}

fn sink_for(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &TracingSink,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

async fn resolve(args: &SourceArgs, output_mode: OutputMode) -> miette::Result<ResolutionReport> {
    let config = load_config(args)?;
    let client = UniprotIdMappingClient::new(&config)?;
    let resolver = Resolver::new(client, config);
    let report = resolver
        .resolve_dir(&args.source_dir, sink_for(output_mode))
        .await?;
    Ok(report)
}

async fn run_resolve(args: ResolveArgs, output_mode: OutputMode) -> miette::Result<()> {
    let report = resolve(&args.source, output_mode).await?;
    if let Some(path) = &args.output {
        write_table_tsv(&report.table, path)?;
    }
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Interactive => print_summary(&report, args.output.as_ref()),
    }
    Ok(())
}

async fn run_targets(args: TargetsArgs, output_mode: OutputMode) -> miette::Result<()> {
    let config = load_config(&args.source)?;
    let extractor = AccessionExtractor::open(
        args.source.source_dir.join(TARGET_DOWNLOAD_FILE),
        config.header_rows,
    )?;
    let table = match &args.table {
        Some(path) => read_table_tsv(path)?,
        None => resolve(&args.source, output_mode).await?.table,
    };
    let targets = target_infos(&extractor, &table)?;
    JsonOutput::print_targets(&targets).into_diagnostic()?;
    Ok(())
}

fn print_summary(report: &ResolutionReport, output: Option<&Utf8PathBuf>) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}TTD resolution summary ({}){reset}", report.source);
    println!(
        "{green}Resolved targets: {} of {}{reset}",
        report.table.len(),
        report.entities
    );
    println!(
        "{cyan}Accessions: {} unique, {} submitted, {} batches{reset}",
        report.accessions, report.submitted, report.fetch.batches
    );
    println!(
        "{yellow}Unresolved accessions: {}{reset}",
        report.unresolved.len()
    );
    for item in &report.unresolved {
        println!("{yellow}   {} ({}){reset}", item.accession, item.reason);
    }
    if let Some(path) = output {
        println!("{green}Table written to {path}{reset}");
    }
}
