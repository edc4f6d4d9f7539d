use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pfam_subset::app::{App, SubsetRequest};
use pfam_subset::config::{ConfigLoader, ConfigOverrides};
use pfam_subset::domain::FetcherKind;
use pfam_subset::error::PfamError;
use pfam_subset::fetch::AnyFetcher;
use pfam_subset::output::{JsonOutput, LogSink, OutputMode, TextOutput};

#[derive(Parser)]
#[command(name = "pfam-subset")]
#[command(about = "Cut a Pfam-A HMM subset for the families referenced in an annotation table")]
#[command(version, author)]
struct Cli {
    #[arg(value_name = "TABLE_TSV")]
    table: PathBuf,

    /// Writes <dir>/pfam_hmms/*.hmm and <prefix>.Pfam-A.subset.hmm
    #[arg(value_name = "OUT_PREFIX")]
    out_prefix: Utf8PathBuf,

    #[arg(value_name = "PFAM_A_HMM")]
    database: PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long = "column", value_name = "HEADER")]
    columns: Vec<String>,

    #[arg(long)]
    fetcher: Option<FetcherKind>,

    #[arg(long)]
    hmmpress: bool,

    #[arg(long)]
    json: bool,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PfamError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PfamError) -> u8 {
    match error {
        PfamError::InvalidPrefix(_) => 2,
        PfamError::InputMissing { .. } => 3,
        PfamError::ColumnNotFound { .. } => 4,
        PfamError::NoIdentifiersFound { .. } => 5,
        PfamError::EmptySubset { .. } => 6,
        PfamError::MissingTool(_) | PfamError::ConfigRead(_) | PfamError::ConfigParse(_) => 7,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?.apply(ConfigOverrides {
        columns: cli.columns,
        fetcher: cli.fetcher,
        hmmpress: cli.hmmpress,
    });
    let fetcher = AnyFetcher::select(config.fetcher)?;
    let app = App::new(fetcher, config);

    let request = SubsetRequest {
        table: cli.table,
        out_prefix: cli.out_prefix,
        database: cli.database,
    };

    let result = app.run(&request, &LogSink)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_subset(&result).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_subset(&result).into_diagnostic()?,
    }
    Ok(())
}
