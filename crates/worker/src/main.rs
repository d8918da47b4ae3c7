use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budgetwise_core::config::{AnalysisConfig, Settings};

mod batch;

use batch::Mode;

#[derive(Debug, Parser)]
#[command(name = "budgetwise_worker")]
struct Args {
    /// Request file; `-` reads stdin.
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Analysis)]
    mode: Mode,

    /// Response file. Defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Treat the input as JSON lines, one request per line.
    #[arg(long)]
    batch: bool,

    /// Validate requests without running any analysis.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let config = AnalysisConfig::from_env();

    if let Err(err) = run(&args, &config) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "worker run failed");
        return Err(err);
    }
    Ok(())
}

fn run(args: &Args, config: &AnalysisConfig) -> anyhow::Result<()> {
    let reader = open_input(&args.input)?;
    let mut writer = open_output(args.output.as_deref())?;

    if args.batch {
        let summary = batch::run_lines(args.mode, reader, writer, config, args.dry_run)?;
        tracing::info!(
            mode = ?args.mode,
            processed = summary.processed,
            failed = summary.failed,
            dry_run = args.dry_run,
            "batch run finished"
        );
        return Ok(());
    }

    let mut raw = String::new();
    let mut reader = reader;
    reader
        .read_to_string(&mut raw)
        .with_context(|| format!("read {}", args.input.display()))?;

    let Some(response) = batch::run_one(args.mode, &raw, config, args.dry_run)? else {
        tracing::info!(mode = ?args.mode, dry_run = true, "request validated");
        return Ok(());
    };

    serde_json::to_writer_pretty(&mut writer, &response)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::info!(mode = ?args.mode, "request processed");
    Ok(())
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
