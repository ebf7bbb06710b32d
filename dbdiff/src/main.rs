use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use futures::StreamExt;

use dbdiff::config::{self, Config, LoggingConfig};
use dbdiff::report::{self, OutputFormat, Summary, EXIT_ERROR};
use dbdiff::utils::logging::init_logging;
use dbdiff::{ComparisonLevel, DbDiffClient};

/// Compare a SOURCE database (the reference) with a TARGET database.
///
/// Comparison levels:
///   0: table name
///   1: level 0 + number of records
///   2: level 1 + column description
///   3: level 2 + primary key
///   4: level 3 + primary key values
///   5: level 4 + record data
#[derive(Parser, Debug)]
#[command(name = "dbdiff", version, verbatim_doc_comment)]
struct Cli {
    /// Reference database url, e.g. postgres://user:pw@host/db
    source: Option<String>,

    /// Compared database url
    target: Option<String>,

    /// Configuration file (TOML or YAML)
    #[arg(short, long)]
    config: Option<String>,

    /// The level of comparison
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
    level: Option<u8>,

    /// Objects compared concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Schema to compare on both sides
    #[arg(long)]
    schema: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_ERROR as u8)
        }
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match (&cli.config, &cli.source, &cli.target) {
        (Some(path), _, _) => config::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        (None, Some(source), Some(target)) => Config::from_urls(source, target),
        _ => bail!("either --config or both SOURCE and TARGET must be given"),
    };

    if let Some(source) = &cli.source {
        config.source.url = source.clone();
    }
    if let Some(target) = &cli.target {
        config.target.url = target.clone();
    }
    if let Some(level) = cli.level {
        config.compare.max_level = ComparisonLevel::try_from(level)?;
    }
    if let Some(workers) = cli.workers {
        config.compare.workers = workers;
    }
    if let Some(schema) = &cli.schema {
        config.source.schema = Some(schema.clone());
        config.target.schema = Some(schema.clone());
    }

    let wanted = config.compare.connections_per_side();
    for side in [&mut config.source, &mut config.target] {
        side.pool_size = Some(side.pool_size.unwrap_or(10).max(wanted));
    }

    if config.logging.is_none() {
        config.logging = Some(LoggingConfig {
            level: if cli.verbose { "debug" } else { "warn" }.to_string(),
            file: None,
            format: "text".to_string(),
            stdout: false,
        });
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = build_config(&cli)?;
    let format = OutputFormat::from(cli.format);
    init_logging(&config.logging)?;

    let client = DbDiffClient::new(config)
        .await
        .context("failed to connect")?;
    tracing::info!(
        level = %client.config().compare.max_level,
        pool_size = ?client.config().source.pool_size,
        "Connected to source and target"
    );

    let mut summary = Summary::start();
    let mut events = client.compare().await.context("failed to list objects")?;
    while let Some(event) = events.next().await {
        summary.record(&event);
        println!("{}", report::render_event(&event, format)?);
    }
    summary.finish();
    tracing::info!(
        elapsed_ms = summary.elapsed_ms,
        exit_code = summary.exit_code(),
        "Comparison finished"
    );
    println!("{}", report::render_summary(&summary, format)?);

    client.close().await;
    Ok(summary.exit_code())
}
