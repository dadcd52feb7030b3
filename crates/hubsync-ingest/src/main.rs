//! Hubsync Ingest - registry harvesting tool

use anyhow::{Context, Result};
use clap::{Args, Parser};
use hubsync_common::logging::{init_logging, LogConfig, LogLevel};
use hubsync_ingest::config::{
    parse_registry_url, DatabaseConfig, IngestConfig, DEFAULT_DB_HOST, DEFAULT_DB_NAME,
    DEFAULT_DB_PORT, DEFAULT_DB_USER, DEFAULT_REGISTRY_URL,
};
use hubsync_ingest::driver::{FailurePolicy, Ingestor, RunReport};
use hubsync_ingest::fetcher::{
    PageFetcher, ReqwestTransport, RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS,
};
use hubsync_ingest::sink::{MemorySink, PgSink};
use hubsync_ingest::sources::{default_sources, select_sources, Source, Tier};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hubsync-ingest")]
#[command(author, version, about = "Harvest registry repositories into PostgreSQL")]
struct Cli {
    /// Registry endpoint that lists repositories per namespace
    #[arg(long, env = "HUBSYNC_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    registry_url: String,

    /// Requests per page before giving up on HTTP 429
    #[arg(long, env = "HUBSYNC_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Seconds to wait after an HTTP 429
    #[arg(long, env = "HUBSYNC_BACKOFF_SECS", default_value_t = DEFAULT_BACKOFF.as_secs())]
    backoff_secs: u64,

    /// Per-request timeout in seconds (unbounded when unset)
    #[arg(long, env = "HUBSYNC_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Only ingest these namespaces (repeatable)
    #[arg(short, long = "namespace")]
    namespaces: Vec<String>,

    /// Only ingest namespaces of these tiers (repeatable)
    #[arg(long = "tier", value_enum)]
    tiers: Vec<Tier>,

    /// Keep going when a namespace fails to fetch; the run still exits non-zero
    #[arg(long)]
    continue_on_error: bool,

    /// Fetch and normalize without touching the database
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    database: DatabaseArgs,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct DatabaseArgs {
    /// Full connection URL; overrides the individual --db-* settings
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "DB_HOST", default_value = DEFAULT_DB_HOST)]
    db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    db_port: u16,

    #[arg(long, env = "DB_USER", default_value = DEFAULT_DB_USER)]
    db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    db_password: String,

    #[arg(long, env = "DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,
}

impl Cli {
    fn ingest_config(&self) -> hubsync_common::Result<IngestConfig> {
        let config = IngestConfig {
            retry: RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs)),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            failure_policy: if self.continue_on_error {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            dry_run: self.dry_run,
            database: DatabaseConfig {
                url: self.database.database_url.clone(),
                host: self.database.db_host.clone(),
                port: self.database.db_port,
                user: self.database.db_user.clone(),
                password: self.database.db_password.clone(),
                name: self.database.db_name.clone(),
            },
            ..IngestConfig::new(parse_registry_url(&self.registry_url)?)
        };

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("hubsync-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = cli.ingest_config()?;
    let sources = select_sources(default_sources(), &cli.namespaces, &cli.tiers);
    if sources.is_empty() {
        anyhow::bail!("No namespaces match the given --namespace/--tier filters");
    }

    info!(
        sources = sources.len(),
        registry = %config.registry_url,
        dry_run = config.dry_run,
        "Starting ingestion"
    );

    match run(&config, &sources).await {
        Ok(report) if report.is_success() => {
            info!("Ingestion complete");
            Ok(ExitCode::SUCCESS)
        },
        Ok(report) => {
            for failure in &report.failed {
                error!(namespace = %failure.namespace(), "Source failed: {}", failure);
            }
            Ok(ExitCode::FAILURE)
        },
        Err(e) => {
            error!("Ingestion aborted: {:#}", e);
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn run(config: &IngestConfig, sources: &[Source]) -> Result<RunReport> {
    let transport =
        ReqwestTransport::new(config.request_timeout).context("Failed to build HTTP client")?;
    let fetcher = PageFetcher::new(transport, config.retry);

    if config.dry_run {
        let mut ingestor = Ingestor::new(fetcher, MemorySink::new(), config.registry_url.clone());
        let report = ingestor.run(sources, config.failure_policy).await?;
        info!(records = ingestor.sink().len(), "Dry run finished, nothing was written");
        return Ok(report);
    }

    let database_url = config.database.connection_url()?;
    let sink = PgSink::connect(&database_url)
        .await
        .context("Unable to connect to database")?;
    sink.migrate().await.context("Failed to apply migrations")?;

    let mut ingestor = Ingestor::new(fetcher, sink, config.registry_url.clone());
    let outcome = ingestor.run(sources, config.failure_policy).await;

    ingestor.into_sink().finish().await;

    Ok(outcome?)
}
