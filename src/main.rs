use anyhow::Context;
use clap::{Parser, Subcommand};
use postfix_exporter::config::{Config, FileSourceConfig, JournalSourceConfig, SourceConfig};
use postfix_exporter::metrics::{self, metrics_documentation, PrometheusSink};
use postfix_exporter::showq::ShowqCollector;
use postfix_exporter::{logging, pipeline, server, source, LogLineEngine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "postfix_exporter")]
#[command(about = "Prometheus exporter for Postfix mail server logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address the scrape endpoint listens on
    #[arg(long)]
    listen_address: Option<String>,

    /// Path under which metrics are exposed
    #[arg(long)]
    metrics_path: Option<String>,

    /// Tail this log file
    #[arg(long, conflicts_with = "journal")]
    log_path: Option<PathBuf>,

    /// Read from the systemd journal instead of a file
    #[arg(long)]
    journal: bool,

    /// Journal unit to follow (repeatable)
    #[arg(long = "journal-unit")]
    journal_units: Vec<String>,

    /// Resume the journal after this cursor
    #[arg(long)]
    journal_cursor: Option<String>,

    /// Path of the Postfix showq socket
    #[arg(long, conflicts_with = "no_showq")]
    showq_path: Option<PathBuf>,

    /// Do not read queue contents from showq
    #[arg(long)]
    no_showq: bool,

    /// Do not count unrecognised lines under unsupported_log_entries
    #[arg(long)]
    no_log_unsupported: bool,

    /// Log level for this crate (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the configured log source and serve metrics (default)
    Run,
    /// Print the metric catalog and exit
    Metrics,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(addr) = &cli.listen_address {
        config.listen_address = addr.clone();
    }
    if let Some(path) = &cli.metrics_path {
        config.metrics_path = path.clone();
    }
    if let Some(path) = &cli.log_path {
        config.source = SourceConfig::File(FileSourceConfig {
            path: path.clone(),
            ..FileSourceConfig::default()
        });
    }
    if cli.journal || !cli.journal_units.is_empty() || cli.journal_cursor.is_some() {
        let mut journal = match &config.source {
            SourceConfig::Journal(journal) => journal.clone(),
            SourceConfig::File(_) => JournalSourceConfig::default(),
        };
        if !cli.journal_units.is_empty() {
            journal.units = cli.journal_units.clone();
        }
        if cli.journal_cursor.is_some() {
            journal.cursor = cli.journal_cursor.clone();
        }
        config.source = SourceConfig::Journal(journal);
    }
    if let Some(path) = &cli.showq_path {
        config.showq.path = path.clone();
    }
    if cli.no_showq {
        config.showq.enabled = false;
    }
    if cli.no_log_unsupported {
        config.log_unsupported_lines = false;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn print_metric_catalog() {
    for doc in metrics_documentation() {
        println!("# {} ({:?})", doc.name, doc.kind);
        println!("  id:     {}", doc.id);
        println!("  help:   {}", doc.help);
        if !doc.labels.is_empty() {
            println!("  labels: {}", doc.labels.join(", "));
        }
        if let Some(buckets) = doc.buckets {
            println!("  buckets: {:?}", buckets);
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let handle = metrics::install().context("failed to install Prometheus recorder")?;

    let addr: SocketAddr = config
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.listen_address))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let showq = ShowqCollector::from_config(&config.showq);
    let router = server::create_router(handle, showq, &config.metrics_path);
    let mut server_task = tokio::spawn(server::start_server(addr, router, shutdown_rx.clone()));

    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });
    }

    let engine = LogLineEngine::from_config(Arc::new(PrometheusSink::new()), &config);
    let consume = async {
        let mut source = source::open(&config.source).await?;
        pipeline::run(source.as_mut(), &engine, shutdown_rx).await
    };

    let consumed = tokio::select! {
        consumed = consume => consumed,
        served = &mut server_task => {
            served.context("HTTP server task panicked")?.context("HTTP server failed")?;
            anyhow::bail!("HTTP server stopped before the log consumer");
        }
    };

    let _ = shutdown_tx.send(true);
    let stats = consumed.context("log consumer failed")?;
    server_task
        .await
        .context("HTTP server task panicked")?
        .context("HTTP server failed")?;

    info!(lines = stats.lines, matched = stats.matched, "postfix_exporter stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Some(Commands::Metrics) = cli.command {
        print_metric_catalog();
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _guard = logging::init_logging(&config.logging);

    info!(
        listen_address = %config.listen_address,
        metrics_path = %config.metrics_path,
        log_unsupported_lines = config.log_unsupported_lines,
        showq = config.showq.enabled,
        "starting postfix_exporter"
    );

    let result = run(config).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
