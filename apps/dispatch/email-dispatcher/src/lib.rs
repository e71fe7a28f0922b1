//! Email Dispatcher Service
//!
//! Drives the dispatch processor on a fixed interval.
//!
//! ## Architecture
//!
//! ```text
//! records.jsonl
//!   ↓ (one Record per line)
//! InMemoryQueue
//!   ↓ (bounded batches)
//! DispatchProcessor
//!   ↓ (one email per batch)
//! SmtpTransport
//!   ↓
//! success / failure
//! ```
//!
//! Settings come from the `SMTP_*`, `MAIL_*`, `ATTRIBUTE_NAME_REGEX`,
//! `CONTENT_TYPE` and `GROUP_SIZE` environment variables.

use clap::Parser;
use core_config::{Environment, FromEnv};
use domain_mail_dispatch::{
    DispatchProcessor, InMemoryQueue, MailTransport, PropertyMap, Record, Relationship,
    SmtpTransport, TriggerOutcome,
};
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "email-dispatcher")]
#[command(about = "Send one email per batch of queued records")]
pub struct Cli {
    /// JSON-lines file of records to enqueue at startup
    #[arg(short, long)]
    pub records: Option<PathBuf>,

    /// Pause between triggers, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Back-off after a failed batch, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    pub yield_ms: u64,

    /// Exit once the queue is drained instead of waiting for more records
    #[arg(long)]
    pub once: bool,

    /// Test the SMTP connection and exit
    #[arg(long)]
    pub check: bool,
}

/// Run the email dispatcher
///
/// 1. Sets up structured logging (JSON for prod, pretty for dev)
/// 2. Loads and validates the delivery settings
/// 3. Enqueues the records file, if any
/// 4. Triggers the processor until shutdown, or until drained with `--once`
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let cli = Cli::parse();
    info!(environment = ?environment, "Starting email dispatcher");

    let settings = PropertyMap::from_env().wrap_err("Failed to load delivery settings")?;
    let queue = Arc::new(InMemoryQueue::new());
    let processor = DispatchProcessor::new(
        queue.clone(),
        Arc::new(SmtpTransport::new()),
        Arc::new(settings),
    )
    .wrap_err("Delivery settings are invalid")?;

    if cli.check {
        let healthy = processor
            .health_check()
            .await
            .wrap_err("SMTP connection check failed")?;
        info!(healthy, "SMTP connection checked");
        return if healthy {
            Ok(())
        } else {
            Err(eyre::eyre!("SMTP server did not accept the connection"))
        };
    }

    if let Some(path) = &cli.records {
        let records = load_records(path).await?;
        info!(path = %path.display(), count = records.len(), "Enqueued records");
        queue.enqueue(records).await;
    }

    // Set up a shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    let totals = dispatch_loop(&processor, &cli, shutdown_rx).await?;

    info!(
        success = totals.success,
        failure = totals.failure,
        pending = queue.pending_count().await,
        "Email dispatcher stopped"
    );
    Ok(())
}

/// Records routed by one run of the dispatch loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoutedTotals {
    pub success: usize,
    pub failure: usize,
}

impl RoutedTotals {
    /// Drain the queue's routed records into the totals.
    async fn collect(&mut self, queue: &InMemoryQueue) {
        self.success += queue.take_routed(Relationship::Success).await.len();
        self.failure += queue.take_routed(Relationship::Failure).await.len();
    }
}

async fn dispatch_loop<T>(
    processor: &DispatchProcessor<InMemoryQueue, T>,
    cli: &Cli,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RoutedTotals>
where
    T: MailTransport + ?Sized,
{
    let interval = Duration::from_millis(cli.interval_ms);
    let yield_duration = Duration::from_millis(cli.yield_ms);
    let mut totals = RoutedTotals::default();

    loop {
        if *shutdown.borrow() {
            info!("Received shutdown signal, stopping dispatcher");
            break;
        }

        let result = processor.trigger().await;
        totals.collect(processor.queue()).await;

        let pause = match result {
            Ok(TriggerOutcome::Idle) if cli.once => {
                info!("Queue drained");
                break;
            }
            Ok(outcome) if outcome.should_yield() => {
                warn!(
                    yield_ms = cli.yield_ms,
                    "Batch failed, yielding before next trigger"
                );
                yield_duration
            }
            Ok(_) => interval,
            Err(e) if cli.once => return Err(e).wrap_err("Dispatch trigger failed"),
            Err(e) => {
                error!(error = %e, "Dispatch trigger failed");
                yield_duration
            }
        };

        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Received shutdown signal, stopping dispatcher");
                    break;
                }
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    Ok(totals)
}

/// Read one JSON [`Record`] per non-blank line.
pub async fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read records from {}", path.display()))?;
    parse_records(&content).wrap_err_with(|| format!("Invalid records in {}", path.display()))
}

fn parse_records(content: &str) -> Result<Vec<Record>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).wrap_err_with(|| format!("line {}", index + 1))
        })
        .collect()
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .wrap_err("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => {
            result.wrap_err("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
