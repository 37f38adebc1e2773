//! Fixed-interval sync scheduler with a bounded worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use postmind_core::{defaults, EmailIntegration, IntegrationRepository, Result};

use crate::syncer::Syncer;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick interval.
    pub interval: Duration,
    /// Integrations fetched per tick; also the job channel capacity.
    pub batch_size: usize,
    /// Worker pool size per tick.
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::SYNC_INTERVAL_SECS),
            batch_size: defaults::SYNC_BATCH_SIZE,
            max_workers: defaults::SYNC_MAX_WORKERS,
        }
    }
}

impl SchedulerConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SYNC_INTERVAL` | `30` | Tick interval in seconds |
    /// | `BATCH_SIZE` | `10` | Integrations per tick |
    /// | `MAX_WORKERS` | `5` | Concurrent sync workers |
    pub fn from_env() -> Self {
        let interval = std::env::var("SYNC_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SYNC_INTERVAL_SECS);

        let batch_size = std::env::var("BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::SYNC_BATCH_SIZE)
            .max(1);

        let max_workers = std::env::var("MAX_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::SYNC_MAX_WORKERS)
            .max(1);

        Self {
            interval: Duration::from_secs(interval),
            batch_size,
            max_workers,
        }
    }
}

/// Handle for stopping a running scheduler.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to exit at the next tick boundary and wait for it.
    /// In-flight syncs are allowed to finish.
    pub async fn stop(self) {
        info!(subsystem = "mailbox", component = "scheduler", "Stopping scheduler");
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
        info!(subsystem = "mailbox", component = "scheduler", "Scheduler stopped");
    }
}

/// Process-wide sync scheduler.
///
/// Each tick fetches the oldest-synced integrations, distributes them
/// onto a bounded channel, and drains it with a fixed pool of workers.
/// The tick completes only when every claimed sync has finished.
pub struct SyncScheduler {
    integrations: Arc<dyn IntegrationRepository>,
    syncer: Arc<Syncer>,
    config: SchedulerConfig,
}

impl SyncScheduler {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        syncer: Arc<Syncer>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            integrations,
            syncer,
            config,
        }
    }

    /// Start the tick loop. The first cycle runs immediately.
    pub fn start(self) -> SchedulerHandle {
        info!(
            subsystem = "mailbox",
            component = "scheduler",
            max_workers = self.config.max_workers,
            batch_size = self.config.batch_size,
            interval_secs = self.config.interval.as_secs(),
            "Starting scheduler"
        );

        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    _ = stop_rx.changed() => {
                        return;
                    }
                }
            }
        });

        SchedulerHandle { stop_tx, handle }
    }

    /// One sync cycle: claim, fan out, join.
    pub async fn run_cycle(&self) {
        let integrations = match self
            .integrations
            .due_for_sync(self.config.batch_size as i64)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    subsystem = "mailbox",
                    component = "scheduler",
                    error = %e,
                    "Failed to get integrations"
                );
                return;
            }
        };

        if integrations.is_empty() {
            return;
        }

        info!(
            subsystem = "mailbox",
            component = "scheduler",
            result_count = integrations.len(),
            "Sync cycle started"
        );

        let total = integrations.len();
        let (job_tx, job_rx) = mpsc::channel::<EmailIntegration>(self.config.batch_size.max(total));
        let (result_tx, mut result_rx) = mpsc::channel::<Result<()>>(self.config.batch_size.max(total));
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(self.config.max_workers);
        for _ in 0..self.config.max_workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let syncer = self.syncer.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    // Lock only for the claim so workers drain in parallel.
                    let job = { job_rx.lock().await.recv().await };
                    match job {
                        Some(integration) => {
                            let result = syncer.sync_integration(&integration).await;
                            if result_tx.send(result).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }));
        }
        drop(result_tx);

        for integration in integrations {
            if job_tx.send(integration).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut success = 0usize;
        while let Some(result) = result_rx.recv().await {
            match result {
                Ok(()) => success += 1,
                Err(e) => error!(
                    subsystem = "mailbox",
                    component = "scheduler",
                    error = %e,
                    "Sync failed"
                ),
            }
        }

        for worker in workers {
            let _ = worker.await;
        }

        info!(
            subsystem = "mailbox",
            component = "scheduler",
            success,
            total,
            "Sync cycle completed"
        );
    }
}
