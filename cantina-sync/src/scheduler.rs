//! Periodic execution of the pipeline and the asset garbage collector
//!
//! Two independently owned tokio tasks share the store pool. Each ticks
//! immediately at startup, then every period; a run is awaited before the next
//! tick, so runs of one schedule never overlap. The two schedules do not
//! exclude each other.

use cantina_common::config::ScheduleConfig;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{collect_garbage, Pipeline};

/// Latest outcome of each schedule, reported by `/health`
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub last_pipeline_run: Option<DateTime<Utc>>,
    pub last_collection_run: Option<DateTime<Utc>>,
    /// Failure of the latest pipeline run, cleared by a successful run
    pub pipeline_error: Option<String>,
    /// Failure of the latest collection pass, cleared by a successful pass
    pub collection_error: Option<String>,
}

impl SyncStatus {
    pub fn record_pipeline_run(&mut self, error: Option<String>) {
        self.last_pipeline_run = Some(Utc::now());
        self.pipeline_error = error;
    }

    pub fn record_collection_run(&mut self, error: Option<String>) {
        self.last_collection_run = Some(Utc::now());
        self.collection_error = error;
    }
}

pub type SharedSyncStatus = Arc<RwLock<SyncStatus>>;

/// Owner of the two schedules
pub struct Scheduler {
    pipeline: Pipeline,
    fetch_interval: Duration,
    cleanup_interval: Duration,
    status: SharedSyncStatus,
    cancel: CancellationToken,
}

/// Join handles of the spawned schedule tasks
pub struct SchedulerHandles {
    pub pipeline: JoinHandle<()>,
    pub collector: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Wait for both tasks to finish
    pub async fn join(self) {
        for (name, handle) in [("pipeline", self.pipeline), ("collector", self.collector)] {
            if let Err(e) = handle.await {
                tracing::error!(schedule = name, error = %e, "Schedule task panicked");
            }
        }
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.max(1) * 60)
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, schedule: &ScheduleConfig, status: SharedSyncStatus) -> Self {
        Self {
            pipeline,
            fetch_interval: minutes(schedule.fetch_interval_minutes),
            cleanup_interval: minutes(schedule.cleanup_interval_minutes),
            status,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the periods (sub-minute periods are only useful in tests)
    pub fn with_intervals(mut self, fetch_interval: Duration, cleanup_interval: Duration) -> Self {
        self.fetch_interval = fetch_interval;
        self.cleanup_interval = cleanup_interval;
        self
    }

    /// Token that stops both schedules between runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn both schedule tasks
    pub fn spawn(self) -> SchedulerHandles {
        tracing::info!(
            fetch_interval_secs = self.fetch_interval.as_secs(),
            cleanup_interval_secs = self.cleanup_interval.as_secs(),
            "Starting schedules"
        );

        let pipeline = self.pipeline.clone();
        let status = self.status.clone();
        let pipeline_task = tokio::spawn(run_every(
            "pipeline",
            self.fetch_interval,
            self.cancel.clone(),
            move || {
                let pipeline = pipeline.clone();
                let status = status.clone();
                async move {
                    let error = match pipeline.run().await {
                        Ok(report) => {
                            tracing::info!(report = ?report, "Pipeline run complete");
                            None
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Pipeline run aborted");
                            Some(e.to_string())
                        }
                    };
                    status.write().await.record_pipeline_run(error);
                }
            },
        ));

        let pool = self.pipeline.pool().clone();
        let asset_dir = self.pipeline.asset_dir().to_path_buf();
        let status = self.status.clone();
        let collector_task = tokio::spawn(run_every(
            "collector",
            self.cleanup_interval,
            self.cancel.clone(),
            move || {
                let pool = pool.clone();
                let asset_dir = asset_dir.clone();
                let status = status.clone();
                async move {
                    let error = match collect_garbage(&pool, &asset_dir).await {
                        Ok(_) => None,
                        Err(e) => {
                            tracing::error!(error = %e, "Image cleanup aborted");
                            Some(e.to_string())
                        }
                    };
                    status.write().await.record_collection_run(error);
                }
            },
        ));

        SchedulerHandles {
            pipeline: pipeline_task,
            collector: collector_task,
        }
    }
}

/// Run `job` at startup and then every `period` until `cancel` fires
///
/// Cancellation is only observed between runs.
pub async fn run_every<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!(schedule = name, "Schedule tick");
        job().await;
    }

    tracing::info!(schedule = name, "Schedule stopped");
}
