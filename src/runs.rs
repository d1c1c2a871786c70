use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::{RunReport, ScrapePipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub report: Option<RunReport>,
    pub error: Option<String>,
}

impl RunStatus {
    fn running(run_id: String) -> Self {
        Self {
            run_id,
            state: RunState::Running,
            started_at: Utc::now(),
            finished_at: None,
            report: None,
            error: None,
        }
    }

    fn finish(&mut self, result: Result<RunReport, String>) {
        self.finished_at = Some(Utc::now());
        match result {
            Ok(report) => {
                self.state = RunState::Completed;
                self.report = Some(report);
            }
            Err(e) => {
                self.state = RunState::Aborted;
                self.error = Some(e);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Started(String),
    /// Another run holds the slot; carries its id.
    AlreadyRunning(String),
}

/// Owns pipeline executions: one at a time, each on its own task.
pub struct RunRegistry {
    pipeline: Arc<ScrapePipeline>,
    slot: Arc<Semaphore>,
    latest: Arc<RwLock<Option<RunStatus>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    seq: AtomicU64,
}

impl RunRegistry {
    pub fn new(pipeline: Arc<ScrapePipeline>) -> Self {
        Self {
            pipeline,
            slot: Arc::new(Semaphore::new(1)),
            latest: Arc::new(RwLock::new(None)),
            handle: Mutex::new(None),
            seq: AtomicU64::new(0),
        }
    }

    /// Start a run in the background unless one is already in flight.
    pub async fn trigger(&self) -> Trigger {
        // Slot and status only change together, under the write lock.
        let mut latest = self.latest.write().await;
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let current = latest
                    .as_ref()
                    .map(|s| s.run_id.clone())
                    .unwrap_or_default();
                warn!(run_id = %current, "scrape already in progress, trigger rejected");
                return Trigger::AlreadyRunning(current);
            }
        };

        let run_id = self.next_run_id();
        *latest = Some(RunStatus::running(run_id.clone()));
        drop(latest);
        info!(run_id = %run_id, "scrape run started");

        let pipeline = Arc::clone(&self.pipeline);
        let latest = Arc::clone(&self.latest);
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            // Released only after the final status is written.
            let _permit = permit;
            // Inner task so a panicking run still reaches `finish`.
            let result = match tokio::spawn(async move { pipeline.run().await }).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(format!("scrape task failed: {}", e)),
            };
            let mut latest = latest.write().await;
            if let Some(status) = latest.as_mut().filter(|s| s.run_id == task_run_id) {
                status.finish(result);
                info!(run_id = %task_run_id, state = ?status.state, "scrape run finished");
            }
        });
        *self.handle.lock().await = Some(handle);

        Trigger::Started(run_id)
    }

    pub async fn latest(&self) -> Option<RunStatus> {
        self.latest.read().await.clone()
    }

    /// Wait for the most recently started run, then return its status.
    pub async fn wait(&self) -> Option<RunStatus> {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "scrape task did not complete");
            }
        }
        self.latest().await
    }

    fn next_run_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("run-{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), seq)
    }
}
