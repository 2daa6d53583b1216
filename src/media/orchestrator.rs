// Download orchestrator - idle → running → {completed, failed}
//
// The transfer runs in a spawned task and publishes through a watch channel.
// Every update is tagged with the task id, so a worker that outlives its task
// (aborted, superseded) can never touch the state of a newer one.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::errors::{DownloadError, InvalidStateError};
use super::models::{DownloadProgress, DownloadStatus, DownloadTask, TransferRequest};
use super::traits::{NullSink, ProgressSink, TransferBackend};

/// Handle given to a transfer backend for publishing progress
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: String,
    state: Arc<watch::Sender<DownloadTask>>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressReporter {
    /// Publish progress for the running task. Progress never goes backwards
    /// and is clamped to 0-100. Returns false once the task is no longer
    /// current, which tells the backend to stop.
    pub fn report(&self, percent: f32, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut published = None;

        let accepted = self.state.send_if_modified(|task| {
            if task.id != self.task_id || task.status != DownloadStatus::Running {
                return false;
            }
            if percent.is_finite() {
                task.progress = task.progress.max(percent.clamp(0.0, 100.0));
            }
            task.message = message;
            published = Some(DownloadProgress::from(&*task));
            true
        });

        if let Some(progress) = published {
            self.sink.emit(progress);
        }
        accepted
    }

    pub fn is_current(&self) -> bool {
        let task = self.state.borrow();
        task.id == self.task_id && task.status == DownloadStatus::Running
    }

    /// Move the task to its terminal state, at most once
    fn finish(&self, outcome: Result<(), DownloadError>) {
        let mut published = None;

        self.state.send_if_modified(|task| {
            if task.id != self.task_id || task.status != DownloadStatus::Running {
                return false;
            }
            match &outcome {
                Ok(()) => {
                    task.status = DownloadStatus::Completed;
                    task.progress = 100.0;
                    task.message = "Download complete!".to_string();
                }
                Err(e) => {
                    task.status = DownloadStatus::Failed;
                    task.message = "Download failed".to_string();
                    task.error = Some(e.to_string());
                }
            }
            published = Some(DownloadProgress::from(&*task));
            true
        });

        if let Some(progress) = published {
            match &outcome {
                Ok(()) => log::info!("[Orchestrator] Task {} completed", self.task_id),
                Err(e) => log::warn!("[Orchestrator] Task {} failed: {}", self.task_id, e),
            }
            self.sink.emit(progress);
        }
    }
}

pub struct DownloadOrchestrator {
    backend: Arc<dyn TransferBackend>,
    sink: Arc<dyn ProgressSink>,
    state: Arc<watch::Sender<DownloadTask>>,
    worker: Option<JoinHandle<()>>,
}

impl DownloadOrchestrator {
    pub fn new(backend: Arc<dyn TransferBackend>) -> Self {
        let (state, _) = watch::channel(DownloadTask::idle());
        Self {
            backend,
            sink: Arc::new(NullSink),
            state: Arc::new(state),
            worker: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sink = sink;
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Snapshot of the current task
    pub fn task(&self) -> DownloadTask {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> DownloadStatus {
        self.state.borrow().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == DownloadStatus::Running
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<DownloadTask> {
        self.state.subscribe()
    }

    /// Start a transfer and return the new task id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, request: TransferRequest) -> Result<String, InvalidStateError> {
        if self.is_running() {
            return Err(InvalidStateError::Busy);
        }
        if request.format.trim().is_empty() {
            return Err(InvalidStateError::NoFormatSelected);
        }

        // Previous task is discarded
        self.stop_worker();

        let task_id = Uuid::new_v4().to_string();
        let task = DownloadTask::running(task_id.clone(), request.format.clone());
        let initial = DownloadProgress::from(&task);
        self.state.send_replace(task);
        self.sink.emit(initial);

        log::info!(
            "[Orchestrator] Starting {} download of {} with {}",
            request.format,
            request.url,
            self.backend.name()
        );

        let reporter = ProgressReporter {
            task_id: task_id.clone(),
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
        };
        let backend = Arc::clone(&self.backend);

        self.worker = Some(tokio::spawn(async move {
            let outcome = backend.transfer(request, reporter.clone()).await;
            reporter.finish(outcome);
        }));

        Ok(task_id)
    }

    /// Stop a running transfer and go back to idle.
    /// Returns whether anything was running.
    pub fn cancel(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        let task_id = self.state.borrow().id.clone();
        self.stop_worker();
        self.publish_idle();
        log::info!("[Orchestrator] Task {} cancelled", task_id);
        true
    }

    /// Drop whatever task exists and go back to idle
    pub fn reset(&mut self) {
        self.stop_worker();
        if self.status() != DownloadStatus::Idle {
            self.publish_idle();
        }
    }

    fn publish_idle(&self) {
        let idle = DownloadTask::idle();
        let progress = DownloadProgress::from(&idle);
        self.state.send_replace(idle);
        self.sink.emit(progress);
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for DownloadOrchestrator {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
