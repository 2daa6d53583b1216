//! Session controller: resolution → selection → download, plus history.
//!
//! Owns the current [`MediaRecord`], the [`FormatSelector`] and the
//! [`DownloadOrchestrator`], and shares the [`HistoryStore`]. All commands
//! take `&mut self`; a front end that needs shared access wraps the session
//! in an async mutex and observes downloads through
//! [`SessionController::subscribe_download`] without taking the lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::errors::{ConfigError, InvalidFormatError, InvalidStateError, PersistenceWarning, SessionError};
use super::format_selector::FormatSelector;
use super::history::HistoryStore;
use super::models::{DownloadTask, HistoryEntry, MediaRecord, SelectionState, SessionSnapshot, TransferRequest};
use super::orchestrator::DownloadOrchestrator;
use super::resolver::MetadataResolver;
use super::storage::{JsonFileStore, KeyValueStore};
use super::traits::{MetadataProvider, ProgressSink, TransferBackend};
use super::{providers, transfers};
use crate::config::AppConfig;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub record: MediaRecord,
    pub entry: HistoryEntry,
    /// History was updated in memory but not saved
    pub warning: Option<PersistenceWarning>,
}

pub struct SessionController {
    resolver: MetadataResolver,
    history: Arc<HistoryStore>,
    selector: FormatSelector,
    orchestrator: DownloadOrchestrator,
    record: Option<MediaRecord>,
    /// URL of the last resolution attempt
    pending_url: String,
    output_dir: PathBuf,
}

impl SessionController {
    pub fn new(
        resolver: MetadataResolver,
        history: Arc<HistoryStore>,
        orchestrator: DownloadOrchestrator,
    ) -> Self {
        Self {
            resolver,
            history,
            selector: FormatSelector::new(),
            orchestrator,
            record: None,
            pending_url: String::new(),
            output_dir: PathBuf::from("."),
        }
    }

    /// Wire a session from parts, with the default resolver timeout
    pub fn with_parts(
        provider: Box<dyn MetadataProvider>,
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<dyn TransferBackend>,
    ) -> Self {
        Self::new(
            MetadataResolver::new(provider),
            Arc::new(HistoryStore::load(storage)),
            DownloadOrchestrator::new(backend),
        )
    }

    /// Wire a session from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let provider = providers::from_config(&config.provider)?;
        let resolver = MetadataResolver::new(provider)
            .with_timeout(Duration::from_secs(config.provider.timeout_seconds.max(1)));

        let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(config.history.dir.clone()));
        let history = Arc::new(HistoryStore::load_with_limit(storage, config.history.limit));

        let backend = transfers::from_config(&config.download, &config.provider);
        let orchestrator = DownloadOrchestrator::new(backend);

        log::info!(
            "[Session] Provider {}, backend {}, history in {}",
            resolver.provider_name(),
            orchestrator.backend_name(),
            config.history.dir.display()
        );

        Ok(Self::new(resolver, history, orchestrator).with_output_dir(config.download.output_dir.clone()))
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.orchestrator.set_sink(sink);
        self
    }

    /// Resolve `url`, record it in history and make it the current media.
    ///
    /// On failure the previous record and selection are dropped and history
    /// is left alone.
    pub async fn resolve_url(&mut self, url: &str) -> Result<Resolved, SessionError> {
        if self.orchestrator.is_running() {
            return Err(InvalidStateError::Busy.into());
        }

        self.pending_url = url.trim().to_string();

        let record = match self.resolver.resolve(url).await {
            Ok(record) => record,
            Err(e) => {
                self.record = None;
                self.selector.clear();
                return Err(e.into());
            }
        };

        let recorded = self.history.record(&self.pending_url, &record.title);
        if let Some(warning) = &recorded.warning {
            log::warn!("[Session] {}", warning);
        }

        self.selector.seed(&record);
        self.record = Some(record.clone());

        if self.orchestrator.status().is_terminal() {
            self.orchestrator.reset();
        }

        Ok(Resolved {
            record,
            entry: recorded.entry,
            warning: recorded.warning,
        })
    }

    pub fn select_format(&mut self, label: &str) -> Result<(), InvalidFormatError> {
        self.selector.select(label)
    }

    /// Start downloading the selected format of the current media.
    /// Returns the task id.
    pub fn start_download(&mut self) -> Result<String, InvalidStateError> {
        if self.record.is_none() {
            return Err(InvalidStateError::NoMediaResolved);
        }
        let format = self
            .selector
            .selected()
            .ok_or(InvalidStateError::NoFormatSelected)?
            .to_string();
        let kind = self
            .selector
            .kind_of(&format)
            .ok_or(InvalidStateError::NoFormatSelected)?;

        self.orchestrator.start(TransferRequest {
            url: self.pending_url.clone(),
            format,
            kind,
            output_dir: self.output_dir.clone(),
        })
    }

    /// Returns whether a running download was cancelled
    pub fn cancel_download(&mut self) -> bool {
        self.orchestrator.cancel()
    }

    /// Resolve a past entry's URL again
    pub async fn replay(&mut self, entry: &HistoryEntry) -> Result<Resolved, SessionError> {
        self.resolve_url(&entry.url).await
    }

    pub fn clear_history(&self) -> Option<PersistenceWarning> {
        self.history.clear()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.list()
    }

    pub fn record(&self) -> Option<&MediaRecord> {
        self.record.as_ref()
    }

    pub fn selection(&self) -> SelectionState {
        self.selector.state()
    }

    pub fn download(&self) -> DownloadTask {
        self.orchestrator.task()
    }

    pub fn pending_url(&self) -> &str {
        &self.pending_url
    }

    pub fn subscribe_download(&self) -> watch::Receiver<DownloadTask> {
        self.orchestrator.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            pending_url: self.pending_url.clone(),
            record: self.record.clone(),
            selection: self.selection(),
            download: self.download(),
            history: self.history(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::errors::{DownloadError, ProviderError, ResolutionError};
    use crate::media::models::{DownloadStatus, FormatKind, RawMetadata};
    use crate::media::orchestrator::ProgressReporter;
    use crate::media::storage::MemoryStore;
    use async_trait::async_trait;

    /// Answers with a title derived from the URL; "fail" URLs error
    struct EchoProvider;

    #[async_trait]
    impl MetadataProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn fetch(&self, url: &str) -> Result<RawMetadata, ProviderError> {
            if url.contains("fail") {
                return Err(ProviderError::Parse("not an object".to_string()));
            }
            Ok(RawMetadata {
                title: Some(format!("Title of {}", url)),
                audio_formats: Some(vec!["OPUS".to_string()]),
                ..RawMetadata::default()
            })
        }
    }

    /// Never finishes; keeps the orchestrator running
    struct StalledTransfer;

    #[async_trait]
    impl TransferBackend for StalledTransfer {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn transfer(&self, _request: TransferRequest, _progress: ProgressReporter) -> Result<(), DownloadError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Fails right after starting
    struct BrokenTransfer;

    #[async_trait]
    impl TransferBackend for BrokenTransfer {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn transfer(&self, _request: TransferRequest, progress: ProgressReporter) -> Result<(), DownloadError> {
            progress.report(30.0, "30%");
            Err(DownloadError::Execution("connection reset".to_string()))
        }
    }

    fn session() -> SessionController {
        SessionController::with_parts(Box::new(EchoProvider), Arc::new(MemoryStore::new()), Arc::new(StalledTransfer))
    }

    #[tokio::test]
    async fn resolution_seeds_selection_and_history() {
        let mut session = session();
        let resolved = session.resolve_url(" https://example.com/a ").await.unwrap();

        assert_eq!(resolved.record.title, "Title of https://example.com/a");
        assert_eq!(resolved.entry.url, "https://example.com/a");
        assert!(resolved.warning.is_none());
        assert_eq!(session.pending_url(), "https://example.com/a");
        assert_eq!(session.selection().selected_format.as_deref(), Some("720p"));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn start_download_uses_selected_kind() {
        let mut session = session();
        assert_eq!(session.start_download(), Err(InvalidStateError::NoMediaResolved));

        session.resolve_url("https://example.com/a").await.unwrap();
        session.select_format("OPUS").unwrap();
        let task_id = session.start_download().unwrap();

        let task = session.download();
        assert_eq!(task.id, task_id);
        assert_eq!(task.status, DownloadStatus::Running);
        assert_eq!(task.format.as_deref(), Some("OPUS"));
        assert_eq!(session.selector.kind_of("OPUS"), Some(FormatKind::Audio));
    }

    #[tokio::test]
    async fn running_download_blocks_resolution_and_restart() {
        let mut session = session();
        session.resolve_url("https://example.com/a").await.unwrap();
        session.start_download().unwrap();

        assert_eq!(
            session.resolve_url("https://example.com/b").await,
            Err(SessionError::InvalidState(InvalidStateError::Busy))
        );
        assert_eq!(session.start_download(), Err(InvalidStateError::Busy));
        assert_eq!(session.history().len(), 1);

        assert!(session.cancel_download());
        assert_eq!(session.download().status, DownloadStatus::Idle);
        assert!(session.resolve_url("https://example.com/b").await.is_ok());
    }

    #[tokio::test]
    async fn failed_resolution_clears_record_only() {
        let mut session = session();
        session.resolve_url("https://example.com/a").await.unwrap();

        let err = session.resolve_url("https://example.com/fail").await.unwrap_err();
        assert!(matches!(err, SessionError::Resolution(ResolutionError::Provider(_))));
        assert!(session.record().is_none());
        assert_eq!(session.selection(), SelectionState::default());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.start_download(), Err(InvalidStateError::NoMediaResolved));
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let mut session = session();
        session.resolve_url("https://example.com/a").await.unwrap();
        session.select_format("1080p").unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.pending_url, "https://example.com/a");
        assert_eq!(snapshot.selection.selected_format.as_deref(), Some("1080p"));
        assert_eq!(snapshot.download.status, DownloadStatus::Idle);
        assert_eq!(snapshot.history.len(), 1);
        assert!(snapshot.record.is_some());
    }

    #[tokio::test]
    async fn new_resolution_resets_failed_download() {
        let mut session =
            SessionController::with_parts(Box::new(EchoProvider), Arc::new(MemoryStore::new()), Arc::new(BrokenTransfer));
        session.resolve_url("https://example.com/a").await.unwrap();

        let mut updates = session.subscribe_download();
        session.start_download().unwrap();
        while !updates.borrow_and_update().status.is_terminal() {
            updates.changed().await.unwrap();
        }

        let failed = session.download();
        assert_eq!(failed.status, DownloadStatus::Failed);
        assert!(failed.error.unwrap().contains("connection reset"));

        session.resolve_url("https://example.com/b").await.unwrap();
        let task = session.download();
        assert_eq!(task.status, DownloadStatus::Idle);
        assert_eq!(task.error, None);
        assert_eq!(task.progress, 0.0);
    }
}
