// Media module - resolution, format selection, downloads and history

pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod history;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transfers;
pub mod utils;

pub use errors::{
    ConfigError, DownloadError, InvalidFormatError, InvalidStateError, PersistenceWarning, ProviderError,
    ResolutionError, SessionError, StorageError,
};
pub use format_selector::FormatSelector;
pub use history::{HistoryStore, Recorded, HISTORY_KEY, HISTORY_LIMIT};
pub use models::{
    DownloadProgress, DownloadStatus, DownloadTask, FormatKind, HistoryEntry, MediaRecord, RawMetadata,
    SelectionState, SessionSnapshot, TransferRequest,
};
pub use orchestrator::{DownloadOrchestrator, ProgressReporter};
pub use providers::{HttpMetadataProvider, YtDlpMetadataProvider};
pub use resolver::MetadataResolver;
pub use session::{Resolved, SessionController};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use traits::{MetadataProvider, NullSink, ProgressSink, TransferBackend};
#[cfg(feature = "desktop")]
pub use traits::ProgressEmitter;
pub use transfers::{SimulatedTransfer, YtDlpTransfer};
