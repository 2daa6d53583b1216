// Tauri commands over the session controller
//
// The session sits behind an async mutex; download progress reaches the
// front end as `download-progress` events, so no command waits on a transfer.

use serde::Serialize;
use tauri::State;
use tokio::sync::Mutex;

use crate::media::{HistoryEntry, MediaRecord, SessionController, SessionError, SessionSnapshot};

pub struct AppState {
    session: Mutex<SessionController>,
}

impl AppState {
    pub fn new(session: SessionController) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

/// Payload of a successful resolution
#[derive(Debug, Serialize)]
pub struct ResolvePayload {
    pub record: MediaRecord,
    pub entry: HistoryEntry,
    pub warning: Option<String>,
}

fn describe(error: SessionError) -> String {
    match &error {
        SessionError::Resolution(e) => {
            let mut message = e.to_string();
            if let Some(hint) = e.hint() {
                message = format!("{} {}", message, hint);
            }
            if e.is_retryable() {
                message.push_str(" Retrying later may help.");
            }
            message
        }
        _ => error.to_string(),
    }
}

#[tauri::command]
pub async fn resolve_url(url: String, state: State<'_, AppState>) -> Result<ResolvePayload, String> {
    let mut session = state.session.lock().await;
    let resolved = session.resolve_url(&url).await.map_err(describe)?;

    Ok(ResolvePayload {
        record: resolved.record,
        entry: resolved.entry,
        warning: resolved.warning.map(|w| w.to_string()),
    })
}

#[tauri::command]
pub async fn select_format(label: String, state: State<'_, AppState>) -> Result<(), String> {
    let mut session = state.session.lock().await;
    session.select_format(&label).map_err(|e| e.to_string())
}

/// Returns the new task id
#[tauri::command]
pub async fn start_download(state: State<'_, AppState>) -> Result<String, String> {
    let mut session = state.session.lock().await;
    session.start_download().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn cancel_download(state: State<'_, AppState>) -> Result<bool, String> {
    let mut session = state.session.lock().await;
    Ok(session.cancel_download())
}

#[tauri::command]
pub async fn replay_history(id: String, state: State<'_, AppState>) -> Result<ResolvePayload, String> {
    let mut session = state.session.lock().await;
    let entry = session
        .history()
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| format!("History entry {} not found", id))?;

    let resolved = session.replay(&entry).await.map_err(describe)?;
    Ok(ResolvePayload {
        record: resolved.record,
        entry: resolved.entry,
        warning: resolved.warning.map(|w| w.to_string()),
    })
}

/// Returns a warning when the cleared history could not be erased from disk
#[tauri::command]
pub async fn clear_history(state: State<'_, AppState>) -> Result<Option<String>, String> {
    let session = state.session.lock().await;
    Ok(session.clear_history().map(|w| w.to_string()))
}

#[tauri::command]
pub async fn get_history(state: State<'_, AppState>) -> Result<Vec<HistoryEntry>, String> {
    let session = state.session.lock().await;
    Ok(session.history())
}

#[tauri::command]
pub async fn get_session(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let session = state.session.lock().await;
    Ok(session.snapshot())
}
