pub mod config;
pub mod media;

#[cfg(feature = "desktop")]
mod commands;

pub use config::AppConfig;
pub use media::SessionController;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::Manager;

    use crate::commands::AppState;
    use crate::media::ProgressEmitter;

    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .level_for("tao", log::LevelFilter::Error)
                .build(),
        )
        .setup(|app| {
            let config_path = app.path().app_config_dir()?.join("config.json");
            let config = AppConfig::load_or_default(&config_path).apply_env_overrides();

            let session = SessionController::from_config(&config)?
                .with_progress_sink(Arc::new(ProgressEmitter::new(app.handle().clone())));

            app.manage(AppState::new(session));
            log::info!("[App] Ready (config {})", config_path.display());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::resolve_url,
            commands::select_format,
            commands::start_download,
            commands::cancel_download,
            commands::replay_history,
            commands::clear_history,
            commands::get_history,
            commands::get_session,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
