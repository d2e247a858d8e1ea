use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vigil_core::engine::UpdateEngine;
use vigil_core::execution::TokioProcessExecutor;
use vigil_core::ipc::default_socket_path;
use vigil_core::scheduler::Scheduler;
use vigil_core::service::service_ipc_server;
use vigil_core::settings::{InMemorySettingsStore, SettingsStore};
use vigil_core::sqlite::SqliteSettingsStore;
use vigil_core::winget::ProcessWingetSource;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = data_dir();
    if let Err(create_error) = std::fs::create_dir_all(&data_dir) {
        warn!(path = %data_dir.display(), %create_error, "failed to create data directory");
    }

    let settings = open_settings(&data_dir);

    let mut source = ProcessWingetSource::new(Arc::new(TokioProcessExecutor));
    if let Some(check_timeout) = check_timeout_override() {
        info!(seconds = check_timeout.as_secs(), "using configured check timeout");
        source = source.with_check_timeout(check_timeout);
    }
    let engine = Arc::new(UpdateEngine::new(source, settings.clone()));

    info!("performing initial update check");
    {
        let engine = engine.clone();
        let _ = tokio::task::spawn_blocking(move || engine.check_updates(false, None, None)).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::new(engine.clone(), settings.clone());
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let server = service_ipc_server(default_socket_path(), engine, settings);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(signal_error) => error!(%signal_error, "failed to listen for shutdown signal"),
    }

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(server_error)) => error!(%server_error, "IPC server exited with error"),
        Err(join_error) => error!(%join_error, "IPC server task panicked"),
    }

    info!("service stopped");
}

fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("VIGIL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(dir).join("vigil");
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local/share/vigil");
    }
    PathBuf::from(".")
}

fn check_timeout_override() -> Option<Duration> {
    let raw = std::env::var("VIGIL_CHECK_TIMEOUT_SECS").ok()?;
    match raw.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Some(Duration::from_secs(seconds)),
        _ => {
            warn!(value = %raw, "ignoring invalid VIGIL_CHECK_TIMEOUT_SECS");
            None
        }
    }
}

/// The sqlite store is the normal path; if its file cannot be prepared the
/// service still comes up on in-memory defaults for this run.
fn open_settings(data_dir: &std::path::Path) -> Arc<dyn SettingsStore> {
    let store = SqliteSettingsStore::new(data_dir.join("settings.db"));
    match store.migrate_to_latest() {
        Ok(()) => {
            info!(path = %store.database_path().display(), "settings store ready");
            Arc::new(store)
        }
        Err(storage_error) => {
            error!(%storage_error, "settings store unavailable, using in-memory defaults");
            Arc::new(InMemorySettingsStore::new())
        }
    }
}
