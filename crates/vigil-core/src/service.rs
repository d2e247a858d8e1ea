use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::clock;
use crate::engine::UpdateEngine;
use crate::ipc::IpcServer;
use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::settings::{Settings, SettingsStore, validate_check_time};

/// Builds the IPC server with every service command registered.
///
/// Handlers are synchronous and may block on winget; the server runs them on
/// blocking threads. All of them answer with the wire shapes the front-end
/// expects, and `save_settings` reports failure in-band (`success: false`)
/// instead of as an error envelope.
pub fn service_ipc_server(
    socket_path: impl Into<PathBuf>,
    engine: Arc<UpdateEngine>,
    settings: Arc<dyn SettingsStore>,
) -> IpcServer {
    let mut server = IpcServer::new(socket_path);

    {
        let engine = engine.clone();
        server.register_handler("check_updates", move |_data: Value| {
            let update_count = engine.check_updates(false, None, None);
            Ok(json!({
                "update_count": update_count,
                "success": true,
                "last_check": clock::rfc3339_now(),
            }))
        });
    }

    {
        let engine = engine.clone();
        let settings = settings.clone();
        server.register_handler("get_status", move |_data: Value| {
            let update_count = engine.get_update_count(None, None);
            let defaults = snapshot_or_default(settings.as_ref());
            Ok(json!({
                "update_count": update_count,
                "last_check": last_check_string(&engine, settings.as_ref()),
                "auto_check": defaults.auto_check,
                "morning_check": defaults.morning_check,
                "afternoon_check": defaults.afternoon_check,
            }))
        });
    }

    {
        let engine = engine.clone();
        server.register_handler("get_updates", move |_data: Value| {
            let updates = engine.get_updates_list(None, None);
            let count = updates.len();
            let updates = serde_json::to_value(updates).map_err(|error| {
                CoreError::new(
                    CoreErrorKind::Internal,
                    format!("failed to serialize update list: {error}"),
                )
            })?;
            Ok(json!({ "updates": updates, "count": count }))
        });
    }

    {
        let engine = engine.clone();
        let settings = settings.clone();
        server.register_handler("get_last_check", move |_data: Value| {
            Ok(json!({ "last_check": last_check_string(&engine, settings.as_ref()) }))
        });
    }

    {
        let settings = settings.clone();
        server.register_handler("save_settings", move |data: Value| {
            match apply_settings(settings.as_ref(), &data) {
                Ok(()) => Ok(json!({ "success": true })),
                Err(save_error) => Ok(json!({
                    "success": false,
                    "error": save_error.to_string(),
                })),
            }
        });
    }

    {
        let settings = settings.clone();
        server.register_handler("get_settings", move |_data: Value| {
            let snapshot = snapshot_or_default(settings.as_ref());
            serde_json::to_value(snapshot).map_err(|error| {
                CoreError::new(
                    CoreErrorKind::Internal,
                    format!("failed to serialize settings: {error}"),
                )
            })
        });
    }

    {
        let engine = engine.clone();
        server.register_handler("install_updates", move |_data: Value| {
            let success = engine.install_all_updates();
            Ok(json!({
                "success": success,
                "remaining_count": engine.snapshot().count,
            }))
        });
    }

    server
}

/// The engine's in-memory timestamp wins; the persisted one covers the
/// window after a restart before the first check completes.
fn last_check_string(engine: &UpdateEngine, settings: &dyn SettingsStore) -> Option<String> {
    engine
        .last_check_time()
        .map(clock::format_rfc3339)
        .or_else(|| settings.last_check().ok().flatten())
}

fn snapshot_or_default(settings: &dyn SettingsStore) -> Settings {
    match settings.snapshot() {
        Ok(snapshot) => snapshot,
        Err(settings_error) => {
            warn!(%settings_error, "settings unavailable, answering with defaults");
            Settings::default()
        }
    }
}

fn apply_settings(settings: &dyn SettingsStore, data: &Value) -> CoreResult<()> {
    let object = data.as_object().ok_or_else(|| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            "save_settings expects an object of settings",
        )
    })?;

    if let Some(value) = object.get("morning_check") {
        let check_time = expect_string(value, "morning_check")?;
        validate_check_time(check_time)?;
        settings.set_morning_check(check_time)?;
    }

    if let Some(value) = object.get("afternoon_check") {
        let check_time = expect_string(value, "afternoon_check")?;
        validate_check_time(check_time)?;
        settings.set_afternoon_check(check_time)?;
    }

    if let Some(value) = object.get("notify_on_updates") {
        settings.set_notify_on_updates(expect_bool(value, "notify_on_updates")?)?;
    }

    if let Some(value) = object.get("auto_check") {
        settings.set_auto_check(expect_bool(value, "auto_check")?)?;
    }

    if let Some(value) = object.get("include_pinned") {
        settings.set_include_pinned(expect_bool(value, "include_pinned")?)?;
    }

    if let Some(value) = object.get("include_unknown") {
        settings.set_include_unknown(expect_bool(value, "include_unknown")?)?;
    }

    Ok(())
}

fn expect_string<'a>(value: &'a Value, key: &str) -> CoreResult<&'a str> {
    value.as_str().ok_or_else(|| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("setting '{key}' must be a string"),
        )
    })
}

fn expect_bool(value: &Value, key: &str) -> CoreResult<bool> {
    value.as_bool().ok_or_else(|| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("setting '{key}' must be a boolean"),
        )
    })
}
