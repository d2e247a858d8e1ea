use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use vigil_core::engine::UpdateEngine;
use vigil_core::ipc::IpcClient;
use vigil_core::models::{CoreError, CoreErrorKind, CoreResult};
use vigil_core::service::service_ipc_server;
use vigil_core::settings::{InMemorySettingsStore, SettingsStore};
use vigil_core::winget::{UpdateJsonVariant, WingetSource};

const UPDATE_TEXT_FIXTURE: &str = include_str!("fixtures/winget/update_text.txt");
const NO_UPDATES_FIXTURE: &str = include_str!("fixtures/winget/update_no_updates.txt");

/// Winget stand-in whose update table empties after an upgrade run.
struct ScriptedSource {
    text_output: Mutex<String>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            text_output: Mutex::new(UPDATE_TEXT_FIXTURE.to_string()),
        }
    }
}

impl WingetSource for ScriptedSource {
    fn update_json(&self, _variant: UpdateJsonVariant) -> CoreResult<String> {
        Err(CoreError::new(
            CoreErrorKind::ProcessFailure,
            "json format not supported",
        ))
    }

    fn update_text(&self) -> CoreResult<String> {
        Ok(self.text_output.lock().unwrap().clone())
    }

    fn pin_list(&self) -> CoreResult<String> {
        Ok(String::new())
    }

    fn upgrade_all(&self) -> CoreResult<String> {
        *self.text_output.lock().unwrap() = NO_UPDATES_FIXTURE.to_string();
        Ok(String::new())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_command_surface_round_trips_over_one_connection() {
    let socket_dir = tempfile::tempdir().expect("temp dir");
    let socket_path = socket_dir.path().join("vigil.sock");

    let settings: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
    let engine = Arc::new(UpdateEngine::new(ScriptedSource::new(), settings.clone()));
    let server = service_ipc_server(&socket_path, engine.clone(), settings.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    let mut client = IpcClient::new(&socket_path);
    client
        .connect(Duration::from_secs(5))
        .await
        .expect("client connected");

    // check_updates reports the count and a fresh timestamp.
    let response = client
        .send_command("check_updates", json!({}))
        .await
        .expect("check_updates response");
    assert_eq!(response.command, "response");
    assert_eq!(response.data["success"], json!(true));
    assert_eq!(response.data["update_count"], json!(4));
    assert!(response.data["last_check"].is_string());

    // get_status agrees with the count the check just produced.
    let status = client
        .send_command("get_status", json!({}))
        .await
        .expect("get_status response");
    assert_eq!(status.data["update_count"], json!(4));
    assert_eq!(status.data["morning_check"], json!("08:00"));
    assert_eq!(status.data["afternoon_check"], json!("16:00"));
    assert_eq!(status.data["auto_check"], json!(true));
    assert!(status.data["last_check"].is_string());

    // get_updates returns the full records.
    let updates = client
        .send_command("get_updates", json!({}))
        .await
        .expect("get_updates response");
    assert_eq!(updates.data["count"], json!(4));
    let listed = updates.data["updates"].as_array().expect("updates array");
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0]["id"], json!("Mozilla.Firefox"));
    assert_eq!(listed[0]["current_version"], json!("124.0.1"));
    assert_eq!(listed[0]["source"], json!("winget"));

    let last_check = client
        .send_command("get_last_check", json!({}))
        .await
        .expect("get_last_check response");
    assert!(last_check.data["last_check"].is_string());

    // Settings round trip through save_settings/get_settings.
    let saved = client
        .send_command(
            "save_settings",
            json!({ "morning_check": "09:15", "auto_check": false }),
        )
        .await
        .expect("save_settings response");
    assert_eq!(saved.data["success"], json!(true));

    let fetched = client
        .send_command("get_settings", json!({}))
        .await
        .expect("get_settings response");
    assert_eq!(fetched.data["morning_check"], json!("09:15"));
    assert_eq!(fetched.data["auto_check"], json!(false));
    assert_eq!(fetched.data["afternoon_check"], json!("16:00"));

    // Invalid settings fail in-band, not as an error envelope.
    let rejected = client
        .send_command("save_settings", json!({ "morning_check": "25:00" }))
        .await
        .expect("save_settings response");
    assert_eq!(rejected.command, "response");
    assert_eq!(rejected.data["success"], json!(false));
    assert!(rejected.data["error"].is_string());

    // Unknown commands get an error envelope and the connection survives.
    let unknown = client
        .send_command("bogus_command", json!({}))
        .await
        .expect("error envelope");
    assert!(unknown.is_error());
    assert!(
        unknown.data["message"]
            .as_str()
            .expect("error message")
            .contains("unknown command")
    );

    // install_updates empties the scripted update table.
    let installed = client
        .send_command("install_updates", json!({}))
        .await
        .expect("install_updates response");
    assert_eq!(installed.data["success"], json!(true));
    assert_eq!(installed.data["remaining_count"], json!(0));

    shutdown_tx.send(true).expect("server listening for shutdown");
    server_task
        .await
        .expect("server task joined")
        .expect("server exited cleanly");

    // With the server gone the client observes a transport failure and
    // clears its connection for a later reconnect.
    assert!(client.send_command("get_status", json!({})).await.is_none());
    assert!(!client.is_connected());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_accepts_a_new_client_after_disconnect() {
    let socket_dir = tempfile::tempdir().expect("temp dir");
    let socket_path = socket_dir.path().join("vigil.sock");

    let settings: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
    let engine = Arc::new(UpdateEngine::new(ScriptedSource::new(), settings.clone()));
    let server = service_ipc_server(&socket_path, engine, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    for _ in 0..2 {
        let mut client = IpcClient::new(&socket_path);
        client
            .connect(Duration::from_secs(5))
            .await
            .expect("client connected");
        let response = client
            .send_command("get_last_check", json!({}))
            .await
            .expect("response");
        assert_eq!(response.command, "response");
        client.disconnect();
    }

    shutdown_tx.send(true).expect("server listening for shutdown");
    server_task
        .await
        .expect("server task joined")
        .expect("server exited cleanly");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_connect_times_out_without_a_server() {
    let socket_dir = tempfile::tempdir().expect("temp dir");
    let socket_path = socket_dir.path().join("missing.sock");

    let mut client = IpcClient::new(&socket_path);
    let error = client
        .connect(Duration::from_millis(600))
        .await
        .expect_err("no server to connect to");
    assert_eq!(error.kind, CoreErrorKind::Transport);
}
