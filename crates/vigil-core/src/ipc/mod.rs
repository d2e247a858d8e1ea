use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock;
use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub mod client;
pub mod server;

pub use client::IpcClient;
pub use server::IpcServer;

pub const DEFAULT_SOCKET_NAME: &str = "vigil.sock";

/// Resolves the socket path shared by the service host and its clients:
/// `VIGIL_SOCKET` wins, then the user runtime directory, then the data
/// directory fallbacks.
pub fn default_socket_path() -> std::path::PathBuf {
    use std::path::PathBuf;

    if let Some(path) = std::env::var_os("VIGIL_SOCKET") {
        return PathBuf::from(path);
    }
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(DEFAULT_SOCKET_NAME);
    }
    if let Some(dir) = std::env::var_os("VIGIL_DATA_DIR") {
        return PathBuf::from(dir).join(DEFAULT_SOCKET_NAME);
    }
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(dir).join("vigil").join(DEFAULT_SOCKET_NAME);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".local/share/vigil")
            .join(DEFAULT_SOCKET_NAME);
    }
    PathBuf::from(DEFAULT_SOCKET_NAME)
}

pub const RESPONSE_COMMAND: &str = "response";
pub const ERROR_COMMAND: &str = "error";

/// One IPC message. Envelopes are serialized as single-line JSON; the
/// newline is the message frame, so a reader always yields exactly one
/// complete envelope per line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: String,
}

impl Envelope {
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
            timestamp: clock::rfc3339_now(),
        }
    }

    pub fn response(data: Value) -> Self {
        Self::new(RESPONSE_COMMAND, data)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR_COMMAND, json!({ "message": message.into() }))
    }

    pub fn is_error(&self) -> bool {
        self.command == ERROR_COMMAND
    }

    pub fn to_line(&self) -> CoreResult<String> {
        let mut encoded = serde_json::to_string(self).map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("failed to encode IPC envelope: {error}"),
            )
        })?;
        encoded.push('\n');
        Ok(encoded)
    }

    pub fn from_line(line: &str) -> CoreResult<Self> {
        serde_json::from_str(line).map_err(|error| {
            CoreError::new(
                CoreErrorKind::ParseFailure,
                format!("malformed IPC envelope: {error}"),
            )
        })
    }
}
