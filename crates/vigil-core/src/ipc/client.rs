use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::UnixStream;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::ipc::Envelope;
use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Client side of the IPC channel.
///
/// Any transport failure drops the cached connection, so the next
/// `send_command` dials again; a front-end can outlive daemon restarts
/// without managing connection state itself.
pub struct IpcClient {
    socket_path: PathBuf,
    stream: Option<BufStream<UnixStream>>,
}

impl IpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            stream: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Dials the server, retrying until `timeout` elapses. The retry loop
    /// covers the window where the daemon is still starting up.
    pub async fn connect(&mut self, timeout: Duration) -> CoreResult<()> {
        let deadline = Instant::now() + timeout;

        loop {
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => {
                    self.stream = Some(BufStream::new(stream));
                    info!(path = %self.socket_path.display(), "connected to IPC server");
                    return Ok(());
                }
                Err(connect_error) => {
                    if Instant::now() + CONNECT_RETRY_DELAY >= deadline {
                        return Err(CoreError::new(
                            CoreErrorKind::Transport,
                            format!(
                                "timed out connecting to {}: {connect_error}",
                                self.socket_path.display()
                            ),
                        ));
                    }
                    debug!(%connect_error, "IPC server not ready, retrying");
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("disconnected from IPC server");
        }
    }

    /// Sends one command and blocks for its single response envelope.
    ///
    /// Returns `None` on any failure; the connection is cleared so the next
    /// call reconnects.
    pub async fn send_command(&mut self, command: &str, data: Value) -> Option<Envelope> {
        if self.stream.is_none()
            && let Err(connect_error) = self.connect(DEFAULT_CONNECT_TIMEOUT).await
        {
            error!(%connect_error, "failed to connect to IPC server");
            return None;
        }
        let stream = self.stream.as_mut()?;

        let request = Envelope::new(command, data);
        let encoded = match request.to_line() {
            Ok(encoded) => encoded,
            Err(encode_error) => {
                error!(%encode_error, "failed to encode IPC command");
                return None;
            }
        };

        let write_result = async {
            stream.write_all(encoded.as_bytes()).await?;
            stream.flush().await
        }
        .await;
        if let Err(write_error) = write_result {
            error!(%write_error, "IPC write failed");
            self.disconnect();
            return None;
        }

        let mut line = String::new();
        match stream.read_line(&mut line).await {
            Ok(0) => {
                debug!("IPC server closed the connection");
                self.disconnect();
                None
            }
            Ok(_) => match Envelope::from_line(line.trim_end()) {
                Ok(response) => Some(response),
                Err(decode_error) => {
                    error!(%decode_error, "failed to decode IPC response");
                    self.disconnect();
                    None
                }
            },
            Err(read_error) => {
                error!(%read_error, "IPC read failed");
                self.disconnect();
                None
            }
        }
    }
}
