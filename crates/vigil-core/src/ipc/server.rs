use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ipc::Envelope;
use crate::models::{CoreError, CoreErrorKind, CoreResult};

/// Command handlers may block (they typically drive the engine through the
/// winget CLI), so the server dispatches each one on a blocking thread.
pub type CommandHandler = Arc<dyn Fn(Value) -> CoreResult<Value> + Send + Sync>;

/// Message-oriented IPC server over a unix domain socket.
///
/// One client is served at a time; when it disconnects the accept loop takes
/// the next one. Handler failures and unknown commands become `error`
/// envelopes on the wire, never a dropped connection, and nothing short of
/// the shutdown signal stops the loop.
pub struct IpcServer {
    socket_path: PathBuf,
    handlers: HashMap<String, CommandHandler>,
}

impl IpcServer {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn register_handler(
        &mut self,
        command: impl Into<String>,
        handler: impl Fn(Value) -> CoreResult<Value> + Send + Sync + 'static,
    ) {
        self.handlers.insert(command.into(), Arc::new(handler));
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> CoreResult<()> {
        if let Some(parent) = self.socket_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        // A stale socket file from an unclean shutdown blocks the bind.
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path).map_err(|error| {
            CoreError::new(
                CoreErrorKind::Transport,
                format!(
                    "failed to bind IPC socket {}: {error}",
                    self.socket_path.display()
                ),
            )
        })?;
        info!(path = %self.socket_path.display(), "IPC server listening");

        let handlers = Arc::new(self.handlers);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!("IPC client connected");
                        // The session gets its own receiver so observing the
                        // signal there does not consume the accept loop's.
                        if let Err(session_error) =
                            serve_connection(stream, &handlers, shutdown.clone()).await
                        {
                            debug!(%session_error, "IPC client session ended");
                        }
                    }
                    Err(accept_error) => {
                        error!(%accept_error, "failed to accept IPC client");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        info!("IPC server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: UnixStream,
    handlers: &Arc<HashMap<String, CommandHandler>>,
    mut shutdown: watch::Receiver<bool>,
) -> CoreResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let request = match Envelope::from_line(&line) {
                    Ok(request) => request,
                    Err(decode_error) => {
                        warn!(%decode_error, "discarding malformed IPC message");
                        continue;
                    }
                };

                debug!(command = %request.command, "received IPC command");
                let response = dispatch(handlers, request).await;
                let encoded = response.to_line()?;
                writer.write_all(encoded.as_bytes()).await.map_err(|error| {
                    CoreError::new(
                        CoreErrorKind::Transport,
                        format!("failed to write IPC response: {error}"),
                    )
                })?;
            }
            Ok(None) => {
                debug!("IPC client disconnected");
                return Ok(());
            }
            Err(read_error) => {
                return Err(CoreError::new(
                    CoreErrorKind::Transport,
                    format!("failed to read IPC request: {read_error}"),
                ));
            }
        }
    }
}

async fn dispatch(handlers: &Arc<HashMap<String, CommandHandler>>, request: Envelope) -> Envelope {
    let Some(handler) = handlers.get(&request.command).cloned() else {
        return Envelope::error(format!("unknown command: {}", request.command));
    };

    let command = request.command;
    let data = request.data;
    match tokio::task::spawn_blocking(move || handler(data)).await {
        Ok(Ok(result)) => Envelope::response(result),
        Ok(Err(handler_error)) => {
            error!(command = %command, %handler_error, "command handler failed");
            Envelope::error(handler_error.to_string())
        }
        Err(join_error) => {
            error!(command = %command, %join_error, "command handler panicked");
            Envelope::error("internal handler failure")
        }
    }
}
