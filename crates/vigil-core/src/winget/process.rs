use std::sync::Arc;
use std::time::Duration;

use crate::execution::{ProcessExecutor, ProcessExitStatus, ProcessOutput, SpawnRequest, spawn_validated};
use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::winget::{
    DEFAULT_CHECK_TIMEOUT, UpdateJsonVariant, WingetSource, winget_pin_list_request,
    winget_update_json_request, winget_update_text_request, winget_upgrade_all_request,
};

/// [`WingetSource`] that shells out through a [`ProcessExecutor`].
///
/// Methods block the calling thread for the duration of the subprocess, so
/// callers inside a runtime must hop through `spawn_blocking` first.
pub struct ProcessWingetSource {
    executor: Arc<dyn ProcessExecutor>,
    check_timeout: Duration,
}

impl ProcessWingetSource {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            executor,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }
}

impl WingetSource for ProcessWingetSource {
    fn update_json(&self, variant: UpdateJsonVariant) -> CoreResult<String> {
        run_and_collect_stdout(
            self.executor.as_ref(),
            winget_update_json_request(variant, self.check_timeout),
        )
    }

    fn update_text(&self) -> CoreResult<String> {
        run_and_collect_stdout(
            self.executor.as_ref(),
            winget_update_text_request(self.check_timeout),
        )
    }

    fn pin_list(&self) -> CoreResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), winget_pin_list_request())
    }

    fn upgrade_all(&self) -> CoreResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), winget_upgrade_all_request())
    }
}

fn run_and_collect_stdout(
    executor: &dyn ProcessExecutor,
    request: SpawnRequest,
) -> CoreResult<String> {
    let action = request.action;

    let process = spawn_validated(executor, request)?;

    let handle = tokio::runtime::Handle::current();
    let output: ProcessOutput = handle.block_on(process.wait())?;

    match output.status {
        ProcessExitStatus::ExitCode(0) => String::from_utf8(output.stdout).map_err(|error| {
            CoreError::new(
                CoreErrorKind::ParseFailure,
                format!("process stdout is not valid UTF-8: {error}"),
            )
            .with_action(action)
        }),
        ProcessExitStatus::ExitCode(code) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CoreError::new(
                CoreErrorKind::ProcessFailure,
                format!(
                    "winget {} exited with code {code}: {stderr}",
                    action.as_str()
                ),
            )
            .with_action(action))
        }
        ProcessExitStatus::Terminated => Err(CoreError::new(
            CoreErrorKind::ProcessFailure,
            format!("winget {} was terminated by signal", action.as_str()),
        )
        .with_action(action)),
    }
}
