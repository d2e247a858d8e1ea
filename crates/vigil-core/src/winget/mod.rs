use std::time::Duration;

use crate::execution::{CommandSpec, SpawnRequest};
use crate::models::{CliAction, CoreResult};

pub mod json;
pub mod pins;
pub mod process;
pub mod text;

pub use process::ProcessWingetSource;

const WINGET_COMMAND: &str = "winget";

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(90);
const PIN_LIST_TIMEOUT: Duration = Duration::from_secs(30);
const UPGRADE_ALL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Structured-output command variants, attempted in declaration order.
///
/// winget's `--format json` support differs across releases; the first
/// variant that both exits zero and decodes wins, everything after it is
/// skipped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UpdateJsonVariant {
    /// Full flag set plus `--format json`.
    IncludeAll,
    /// Bare `winget update --format json`.
    Plain,
    /// Some releases only accept the `upgrade` alias.
    UpgradeAlias,
    /// Full flag set scoped to the winget source.
    SourceScoped,
}

impl UpdateJsonVariant {
    pub const ALL: [UpdateJsonVariant; 4] = [
        UpdateJsonVariant::IncludeAll,
        UpdateJsonVariant::Plain,
        UpdateJsonVariant::UpgradeAlias,
        UpdateJsonVariant::SourceScoped,
    ];
}

/// Blocking access to the winget CLI, seamed for tests.
pub trait WingetSource: Send + Sync {
    fn update_json(&self, variant: UpdateJsonVariant) -> CoreResult<String>;

    fn update_text(&self) -> CoreResult<String>;

    fn pin_list(&self) -> CoreResult<String>;

    fn upgrade_all(&self) -> CoreResult<String>;
}

pub fn winget_update_json_request(
    variant: UpdateJsonVariant,
    timeout: Duration,
) -> SpawnRequest {
    let command = match variant {
        UpdateJsonVariant::IncludeAll => CommandSpec::new(WINGET_COMMAND).args([
            "update",
            "--include-unknown",
            "--include-pinned",
            "--accept-source-agreements",
            "--format",
            "json",
        ]),
        UpdateJsonVariant::Plain => {
            CommandSpec::new(WINGET_COMMAND).args(["update", "--format", "json"])
        }
        UpdateJsonVariant::UpgradeAlias => {
            CommandSpec::new(WINGET_COMMAND).args(["upgrade", "--format", "json"])
        }
        UpdateJsonVariant::SourceScoped => CommandSpec::new(WINGET_COMMAND).args([
            "update",
            "--accept-source-agreements",
            "--include-unknown",
            "--include-pinned",
            "--source",
            "winget",
            "--format",
            "json",
        ]),
    };

    SpawnRequest::new(CliAction::CheckUpdates, command).timeout(timeout)
}

pub fn winget_update_text_request(timeout: Duration) -> SpawnRequest {
    SpawnRequest::new(
        CliAction::CheckUpdates,
        CommandSpec::new(WINGET_COMMAND).args([
            "update",
            "--include-unknown",
            "--include-pinned",
            "--accept-source-agreements",
        ]),
    )
    .timeout(timeout)
}

pub fn winget_pin_list_request() -> SpawnRequest {
    SpawnRequest::new(
        CliAction::PinList,
        CommandSpec::new(WINGET_COMMAND).args(["pin", "list"]),
    )
    .timeout(PIN_LIST_TIMEOUT)
}

pub fn winget_upgrade_all_request() -> SpawnRequest {
    SpawnRequest::new(
        CliAction::UpgradeAll,
        CommandSpec::new(WINGET_COMMAND).args([
            "upgrade",
            "--all",
            "--accept-source-agreements",
            "--disable-interactivity",
        ]),
    )
    .timeout(UPGRADE_ALL_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::models::CliAction;

    use super::{
        UpdateJsonVariant, winget_pin_list_request, winget_update_json_request,
        winget_update_text_request, winget_upgrade_all_request,
    };

    #[test]
    fn text_request_uses_canonical_flag_set() {
        let request = winget_update_text_request(Duration::from_secs(90));
        assert_eq!(request.action, CliAction::CheckUpdates);
        assert_eq!(request.command.program, PathBuf::from("winget"));
        assert_eq!(
            request.command.args,
            vec![
                "update",
                "--include-unknown",
                "--include-pinned",
                "--accept-source-agreements",
            ]
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn every_json_variant_requests_json_format() {
        for variant in UpdateJsonVariant::ALL {
            let request = winget_update_json_request(variant, Duration::from_secs(90));
            assert_eq!(request.action, CliAction::CheckUpdates);
            let args = &request.command.args;
            assert_eq!(args[args.len() - 2], "--format");
            assert_eq!(args[args.len() - 1], "json");
        }
    }

    #[test]
    fn upgrade_alias_variant_uses_upgrade_verb() {
        let request =
            winget_update_json_request(UpdateJsonVariant::UpgradeAlias, Duration::from_secs(90));
        assert_eq!(request.command.args[0], "upgrade");
    }

    #[test]
    fn pin_list_request_is_bounded() {
        let request = winget_pin_list_request();
        assert_eq!(request.action, CliAction::PinList);
        assert_eq!(request.command.args, vec!["pin", "list"]);
        assert!(request.timeout.is_some());
    }

    #[test]
    fn upgrade_all_request_disables_interactivity() {
        let request = winget_upgrade_all_request();
        assert_eq!(request.action, CliAction::UpgradeAll);
        assert_eq!(
            request.command.args,
            vec![
                "upgrade",
                "--all",
                "--accept-source-agreements",
                "--disable-interactivity",
            ]
        );
    }
}
