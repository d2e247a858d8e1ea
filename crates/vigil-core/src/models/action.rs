/// External winget invocation a failure or spawn request is attributed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CliAction {
    CheckUpdates,
    PinList,
    UpgradeAll,
}

impl CliAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckUpdates => "check-updates",
            Self::PinList => "pin-list",
            Self::UpgradeAll => "upgrade-all",
        }
    }
}
