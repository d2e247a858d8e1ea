pub mod action;
pub mod error;
pub mod update;

pub use action::CliAction;
pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use update::{CheckSnapshot, RawUpdate, UpdateRecord, WINGET_SOURCE};
