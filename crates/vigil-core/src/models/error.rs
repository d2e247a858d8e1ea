use thiserror::Error;

use crate::models::CliAction;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    ProcessFailure,
    ParseFailure,
    Timeout,
    InvalidInput,
    StorageFailure,
    Transport,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub action: Option<CliAction>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            action: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_action(mut self, action: CliAction) -> Self {
        self.action = Some(action);
        self
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
