use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Source tag applied to records when the package manager does not report one.
pub const WINGET_SOURCE: &str = "winget";

/// One installable upgrade as reported by winget.
///
/// Version strings are opaque: winget mixes semantic versions, dates, and
/// vendor build tags, so they are carried verbatim and only gated by the
/// comparability heuristic before a record is admitted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub name: String,
    pub id: String,
    pub current_version: String,
    pub available_version: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    WINGET_SOURCE.to_string()
}

/// Parser output before filter policy is applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawUpdate {
    pub name: String,
    pub id: String,
    pub current_version: String,
    pub available_version: String,
    pub source: Option<String>,
}

impl RawUpdate {
    pub fn into_record(self) -> UpdateRecord {
        UpdateRecord {
            name: self.name,
            id: self.id,
            current_version: self.current_version,
            available_version: self.available_version,
            source: self.source.unwrap_or_else(default_source),
        }
    }
}

/// Consistent copy of the engine state handed to readers.
///
/// Readers get either the result of the previous completed check or the next
/// one, never a half-written list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckSnapshot {
    pub updates: Vec<UpdateRecord>,
    pub count: usize,
    pub last_check: Option<OffsetDateTime>,
    pub is_checking: bool,
}
