use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub const DEFAULT_MORNING_CHECK: &str = "08:00";
pub const DEFAULT_AFTERNOON_CHECK: &str = "16:00";
pub const DEFAULT_NOTIFY_ON_UPDATES: bool = true;
pub const DEFAULT_AUTO_CHECK: bool = true;
pub const DEFAULT_INCLUDE_PINNED: bool = false;
pub const DEFAULT_INCLUDE_UNKNOWN: bool = false;

/// Full settings snapshot as exposed over IPC.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub morning_check: String,
    pub afternoon_check: String,
    pub notify_on_updates: bool,
    pub auto_check: bool,
    pub include_pinned: bool,
    pub include_unknown: bool,
    pub last_check: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            morning_check: DEFAULT_MORNING_CHECK.to_string(),
            afternoon_check: DEFAULT_AFTERNOON_CHECK.to_string(),
            notify_on_updates: DEFAULT_NOTIFY_ON_UPDATES,
            auto_check: DEFAULT_AUTO_CHECK,
            include_pinned: DEFAULT_INCLUDE_PINNED,
            include_unknown: DEFAULT_INCLUDE_UNKNOWN,
            last_check: None,
        }
    }
}

/// Validates an `HH:MM` check-time string before it is persisted.
pub fn validate_check_time(value: &str) -> CoreResult<()> {
    let invalid = || {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("check time must be HH:MM, got '{value}'"),
        )
    };

    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }

    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(())
}

/// Persistent configuration collaborator for the engine, scheduler, and IPC
/// handlers. Getters apply built-in defaults for missing keys and write the
/// default back, so a store created by an older build picks up new keys on
/// first read.
pub trait SettingsStore: Send + Sync {
    fn morning_check(&self) -> CoreResult<String>;
    fn set_morning_check(&self, value: &str) -> CoreResult<()>;

    fn afternoon_check(&self) -> CoreResult<String>;
    fn set_afternoon_check(&self, value: &str) -> CoreResult<()>;

    fn notify_on_updates(&self) -> CoreResult<bool>;
    fn set_notify_on_updates(&self, value: bool) -> CoreResult<()>;

    fn auto_check(&self) -> CoreResult<bool>;
    fn set_auto_check(&self, value: bool) -> CoreResult<()>;

    fn include_pinned(&self) -> CoreResult<bool>;
    fn set_include_pinned(&self, value: bool) -> CoreResult<()>;

    fn include_unknown(&self) -> CoreResult<bool>;
    fn set_include_unknown(&self, value: bool) -> CoreResult<()>;

    fn last_check(&self) -> CoreResult<Option<String>>;
    fn set_last_check(&self, value: &str) -> CoreResult<()>;

    fn snapshot(&self) -> CoreResult<Settings> {
        Ok(Settings {
            morning_check: self.morning_check()?,
            afternoon_check: self.afternoon_check()?,
            notify_on_updates: self.notify_on_updates()?,
            auto_check: self.auto_check()?,
            include_pinned: self.include_pinned()?,
            include_unknown: self.include_unknown()?,
            last_check: self.last_check()?,
        })
    }
}

/// Settings held in process memory only; the store for tests and for runs
/// where the sqlite file cannot be opened.
#[derive(Default)]
pub struct InMemorySettingsStore {
    inner: Mutex<Settings>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }

    fn read<T>(&self, accessor: impl FnOnce(&Settings) -> T) -> CoreResult<T> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| CoreError::new(CoreErrorKind::Internal, "settings lock poisoned"))?;
        Ok(accessor(&guard))
    }

    fn write(&self, mutator: impl FnOnce(&mut Settings)) -> CoreResult<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| CoreError::new(CoreErrorKind::Internal, "settings lock poisoned"))?;
        mutator(&mut guard);
        Ok(())
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn morning_check(&self) -> CoreResult<String> {
        self.read(|settings| settings.morning_check.clone())
    }

    fn set_morning_check(&self, value: &str) -> CoreResult<()> {
        self.write(|settings| settings.morning_check = value.to_string())
    }

    fn afternoon_check(&self) -> CoreResult<String> {
        self.read(|settings| settings.afternoon_check.clone())
    }

    fn set_afternoon_check(&self, value: &str) -> CoreResult<()> {
        self.write(|settings| settings.afternoon_check = value.to_string())
    }

    fn notify_on_updates(&self) -> CoreResult<bool> {
        self.read(|settings| settings.notify_on_updates)
    }

    fn set_notify_on_updates(&self, value: bool) -> CoreResult<()> {
        self.write(|settings| settings.notify_on_updates = value)
    }

    fn auto_check(&self) -> CoreResult<bool> {
        self.read(|settings| settings.auto_check)
    }

    fn set_auto_check(&self, value: bool) -> CoreResult<()> {
        self.write(|settings| settings.auto_check = value)
    }

    fn include_pinned(&self) -> CoreResult<bool> {
        self.read(|settings| settings.include_pinned)
    }

    fn set_include_pinned(&self, value: bool) -> CoreResult<()> {
        self.write(|settings| settings.include_pinned = value)
    }

    fn include_unknown(&self) -> CoreResult<bool> {
        self.read(|settings| settings.include_unknown)
    }

    fn set_include_unknown(&self, value: bool) -> CoreResult<()> {
        self.write(|settings| settings.include_unknown = value)
    }

    fn last_check(&self) -> CoreResult<Option<String>> {
        self.read(|settings| settings.last_check.clone())
    }

    fn set_last_check(&self, value: &str) -> CoreResult<()> {
        self.write(|settings| settings.last_check = Some(value.to_string()))
    }
}
