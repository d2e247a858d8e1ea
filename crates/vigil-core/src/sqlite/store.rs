use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::settings::{
    DEFAULT_AFTERNOON_CHECK, DEFAULT_AUTO_CHECK, DEFAULT_INCLUDE_PINNED, DEFAULT_INCLUDE_UNKNOWN,
    DEFAULT_MORNING_CHECK, DEFAULT_NOTIFY_ON_UPDATES, SettingsStore,
};
use crate::sqlite::migrations::migrations;

const MIGRATIONS_TABLE: &str = "vigil_schema_migrations";

const KEY_MORNING_CHECK: &str = "morning_check";
const KEY_AFTERNOON_CHECK: &str = "afternoon_check";
const KEY_NOTIFY_ON_UPDATES: &str = "notify_on_updates";
const KEY_AUTO_CHECK: &str = "auto_check";
const KEY_INCLUDE_PINNED: &str = "include_pinned";
const KEY_INCLUDE_UNKNOWN: &str = "include_unknown";
const KEY_LAST_CHECK: &str = "last_check";

/// [`SettingsStore`] backed by a sqlite file.
///
/// Every operation opens its own connection; the settings table sees a
/// handful of statements per check cycle, so connection reuse buys nothing
/// over the simplicity of a fresh handle. A missing key is seeded with its
/// default on first read, which migrates stores written by older builds.
pub struct SqliteSettingsStore {
    database_path: PathBuf,
}

impl SqliteSettingsStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn migrate_to_latest(&self) -> CoreResult<()> {
        self.with_connection("migrate_to_latest", |connection| {
            apply_pending_migrations(connection)
        })
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> CoreResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }

    fn get_or_seed(&self, key: &'static str, default: &str) -> CoreResult<String> {
        self.with_connection(key, |connection| {
            apply_pending_migrations(connection)?;

            let existing: Option<String> = connection
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(value) => Ok(value),
                None => {
                    connection.execute(
                        "INSERT OR IGNORE INTO settings (key, value, updated_at_unix)
                         VALUES (?1, ?2, strftime('%s', 'now'))",
                        params![key, default],
                    )?;
                    Ok(default.to_string())
                }
            }
        })
    }

    fn put(&self, key: &'static str, value: &str) -> CoreResult<()> {
        self.with_connection(key, |connection| {
            apply_pending_migrations(connection)?;

            connection.execute(
                "INSERT INTO settings (key, value, updated_at_unix)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at_unix = excluded.updated_at_unix",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn get_bool(&self, key: &'static str, default: bool) -> CoreResult<bool> {
        let value = self.get_or_seed(key, bool_to_str(default))?;
        Ok(value.eq_ignore_ascii_case("true"))
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn morning_check(&self) -> CoreResult<String> {
        self.get_or_seed(KEY_MORNING_CHECK, DEFAULT_MORNING_CHECK)
    }

    fn set_morning_check(&self, value: &str) -> CoreResult<()> {
        self.put(KEY_MORNING_CHECK, value)
    }

    fn afternoon_check(&self) -> CoreResult<String> {
        self.get_or_seed(KEY_AFTERNOON_CHECK, DEFAULT_AFTERNOON_CHECK)
    }

    fn set_afternoon_check(&self, value: &str) -> CoreResult<()> {
        self.put(KEY_AFTERNOON_CHECK, value)
    }

    fn notify_on_updates(&self) -> CoreResult<bool> {
        self.get_bool(KEY_NOTIFY_ON_UPDATES, DEFAULT_NOTIFY_ON_UPDATES)
    }

    fn set_notify_on_updates(&self, value: bool) -> CoreResult<()> {
        self.put(KEY_NOTIFY_ON_UPDATES, bool_to_str(value))
    }

    fn auto_check(&self) -> CoreResult<bool> {
        self.get_bool(KEY_AUTO_CHECK, DEFAULT_AUTO_CHECK)
    }

    fn set_auto_check(&self, value: bool) -> CoreResult<()> {
        self.put(KEY_AUTO_CHECK, bool_to_str(value))
    }

    fn include_pinned(&self) -> CoreResult<bool> {
        self.get_bool(KEY_INCLUDE_PINNED, DEFAULT_INCLUDE_PINNED)
    }

    fn set_include_pinned(&self, value: bool) -> CoreResult<()> {
        self.put(KEY_INCLUDE_PINNED, bool_to_str(value))
    }

    fn include_unknown(&self) -> CoreResult<bool> {
        self.get_bool(KEY_INCLUDE_UNKNOWN, DEFAULT_INCLUDE_UNKNOWN)
    }

    fn set_include_unknown(&self, value: bool) -> CoreResult<()> {
        self.put(KEY_INCLUDE_UNKNOWN, bool_to_str(value))
    }

    fn last_check(&self) -> CoreResult<Option<String>> {
        let value = self.get_or_seed(KEY_LAST_CHECK, "")?;
        if value.is_empty() { Ok(None) } else { Ok(Some(value)) }
    }

    fn set_last_check(&self, value: &str) -> CoreResult<()> {
        self.put(KEY_LAST_CHECK, value)
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    let connection = Connection::open(database_path)?;
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "busy_timeout", 5000)?;
    Ok(connection)
}

fn apply_pending_migrations(connection: &mut Connection) -> rusqlite::Result<()> {
    connection.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at_unix INTEGER NOT NULL
            )"
        ),
        [],
    )?;

    let current_version: i64 = connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )?;

    for migration in migrations() {
        if migration.version <= current_version {
            continue;
        }
        let transaction = connection.transaction()?;
        transaction.execute_batch(migration.up_sql)?;
        transaction.execute(
            &format!(
                "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
                 VALUES (?1, ?2, strftime('%s', 'now'))"
            ),
            params![migration.version, migration.name],
        )?;
        transaction.commit()?;
    }

    Ok(())
}

fn bool_to_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn storage_error(operation_name: &str, error: rusqlite::Error) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("settings operation '{operation_name}' failed: {error}"),
    )
}
