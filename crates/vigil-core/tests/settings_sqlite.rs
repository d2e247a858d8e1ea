use vigil_core::settings::SettingsStore;
use vigil_core::sqlite::{SqliteSettingsStore, current_schema_version};

fn temp_store(dir: &tempfile::TempDir) -> SqliteSettingsStore {
    SqliteSettingsStore::new(dir.path().join("settings.db"))
}

#[test]
fn missing_keys_are_seeded_with_defaults_on_first_read() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = temp_store(&dir);
    store.migrate_to_latest().expect("migrations applied");

    assert_eq!(store.morning_check().unwrap(), "08:00");
    assert_eq!(store.afternoon_check().unwrap(), "16:00");
    assert!(store.notify_on_updates().unwrap());
    assert!(store.auto_check().unwrap());
    assert!(!store.include_pinned().unwrap());
    assert!(!store.include_unknown().unwrap());
    assert!(store.last_check().unwrap().is_none());
}

#[test]
fn values_survive_reopening_the_store() {
    let dir = tempfile::tempdir().expect("temp dir");

    {
        let store = temp_store(&dir);
        store.set_morning_check("07:45").unwrap();
        store.set_auto_check(false).unwrap();
        store.set_include_pinned(true).unwrap();
        store.set_last_check("2026-08-04T08:00:00Z").unwrap();
    }

    let reopened = temp_store(&dir);
    assert_eq!(reopened.morning_check().unwrap(), "07:45");
    assert!(!reopened.auto_check().unwrap());
    assert!(reopened.include_pinned().unwrap());
    assert_eq!(
        reopened.last_check().unwrap().as_deref(),
        Some("2026-08-04T08:00:00Z")
    );
}

#[test]
fn snapshot_composes_every_key() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = temp_store(&dir);
    store.set_afternoon_check("17:30").unwrap();

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.morning_check, "08:00");
    assert_eq!(snapshot.afternoon_check, "17:30");
    assert!(snapshot.notify_on_updates);
    assert!(snapshot.last_check.is_none());
}

#[test]
fn migrations_are_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = temp_store(&dir);

    store.migrate_to_latest().expect("first run");
    store.migrate_to_latest().expect("second run");
    assert!(current_schema_version() >= 1);
    assert_eq!(store.morning_check().unwrap(), "08:00");
}

#[test]
fn unwritable_path_surfaces_a_storage_failure() {
    let store = SqliteSettingsStore::new("/nonexistent-root/vigil/settings.db");
    let error = store.migrate_to_latest().expect_err("no such directory");
    assert_eq!(error.kind, vigil_core::models::CoreErrorKind::StorageFailure);
}
