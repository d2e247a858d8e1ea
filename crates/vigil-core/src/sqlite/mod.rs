pub mod migrations;
pub mod store;

pub use migrations::{SqliteMigration, current_schema_version, migrations};
pub use store::SqliteSettingsStore;
