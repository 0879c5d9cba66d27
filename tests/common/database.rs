//! Test database setup and management
#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Once;

static INIT_SYNC: Once = Once::new();

/// Initialize synchronous global state (argon2).
fn init_sync_globals() {
    INIT_SYNC.call_once(|| {
        formbin::session::init();
    });
}

/// Fresh in-memory SQLite database with the schema installed. Every
/// test gets its own store, so there is nothing to truncate between
/// tests.
pub async fn setup_test_database() -> DatabaseConnection {
    init_sync_globals();

    // A single connection keeps sqlx from opening a second, separate
    // in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory test database");

    formbin::db::install_schema(&db)
        .await
        .expect("Failed to install schema");

    db
}
