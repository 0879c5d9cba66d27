//! Process-global database pool and schema installation.

use crate::orm;
use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connect the global pool. Panics on failure; the application cannot
/// run without a store.
pub async fn init_db(database_url: String) {
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);

    let pool = Database::connect(options)
        .await
        .expect("Failed to connect to the database.");

    DB_POOL
        .set(pool)
        .expect("init_db() called more than once.");
}

pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("DB pool not initialized.")
}

/// Create every table from its entity definition, in dependency order.
/// Safe to run on an already-installed database.
pub async fn install_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(orm::users::Entity),
        schema.create_table_from_entity(orm::forms::Entity),
        schema.create_table_from_entity(orm::questions::Entity),
        schema.create_table_from_entity(orm::options::Entity),
        schema.create_table_from_entity(orm::responders::Entity),
        schema.create_table_from_entity(orm::responses::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}
