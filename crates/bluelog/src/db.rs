//! Connection pool and schema management.

use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};

use crate::AppResult;
use crate::config::Config;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the pool described by `config`.
///
/// In-memory databases live as long as their single connection, so that
/// connection is never recycled.
pub async fn connect(config: &Config) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(log::LevelFilter::Warn, config.slow_query_threshold);

    let pool = if config.database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?
    };
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Drops every table, including the migration bookkeeping.
pub async fn drop_all(pool: &SqlitePool) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    for table in ["comment", "post", "category", "link", "admin", "_sqlx_migrations"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
