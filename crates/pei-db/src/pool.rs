//! Connection pool, database bootstrap and migrations for `pei db-init`.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/pei-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by the application, in the order `pei db-init` reports them.
pub const APP_TABLES: [&str; 3] = ["peis", "activities", "rag_files"];

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool for the CLI and the assistant.
///
/// A single editing session issues at most a handful of concurrent queries
/// (autosave plus one per background AI request), so the pool stays small.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Apply every embedded migration not yet recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!(tables = ?APP_TABLES, "PEI schema is up to date");
    Ok(())
}

/// Reject names that cannot be spliced into `CREATE DATABASE` verbatim.
///
/// Postgres takes no bind parameters in DDL, so the statement is built by
/// formatting; only ASCII letters, digits and `_` are allowed through.
fn checked_database_name(name: &str) -> Result<&str> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("database name {name:?} contains invalid characters");
    }
    Ok(name)
}

/// Create the configured database through the `postgres` maintenance
/// database when it does not exist yet.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    let maintenance_url = config.maintenance_url();

    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = db_name, "PEI database already exists");
    } else {
        let db_name = checked_database_name(db_name)?;
        maint_pool
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "PEI database created");
    }

    maint_pool.close().await;
    Ok(())
}

/// Row counts for [`APP_TABLES`], shown after `pei db-init`.
///
/// The table names are constants, so formatting them into the query is safe.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(APP_TABLES.len());
    for table in APP_TABLES {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table.to_string(), count));
    }
    Ok(counts)
}
