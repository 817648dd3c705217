//! PostgreSQL fixtures for the PEI integration tests.
//!
//! Every test binary shares one PostgreSQL server and every test gets a
//! fresh database on it, migrated to the current `peis` / `activities` /
//! `rag_files` schema, so tests never see each other's records.
//!
//! The server comes from one of two places:
//! - **`PEI_TEST_PG_URL`** set (CI or a local server): connect to it as is.
//! - **unset**: start a `postgres:16` container through testcontainers on
//!   first use and keep it for the lifetime of the test binary.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use pei_db::pool;

/// Environment variable naming an already running server.
pub const PG_URL_VAR: &str = "PEI_TEST_PG_URL";

/// Prefix of every temporary database, so stray ones are easy to spot.
const DB_PREFIX: &str = "pei_test_";

/// Container startup and first connections can be slow on loaded CI hosts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

struct SharedPg {
    /// Server URL without a database path.
    base_url: String,
    /// Dropping the handle stops the container. `None` for an external server.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn start_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var(PG_URL_VAR) {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped PostgreSQL port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server URL (no database name) of the shared PostgreSQL, started lazily.
pub async fn pg_url() -> &'static str {
    &SHARED_PG.get_or_init(start_shared_pg).await.base_url
}

async fn connect(url: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect(url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"))
}

/// Pool on the `postgres` database, used to create and drop test databases.
async fn maintenance_pool() -> PgPool {
    connect(&format!("{}/postgres", pg_url().await), 1).await
}

/// Create a uniquely named database holding the PEI schema.
///
/// Returns `(pool, db_name)`. Close the pool and pass `db_name` to
/// [`drop_test_db`] at the end of the test.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("{DB_PREFIX}{}", Uuid::new_v4().simple());

    let maint = maintenance_pool().await;
    maint
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create test database {db_name}: {e}"));
    maint.close().await;

    // Same size as the application pool so autosave and AI requests can
    // overlap the way they do in a real session.
    let pool = connect(&format!("{}/{db_name}", pg_url().await), 5).await;
    pool::run_migrations(&pool)
        .await
        .expect("PEI migrations should apply to an empty database");

    (pool, db_name)
}

/// Drop a database made by [`create_test_db`].
///
/// Connections a failed test left open are terminated first. Dropping a
/// database that is already gone is not an error.
pub async fn drop_test_db(db_name: &str) {
    assert!(db_name.starts_with(DB_PREFIX), "refusing to drop {db_name}");

    let maint = maintenance_pool().await;
    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint.execute(terminate.as_str()).await;
    let _ = maint
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maint.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[should_panic(expected = "refusing to drop pei")]
    async fn only_temporary_databases_can_be_dropped() {
        drop_test_db("pei").await;
    }
}
