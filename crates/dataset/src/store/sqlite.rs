use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};

use super::default::StoreQueries;
use crate::implement_store;

/// SQLite-backed store, for local runs without a Postgres server.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub executor: SqlitePool,
}

impl SqliteStore {
    pub const QUERIES: StoreQueries = StoreQueries {
        list_columns: "SELECT name FROM pragma_table_info($1) ORDER BY cid",
        max_bind_params: 32_766,
    };

    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(dsn)?.create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        // Each in-memory connection sees its own database; keep exactly one alive.
        if dsn.contains(":memory:") || dsn.contains("mode=memory") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self { executor: pool })
    }

    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:", 1).await
    }
}

implement_store!(SqliteStore, Sqlite);
