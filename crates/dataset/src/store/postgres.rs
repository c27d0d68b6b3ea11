use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use super::default::StoreQueries;
use crate::implement_store;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pub executor: PgPool,
}

impl PostgresStore {
    pub const QUERIES: StoreQueries = StoreQueries {
        list_columns: r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
        max_bind_params: 65_535,
    };

    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(executor: PgPool) -> Self {
        Self { executor }
    }
}

implement_store!(PostgresStore, Postgres);
