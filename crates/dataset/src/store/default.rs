//! Shared `DatasetStore` implementation for the Postgres and SQLite stores.
//!
//! The struct must expose `executor: sqlx::Pool<DB>` and a `QUERIES` constant:
//!
//! ```ignore
//! pub struct MyStore {
//!     pub executor: sqlx::Pool<sqlx::Sqlite>,
//! }
//!
//! impl MyStore {
//!     pub const QUERIES: StoreQueries = StoreQueries { .. };
//! }
//!
//! implement_store!(MyStore, sqlx::Sqlite);
//! ```

/// Statements that differ between backends.
pub struct StoreQueries {
    /// Column names of a table in declaration order. One bind: the table name.
    pub list_columns: &'static str,
    /// Most bind parameters a single statement may carry.
    pub max_bind_params: usize,
}

#[macro_export]
macro_rules! implement_store {
    ($store: ident, $db: ty) => {
impl $store {
    async fn list_columns(
        conn: &mut <$db as sqlx::Database>::Connection,
        table: &str,
    ) -> std::result::Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<$db, String>($store::QUERIES.list_columns)
            .bind(table)
            .fetch_all(&mut *conn)
            .await
    }

    async fn bump_version(
        conn: &mut <$db as sqlx::Database>::Connection,
    ) -> std::result::Result<i64, sqlx::Error> {
        sqlx::query::<$db>($crate::version::CREATE_META_TABLE)
            .execute(&mut *conn)
            .await?;
        sqlx::query_scalar::<$db, i64>($crate::version::BUMP_VERSION)
            .bind($crate::version::now_epoch())
            .fetch_one(&mut *conn)
            .await
    }
}

#[async_trait::async_trait]
impl $crate::store::DatasetStore for $store {
    async fn replace_all(
        &self,
        records: Vec<$crate::record::Record>,
    ) -> $crate::error::Result<i64> {
        if records.is_empty() {
            return Err($crate::error::DatasetError::invalid($crate::pipeline::NO_ROWS));
        }

        let columns = $crate::store::record_columns(&records);
        let per_row = columns.len() + 2;
        let chunk_rows = ($store::QUERIES.max_bind_params / per_row).max(1);
        let prefix = $crate::store::insert_prefix(&columns);

        let mut tx = self.executor.begin().await?;
        sqlx::query::<$db>(&format!("DROP TABLE IF EXISTS {}", $crate::store::DATASET_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query::<$db>(&$crate::store::create_table_sql(&columns))
            .execute(&mut *tx)
            .await?;

        for (chunk_index, chunk) in records.chunks(chunk_rows).enumerate() {
            let start = chunk_index * chunk_rows;
            let mut builder: sqlx::QueryBuilder<$db> = sqlx::QueryBuilder::new(&prefix);
            builder.push_values(chunk.iter().enumerate(), |mut row, (i, record)| {
                row.push_bind((start + i) as i64);
                row.push_bind(record.id.as_str().to_string());
                for column in &columns {
                    row.push_bind(record.cells.get(column).cloned().flatten());
                }
            });
            builder.build().execute(&mut *tx).await?;
        }

        let version = Self::bump_version(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            rows = records.len(),
            columns = columns.len(),
            version,
            "dataset replaced"
        );
        Ok(version)
    }

    async fn paginated_read(
        &self,
        request: $crate::store::PageRequest,
    ) -> $crate::error::Result<$crate::store::Page> {
        let mut tx = self.executor.begin().await?;

        let stored = Self::list_columns(&mut *tx, $crate::store::DATASET_TABLE).await?;
        if stored.is_empty() {
            return Ok($crate::store::Page::empty(request));
        }

        let total: i64 = sqlx::query_scalar::<$db, i64>(&format!(
            "SELECT COUNT(*) FROM {}",
            $crate::store::DATASET_TABLE
        ))
        .fetch_one(&mut *tx)
        .await?;
        if total == 0 {
            return Ok($crate::store::Page::empty(request));
        }

        let columns = $crate::store::known_columns(&stored);
        let sql = $crate::store::select_page_sql(&columns);
        let rows = sqlx::query::<$db>(&sql)
            .bind(request.page_size as i64)
            .bind(request.offset())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = sqlx::Row::try_get(&row, 0)?;
            let mut record = $crate::record::Record::new($crate::record::RowId::from_stored(id));
            for (i, column) in columns.iter().enumerate() {
                let cell: Option<String> = sqlx::Row::try_get(&row, i + 1)?;
                record.cells.insert(*column, cell);
            }
            records.push(record);
        }

        let mut names: Vec<String> = columns.iter().map(|c| c.as_str().to_string()).collect();
        names.push($crate::columns::ROW_ID_COLUMN.to_string());

        Ok($crate::store::Page {
            columns: names,
            rows: records,
            page: request.page,
            page_size: request.page_size,
            total,
        })
    }

    async fn patch_row(
        &self,
        id: &$crate::record::RowId,
        changes: $crate::store::Changes,
    ) -> $crate::error::Result<i64> {
        use $crate::error::DatasetError;

        if changes.is_empty() {
            return Err(DatasetError::invalid($crate::store::NOTHING_TO_UPDATE));
        }

        let mut tx = self.executor.begin().await?;

        let stored = Self::list_columns(&mut *tx, $crate::store::DATASET_TABLE).await?;
        if stored.is_empty() {
            return Err(DatasetError::not_found($crate::store::ROW_NOT_FOUND));
        }
        let applicable: Vec<($crate::columns::Column, $crate::table::Cell)> = changes
            .into_iter()
            .filter(|(column, _)| stored.iter().any(|s| s == column.as_str()))
            .collect();
        if applicable.is_empty() {
            return Err(DatasetError::invalid($crate::store::NOTHING_TO_UPDATE));
        }

        let columns: Vec<$crate::columns::Column> = applicable.iter().map(|(c, _)| *c).collect();
        let sql = $crate::store::update_row_sql(&columns);
        let mut query = sqlx::query::<$db>(&sql);
        for (_, value) in applicable {
            query = query.bind(value);
        }
        let result = query
            .bind(id.as_str().to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatasetError::not_found($crate::store::ROW_NOT_FOUND));
        }

        let version = Self::bump_version(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(id = %id, columns = columns.len(), version, "row patched");
        Ok(version)
    }

    async fn touch_version(&self) -> $crate::error::Result<i64> {
        let mut tx = self.executor.begin().await?;
        let version = Self::bump_version(&mut *tx).await?;
        tx.commit().await?;
        Ok(version)
    }

    async fn version(&self) -> $crate::error::Result<i64> {
        let mut tx = self.executor.begin().await?;
        let meta = Self::list_columns(&mut *tx, $crate::version::META_TABLE).await?;
        if meta.is_empty() {
            return Ok(0);
        }
        let version: Option<i64> = sqlx::query_scalar::<$db, i64>($crate::version::READ_VERSION)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(version.unwrap_or(0))
    }
}
    };
}
