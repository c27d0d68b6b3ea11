//! Persistence of the shared dataset (`dados_filtrados`) and its version.
//!
//! One table holds the current rows; `replace_all` swaps it wholesale and
//! `patch_row` edits a single row in place. Both bump the version in the same
//! transaction as the data change.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::columns::{normalize_label, Column, ROW_ID_COLUMN};
use crate::config::is_sqlite_url;
use crate::error::{DatasetError, Result};
use crate::record::{Record, RowId};
use crate::table::{cell_from_json, Cell};

pub mod default;
pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

pub const DATASET_TABLE: &str = "dados_filtrados";

/// Hidden insertion sequence used as the pagination order.
pub const SEQ_COLUMN: &str = "__seq";

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

pub const NOTHING_TO_UPDATE: &str = "Nada para atualizar.";
pub const ROW_NOT_FOUND: &str = "Linha não encontrada.";

pub type Changes = BTreeMap<Column, Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// `page >= 1`, `1 <= page_size <= 500`.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page < 1 {
            return Err(DatasetError::invalid("page deve ser >= 1."));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(DatasetError::invalid(format!(
                "page_size deve estar entre 1 e {}.",
                MAX_PAGE_SIZE
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

impl Page {
    pub fn empty(request: PageRequest) -> Self {
        Self {
            columns: vec![],
            rows: vec![],
            page: request.page,
            page_size: request.page_size,
            total: 0,
        }
    }
}

#[async_trait]
pub trait DatasetStore: Send + Sync + Debug {
    /// Drop and recreate the dataset table with exactly `records`.
    /// Returns the new version.
    async fn replace_all(&self, records: Vec<Record>) -> Result<i64>;

    /// One page ordered by insertion; empty when the table does not exist.
    async fn paginated_read(&self, request: PageRequest) -> Result<Page>;

    /// Update the given cells of one row. Returns the new version.
    async fn patch_row(&self, id: &RowId, changes: Changes) -> Result<i64>;

    /// Bump the version without touching the data.
    async fn touch_version(&self) -> Result<i64>;

    /// Current version, 0 when never touched.
    async fn version(&self) -> Result<i64>;
}

/// Keep the whitelisted keys of a patch payload.
///
/// Keys are normalized like column headers; `__id` and unknown keys are
/// ignored.
pub fn whitelisted_changes(raw: &Map<String, Value>) -> Changes {
    raw.iter()
        .filter_map(|(key, value)| {
            let column = normalize_label(key).parse::<Column>().ok()?;
            Some((column, cell_from_json(value)))
        })
        .collect()
}

/// Open the store matching the URL scheme.
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn DatasetStore>> {
    if is_sqlite_url(url) {
        Ok(Arc::new(SqliteStore::connect(url, max_connections).await?))
    } else {
        Ok(Arc::new(PostgresStore::connect(url, max_connections).await?))
    }
}

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

pub(crate) fn create_table_sql(columns: &[Column]) -> String {
    let mut sql = format!(
        "CREATE TABLE {} ({} BIGINT NOT NULL, {} TEXT PRIMARY KEY",
        DATASET_TABLE,
        quote(SEQ_COLUMN),
        quote(ROW_ID_COLUMN)
    );
    for column in columns {
        sql.push_str(&format!(", {} TEXT", quote(column.as_str())));
    }
    sql.push(')');
    sql
}

pub(crate) fn insert_prefix(columns: &[Column]) -> String {
    let mut names = vec![quote(SEQ_COLUMN), quote(ROW_ID_COLUMN)];
    names.extend(columns.iter().map(|c| quote(c.as_str())));
    format!("INSERT INTO {} ({}) ", DATASET_TABLE, names.join(", "))
}

pub(crate) fn select_page_sql(columns: &[Column]) -> String {
    let mut names = vec![quote(ROW_ID_COLUMN)];
    names.extend(columns.iter().map(|c| quote(c.as_str())));
    format!(
        "SELECT {} FROM {} ORDER BY {}, {} LIMIT $1 OFFSET $2",
        names.join(", "),
        DATASET_TABLE,
        quote(SEQ_COLUMN),
        quote(ROW_ID_COLUMN)
    )
}

pub(crate) fn update_row_sql(columns: &[Column]) -> String {
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote(c.as_str()), i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        DATASET_TABLE,
        sets.join(", "),
        quote(ROW_ID_COLUMN),
        columns.len() + 1
    )
}

/// Whitelisted columns among the stored ones, in whitelist order.
pub(crate) fn known_columns(stored: &[String]) -> Vec<Column> {
    let mut columns: Vec<Column> = stored.iter().filter_map(|c| c.parse().ok()).collect();
    columns.sort();
    columns.dedup();
    columns
}

/// Union of the columns carried by `records`, in whitelist order.
pub fn record_columns(records: &[Record]) -> Vec<Column> {
    let mut columns: Vec<Column> = records
        .iter()
        .flat_map(|r| r.cells.keys().copied())
        .collect();
    columns.sort();
    columns.dedup();
    columns
}
