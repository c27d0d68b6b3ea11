//! The ingest → normalize → filter → identify chain shared by the HTTP
//! handlers and the loader.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::columns::{normalize_columns, ROW_ID_COLUMN};
use crate::error::{DatasetError, Result};
use crate::filter::{select_columns, ColumnSelection};
use crate::ingest::read_csv;
use crate::record::{ensure_row_ids, into_records, Record};
use crate::table::Table;

/// Rows returned by an upload preview.
pub const PREVIEW_LIMIT: usize = 100;

pub const NO_ROWS: &str = "Sem linhas para salvar.";

#[derive(Debug, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub total: usize,
}

/// Parse and filter an uploaded CSV without persisting anything.
pub fn preview_csv(bytes: &[u8], selection: &ColumnSelection) -> Result<Preview> {
    let mut table = read_csv(bytes)?;
    normalize_columns(&mut table);

    let mut table = select_columns(&table, selection)?;
    table.map_cells(|value| {
        if value.contains('\0') {
            value.replace('\0', "")
        } else {
            value
        }
    });

    Ok(Preview {
        columns: table.columns().to_vec(),
        rows: table.head_as_json(PREVIEW_LIMIT),
        total: table.len(),
    })
}

/// Turn client JSON rows into records ready for a full replace.
pub fn prepare_rows(objects: &[Map<String, Value>]) -> Result<Vec<Record>> {
    if objects.is_empty() {
        return Err(DatasetError::invalid(NO_ROWS));
    }
    prepare_table(Table::from_json_rows(objects))
}

/// Normalize, keep pertinent columns (and any `__id`), assign ids.
pub fn prepare_table(mut table: Table) -> Result<Vec<Record>> {
    if table.is_empty() || table.columns().is_empty() {
        return Err(DatasetError::invalid(NO_ROWS));
    }

    normalize_columns(&mut table);
    let ids = table.take_column(ROW_ID_COLUMN);

    let mut table = select_columns(&table, &ColumnSelection::Pertinent)?;
    if let Some(ids) = ids {
        table.push_column(ROW_ID_COLUMN, ids);
    }
    ensure_row_ids(&mut table);

    into_records(table)
}
