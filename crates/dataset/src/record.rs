//! Validated rows: a technical identifier plus pertinent cells.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use uuid::Uuid;

use crate::columns::{Column, ROW_ID_COLUMN};
use crate::error::{DatasetError, Result};
use crate::table::{Cell, Table};

/// Opaque per-row key, assigned once and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(String);

impl RowId {
    pub fn generate() -> Self {
        RowId(Uuid::new_v4().to_string())
    }

    /// `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(RowId(trimmed.to_string()))
        }
    }

    /// Wrap an id read back from storage.
    pub(crate) fn from_stored(raw: String) -> Self {
        RowId(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RowId,
    pub cells: BTreeMap<Column, Cell>,
}

impl Record {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.cells.insert(column, Some(value.into()));
        self
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells.get(&column).and_then(|c| c.as_deref())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        for (column, cell) in &self.cells {
            map.serialize_entry(column.as_str(), cell)?;
        }
        map.serialize_entry(ROW_ID_COLUMN, self.id.as_str())?;
        map.end()
    }
}

/// Give every row an identifier.
///
/// Adds the `__id` column when missing; when present, existing ids are kept
/// and only blank cells get a fresh one.
pub fn ensure_row_ids(table: &mut Table) {
    match table.take_column(ROW_ID_COLUMN) {
        None => {
            let ids = (0..table.len())
                .map(|_| Some(RowId::generate().0))
                .collect();
            table.push_column(ROW_ID_COLUMN, ids);
        }
        Some(existing) => {
            let ids = existing
                .into_iter()
                .map(|cell| {
                    let id = cell
                        .as_deref()
                        .and_then(RowId::parse)
                        .unwrap_or_else(RowId::generate);
                    Some(id.0)
                })
                .collect();
            table.push_column(ROW_ID_COLUMN, ids);
        }
    }
}

/// Convert an identified, filtered table into records.
///
/// Columns outside the whitelist are dropped; duplicate ids are rejected.
pub fn into_records(table: Table) -> Result<Vec<Record>> {
    let id_index = table
        .column_index(ROW_ID_COLUMN)
        .ok_or_else(|| DatasetError::invalid("ID ausente."))?;
    let columns: Vec<Option<Column>> = table
        .columns()
        .iter()
        .map(|name| name.parse::<Column>().ok())
        .collect();

    let mut seen: HashSet<RowId> = HashSet::new();
    let mut records = Vec::with_capacity(table.len());

    for row in table.into_rows() {
        let id = row[id_index]
            .as_deref()
            .and_then(RowId::parse)
            .ok_or_else(|| DatasetError::invalid("ID ausente."))?;
        if !seen.insert(id.clone()) {
            return Err(DatasetError::invalid(format!("ID duplicado: {}", id)));
        }

        let mut record = Record::new(id);
        for (column, cell) in columns.iter().zip(row) {
            if let Some(column) = column {
                record.cells.entry(*column).or_insert(cell);
            }
        }
        records.push(record);
    }

    Ok(records)
}
