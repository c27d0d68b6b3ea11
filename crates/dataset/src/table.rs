//! In-memory tabular data with string cells.

use serde_json::{Map, Value};

pub type Cell = Option<String>;

/// Ordered columns and rows of nullable string cells.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Build a table from JSON objects. Columns are the union of all keys,
    /// in first-seen order; missing keys become null cells.
    pub fn from_json_rows(objects: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for object in objects {
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|c| object.get(c).and_then(cell_from_json))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column carrying `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rename_columns<F>(&mut self, rename: F)
    where
        F: Fn(&str) -> String,
    {
        for column in self.columns.iter_mut() {
            *column = rename(column);
        }
    }

    /// Fold columns sharing a label into the first of them, keeping the
    /// first non-null cell of each row.
    pub fn merge_duplicate_columns(&mut self) {
        let mut firsts: Vec<usize> = Vec::new();
        let mut targets: Vec<usize> = Vec::with_capacity(self.columns.len());
        for (i, name) in self.columns.iter().enumerate() {
            match firsts.iter().position(|&f| self.columns[f] == *name) {
                Some(slot) => targets.push(slot),
                None => {
                    targets.push(firsts.len());
                    firsts.push(i);
                }
            }
        }
        if firsts.len() == self.columns.len() {
            return;
        }

        let columns = firsts.iter().map(|&f| self.columns[f].clone()).collect();
        self.columns = columns;
        for row in self.rows.iter_mut() {
            let mut merged: Vec<Cell> = vec![None; firsts.len()];
            for (cell, &slot) in row.drain(..).zip(&targets) {
                if merged[slot].is_none() {
                    merged[slot] = cell;
                }
            }
            *row = merged;
        }
    }

    /// Project onto `names`, which must all be present.
    pub fn select(&self, names: &[String]) -> Table {
        let indexes: Vec<usize> = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        let columns = indexes.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    /// Remove a column and hand back its cells.
    pub fn take_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let index = self.column_index(name)?;
        self.columns.remove(index);
        Some(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        self.columns.push(name.into());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    pub fn map_cells<F>(&mut self, f: F)
    where
        F: Fn(String) -> String,
    {
        for cell in self.rows.iter_mut().flatten() {
            if let Some(value) = cell.take() {
                *cell = Some(f(value));
            }
        }
    }

    /// The first `limit` rows as JSON objects keyed by column name.
    pub fn head_as_json(&self, limit: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| {
                        let value = cell.clone().map(Value::String).unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Text form of a JSON cell. Strings are kept verbatim, scalars use their
/// JSON text and nested values are stored as compact JSON.
pub fn cell_from_json(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
