use crate::columns::Column;
use crate::error::{DatasetError, Result};
use crate::table::Table;

pub const NO_RECOGNIZED_COLUMN: &str = "Nenhuma coluna reconhecida no CSV.";

/// Which columns survive the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Explicit list from the client, in its order.
    Requested(Vec<String>),
    /// The pertinent whitelist, in whitelist order.
    Pertinent,
    /// Everything present.
    All,
}

impl ColumnSelection {
    /// Upload options: an explicit `columns` list wins over the flag.
    pub fn from_options(columns: Option<Vec<String>>, only_pertinent: bool) -> Self {
        match columns {
            Some(columns) => ColumnSelection::Requested(columns),
            None if only_pertinent => ColumnSelection::Pertinent,
            None => ColumnSelection::All,
        }
    }

    fn wanted(&self, table: &Table) -> Vec<String> {
        match self {
            ColumnSelection::Requested(columns) => columns.clone(),
            ColumnSelection::Pertinent => Column::ALL
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            ColumnSelection::All => table.columns().to_vec(),
        }
    }
}

/// Restrict `table` to the selected columns that are actually present.
///
/// Fails when nothing survives.
pub fn select_columns(table: &Table, selection: &ColumnSelection) -> Result<Table> {
    let mut keep: Vec<String> = Vec::new();
    for name in selection.wanted(table) {
        if table.has_column(&name) && !keep.contains(&name) {
            keep.push(name);
        }
    }

    if keep.is_empty() {
        return Err(DatasetError::invalid(NO_RECOGNIZED_COLUMN));
    }
    Ok(table.select(&keep))
}
