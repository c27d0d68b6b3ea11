//! CSV ingestion, column filtering and persistence of the shared
//! `dados_filtrados` dataset.

pub mod columns;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod table;
pub mod version;

pub use columns::Column;
pub use error::{DatasetError, Result};
pub use filter::ColumnSelection;
pub use record::{Record, RowId};
pub use store::{DatasetStore, Page, PageRequest};
pub use table::Table;
