//! Error types shared by the record model and the web binding.
//!
//! Every error here is recoverable at the user-interaction boundary: a failed
//! load keeps the previous table, a missing field is skipped, a rejected
//! submission creates no row.

use std::path::PathBuf;
use thiserror::Error;

use crate::mapping::Role;

/// Failure to read a master data file or the settings file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workbook could not be opened or a sheet could not be parsed.
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// The CSV input was malformed.
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The workbook contains no worksheet at all.
    #[error("workbook contains no sheets")]
    NoSheets,

    /// Header rows are numbered from 1.
    #[error("header row must be 1 or greater")]
    InvalidHeaderRow,

    /// The requested header row lies past the last row of the sheet.
    #[error("header row {header_row} is past the end of the sheet ({rows} rows)")]
    HeaderRowOutOfRange { header_row: usize, rows: usize },

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("file has no extension")]
    MissingExtension,

    /// The settings file exists but is not a valid mapping document.
    #[error("malformed settings file: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Failure to persist the column mapping.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A configured column that no longer exists in the loaded master table.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("configured {role} column '{column}' is not in the loaded table")]
pub struct MappingMismatch {
    pub role: Role,
    pub column: String,
}

/// A column requested at lookup time that the table does not have.
///
/// Distinct from a column that exists but holds an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("column '{column}' not found")]
pub struct FieldNotFound {
    pub column: String,
}

impl FieldNotFound {
    pub fn new(column: impl Into<String>) -> Self {
        FieldNotFound {
            column: column.into(),
        }
    }
}

/// A submission or lookup that cannot proceed with the current session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no master table has been loaded")]
    NoMasterTable,

    /// The key role has no saved column, or the saved column is missing
    /// from the current table.
    #[error("the {0} column is not configured for the loaded table")]
    Unconfigured(Role),

    #[error("a line must be selected")]
    MissingLine,

    #[error("a weld must be selected")]
    MissingWeld,
}

/// Failure to serialize the production log.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to finish CSV output: {0}")]
    Io(#[from] std::io::Error),
}
