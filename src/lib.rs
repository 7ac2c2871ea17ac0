/*!
# Weld Log

A data-entry and lookup tool for industrial weld records backed by a
spreadsheet, built in Rust.

## Overview

Inspectors load a master weld register (an Excel workbook or CSV file), tell
the tool which columns identify a line and a weld, and then log inspection
results against (line, weld) pairs. Each entry can copy values from the
master row automatically and carry extra free-text fields. The day's log is
kept in memory and downloaded as an Excel workbook.

## Architecture

### Record Model
- **Column Mapping Registry** - Maps semantic roles (line id, weld id,
  auto-fill, reference, free-text) to column names, persisted as a flat JSON
  settings file
- **Master Record Table** - Read-only table loaded once per file selection,
  filtered by the two key columns
- **Production Log** - Append-only, grid-editable table of submitted entries,
  exportable to XLSX and CSV
- **Session** - Explicit application state passed to every operation

### Presentation Layer (`web` feature)
- **Technologies**: Rust, axum
- JSON endpoints for mapping, master table, lookups and the log
- Multipart upload of the master workbook, XLSX download of the log

## Modules

- **value**: Scalar cell values and their string forms
- **table**: Tables, rows and records; unique values and key-pair filters
- **mapping**: Role-to-column mapping and its fallback resolution
- **saving**: Settings file persistence
- **loader**: Master table import (XLSX, XLS, ODS, CSV)
- **lookup**: Reference and auto-fill extraction
- **production**: Entry form, entry construction and the production log
- **downloader**: Export (XLSX, CSV)
- **session**: Application state and user-level operations
- **error**: Error types
- **config**, **app**: Server configuration and HTTP routing (`web` feature)

## Usage

```no_run
use weldlog::production::{EntryForm, InspectionResult};
use weldlog::saving::SettingsStore;
use weldlog::session::Session;

let mut session = Session::open(SettingsStore::new("settings.json"));
session.load_master("master.xlsx", 1)?;
session.set_key_columns("LINE No", "Weld No")?;

let form = EntryForm {
    line: Some("L1".into()),
    weld: Some("W2".into()),
    result: InspectionResult::Accepted,
    ..Default::default()
};
session.submit(&form)?;
std::fs::write("daily_production.xlsx", session.export_log()?)?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod downloader;
pub mod error;
pub mod loader;
pub mod lookup;
pub mod mapping;
pub mod production;
pub mod saving;
pub mod session;
pub mod table;
pub mod value;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

/// Re-export the types most callers need
pub use error::{
    ExportError, FieldNotFound, LoadError, MappingMismatch, SettingsError, ValidationError,
};
pub use mapping::{ColumnMapping, Role};
pub use production::{EntryForm, InspectionResult, ProductionLog};
pub use saving::SettingsStore;
pub use session::Session;
pub use table::{Record, Row, Table};
pub use value::Value;
