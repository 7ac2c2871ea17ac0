//! Production log: the session's growing table of inspection entries.

use chrono::{Local, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::downloader;
use crate::error::{ExportError, FieldNotFound, ValidationError};
use crate::lookup::extract_fields;
use crate::mapping::ColumnMapping;
use crate::table::{Record, Row, Table};

/// Format of the `Date` column in the log and in exports
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Welder stamp used when the form leaves it unchanged
pub const DEFAULT_WELDER: &str = "User";

/// Fixed log columns, in the order they appear in every entry
pub mod columns {
    pub const DATE: &str = "Date";
    pub const LINE_ID: &str = "LineId";
    pub const WELD_ID: &str = "WeldId";
    pub const TYPE_1: &str = "Type 1";
    pub const TYPE_2: &str = "Type 2";
    pub const WELDER: &str = "Welder";
    pub const RESULT: &str = "Result";

    pub const FIXED: [&str; 7] = [DATE, LINE_ID, WELD_ID, TYPE_1, TYPE_2, WELDER, RESULT];
}

/// Inspection outcome recorded for a weld
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionResult {
    #[default]
    Accepted,
    Rejected,
    Pending,
}

impl InspectionResult {
    pub const ALL: [InspectionResult; 3] = [
        InspectionResult::Accepted,
        InspectionResult::Rejected,
        InspectionResult::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Accepted => "Accepted",
            InspectionResult::Rejected => "Rejected",
            InspectionResult::Pending => "Pending",
        }
    }
}

impl fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InspectionResult::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown inspection result: {}", s))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn default_welder() -> String {
    DEFAULT_WELDER.to_string()
}

/// Values submitted from the entry form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryForm {
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub weld: Option<String>,
    #[serde(default)]
    pub result: InspectionResult,
    #[serde(default = "default_welder")]
    pub welder: String,
    #[serde(default)]
    pub type_1: String,
    #[serde(default)]
    pub type_2: String,
    /// Free-text values keyed by column name
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

impl Default for EntryForm {
    fn default() -> Self {
        EntryForm {
            date: today(),
            line: None,
            weld: None,
            result: InspectionResult::default(),
            welder: default_welder(),
            type_1: String::new(),
            type_2: String::new(),
            custom: BTreeMap::new(),
        }
    }
}

impl EntryForm {
    /// The selected (line, weld) pair, or why the form cannot be submitted
    pub fn selection(&self) -> Result<(&str, &str), ValidationError> {
        let line = picked(&self.line).ok_or(ValidationError::MissingLine)?;
        let weld = picked(&self.weld).ok_or(ValidationError::MissingWeld)?;
        Ok((line, weld))
    }
}

fn picked(selection: &Option<String>) -> Option<&str> {
    selection.as_deref().filter(|s| !s.trim().is_empty())
}

/// A new log entry plus the auto-fill columns that could not be copied
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltEntry {
    pub record: Record,
    pub missing: Vec<FieldNotFound>,
}

/// Assemble a log entry from the form and the matched master row
///
/// Field order: fixed columns, auto-fill values from `reference`, then the
/// configured free-text columns. Free-text columns the form leaves out are
/// stored empty; form values for unconfigured columns are dropped.
pub fn build_entry(
    form: &EntryForm,
    reference: Option<&Row<'_>>,
    mapping: &ColumnMapping,
) -> Result<BuiltEntry, ValidationError> {
    let (line, weld) = form.selection()?;

    let mut record = Record::new();
    record.set(columns::DATE, form.date.format(DATE_FORMAT).to_string());
    record.set(columns::LINE_ID, line);
    record.set(columns::WELD_ID, weld);
    record.set(columns::TYPE_1, form.type_1.as_str());
    record.set(columns::TYPE_2, form.type_2.as_str());
    record.set(columns::WELDER, form.welder.as_str());
    record.set(columns::RESULT, form.result.as_str());

    let mut missing = Vec::new();
    if let Some(row) = reference {
        let auto = extract_fields(row, &mapping.auto_fill_columns);
        for (name, value) in auto.fields.iter() {
            record.set(name, value.clone());
        }
        missing = auto.missing;
    } else if !mapping.auto_fill_columns.is_empty() {
        warn!("No master row for {}/{}, auto-fill skipped", line, weld);
    }

    for name in &mapping.custom_free_columns {
        let value = form.custom.get(name).map(String::as_str).unwrap_or("");
        record.set(name.as_str(), value);
    }
    for name in form.custom.keys() {
        if !mapping.custom_free_columns.contains(name) {
            debug!("Ignoring unconfigured free-text field '{}'", name);
        }
    }

    Ok(BuiltEntry { record, missing })
}

/// Session-local table of submitted entries
///
/// Exists only in memory; [`ProductionLog::export_xlsx`] is the only way out.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProductionLog {
    table: Table,
}

impl ProductionLog {
    pub fn new() -> Self {
        ProductionLog::default()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Add one entry after the existing ones
    pub fn append(&mut self, record: &Record) {
        self.table.push_record(record);
        debug!("Log now holds {} entries", self.table.len());
    }

    /// Take a grid-edited copy of the log
    ///
    /// Any difference at all, including inserted or deleted rows, replaces
    /// the whole table. Returns `false` when the copy is identical.
    pub fn apply_edits(&mut self, edited: Table) -> bool {
        if edited == self.table {
            return false;
        }
        info!(
            "Replacing log after edit ({} -> {} rows)",
            self.table.len(),
            edited.len()
        );
        self.table = edited;
        true
    }

    /// Serialize the log as a one-sheet workbook
    pub fn export_xlsx(&self) -> Result<Vec<u8>, ExportError> {
        downloader::to_xlsx(&self.table)
    }

    /// Serialize the log as CSV text
    pub fn export_csv(&self) -> Result<String, ExportError> {
        downloader::to_csv(&self.table)
    }
}
