//! Application state for one operator session.
//!
//! [`Session`] owns the column mapping (and where it is saved), the master
//! table and the production log. Every screen of a presentation layer reads
//! from it and every user action goes through one of its methods; nothing is
//! kept in globals.

use log::{info, warn};
use serde::Serialize;
use std::path::Path;

use crate::error::{
    ExportError, FieldNotFound, LoadError, MappingMismatch, SettingsError, ValidationError,
};
use crate::loader;
use crate::lookup::{FieldLookup, extract_fields};
use crate::mapping::{ColumnMapping, MappingSuggestion, Role, parse_free_columns};
use crate::production::{EntryForm, ProductionLog, build_entry};
use crate::saving::SettingsStore;
use crate::table::{Record, Row, Table};

/// The loaded master workbook and where it came from
#[derive(Clone, Debug, PartialEq)]
pub struct MasterTable {
    pub source: String,
    pub table: Table,
}

/// Summary returned after a master table is (re)loaded
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub rows: usize,
    pub columns: Vec<String>,
    /// Saved mapping entries that do not match the new table
    pub mismatches: Vec<MappingMismatch>,
}

/// Outcome of a successful submission
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmitOutcome {
    /// Position of the new entry in the log
    pub row: usize,
    /// Whether a master row matched the selected pair
    pub reference_found: bool,
    /// Auto-fill columns that were skipped
    pub missing: Vec<FieldNotFound>,
}

pub struct Session {
    store: SettingsStore,
    mapping: ColumnMapping,
    master: Option<MasterTable>,
    log: ProductionLog,
}

impl Session {
    /// Start a session with the mapping saved in `store`
    ///
    /// An unreadable settings file is logged and replaced by the empty
    /// mapping; it is not overwritten until the next confirmation.
    pub fn open(store: SettingsStore) -> Self {
        let mapping = match store.load() {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    "Ignoring settings file {}: {}",
                    store.path().display(),
                    e
                );
                ColumnMapping::default()
            }
        };
        Session::with_mapping(store, mapping)
    }

    pub fn with_mapping(store: SettingsStore, mapping: ColumnMapping) -> Self {
        Session {
            store,
            mapping,
            master: None,
            log: ProductionLog::new(),
        }
    }

    // --- Column mapping ---

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn settings_path(&self) -> &Path {
        self.store.path()
    }

    /// Replace the whole mapping and persist it
    ///
    /// Returns the entries that do not fit the currently loaded table.
    pub fn set_mapping(
        &mut self,
        mapping: ColumnMapping,
    ) -> Result<Vec<MappingMismatch>, SettingsError> {
        self.mapping = mapping;
        self.save_mapping()?;
        Ok(self.mismatches())
    }

    /// Confirm the line and weld key columns
    pub fn set_key_columns(
        &mut self,
        line: impl Into<String>,
        weld: impl Into<String>,
    ) -> Result<Vec<MappingMismatch>, SettingsError> {
        let mut mapping = self.mapping.clone();
        mapping.col_line_name = Some(line.into());
        mapping.col_weld_name = Some(weld.into());
        self.set_mapping(mapping)
    }

    pub fn set_auto_fill_columns(
        &mut self,
        columns: Vec<String>,
    ) -> Result<Vec<MappingMismatch>, SettingsError> {
        let mut mapping = self.mapping.clone();
        mapping.auto_fill_columns = columns;
        self.set_mapping(mapping)
    }

    pub fn set_reference_columns(
        &mut self,
        columns: Vec<String>,
    ) -> Result<Vec<MappingMismatch>, SettingsError> {
        let mut mapping = self.mapping.clone();
        mapping.production_ref_columns = columns;
        self.set_mapping(mapping)
    }

    /// Confirm the free-text columns from a comma-separated list
    pub fn set_custom_columns(&mut self, input: &str) -> Result<Vec<String>, SettingsError> {
        let mut mapping = self.mapping.clone();
        mapping.custom_free_columns = parse_free_columns(input);
        self.set_mapping(mapping)?;
        Ok(self.mapping.custom_free_columns.clone())
    }

    /// Write the current mapping to the settings file as-is
    pub fn save_mapping(&self) -> Result<(), SettingsError> {
        self.store.save(&self.mapping)
    }

    /// Mapping entries that do not fit the loaded table (none without a table)
    pub fn mismatches(&self) -> Vec<MappingMismatch> {
        match &self.master {
            Some(master) => self.mapping.mismatches(master.table.columns()),
            None => Vec::new(),
        }
    }

    /// Pre-selection for the mapping screen, if a table is loaded
    pub fn mapping_suggestion(&self) -> Option<MappingSuggestion> {
        self.master
            .as_ref()
            .map(|master| self.mapping.suggest(master.table.columns()))
    }

    // --- Master table ---

    pub fn master(&self) -> Option<&MasterTable> {
        self.master.as_ref()
    }

    /// Load the master table from a file on disk, replacing the current one
    ///
    /// On failure the previously loaded table stays in place.
    pub fn load_master(
        &mut self,
        path: impl AsRef<Path>,
        header_row: usize,
    ) -> Result<LoadReport, LoadError> {
        let path = path.as_ref();
        let table = loader::load_master(path, header_row)?;
        Ok(self.install_master(path.display().to_string(), table))
    }

    /// Load the master table from uploaded bytes, replacing the current one
    pub fn load_master_bytes(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        header_row: usize,
    ) -> Result<LoadReport, LoadError> {
        let table = loader::load_master_bytes(file_name, bytes, header_row)?;
        Ok(self.install_master(file_name.to_string(), table))
    }

    fn install_master(&mut self, source: String, table: Table) -> LoadReport {
        let mismatches = self.mapping.mismatches(table.columns());
        for mismatch in &mismatches {
            warn!("{}", mismatch);
        }
        info!("Master table {} ready: {} rows", source, table.len());

        let report = LoadReport {
            source: source.clone(),
            rows: table.len(),
            columns: table.columns().to_vec(),
            mismatches,
        };
        self.master = Some(MasterTable { source, table });
        report
    }

    fn master_table(&self) -> Result<&Table, ValidationError> {
        self.master
            .as_ref()
            .map(|m| &m.table)
            .ok_or(ValidationError::NoMasterTable)
    }

    /// The saved line and weld columns, if both exist in the loaded table
    pub fn key_columns(&self) -> Result<(&str, &str), ValidationError> {
        let table = self.master_table()?;
        let line = self
            .mapping
            .key_column(Role::Line, table.columns())
            .ok_or(ValidationError::Unconfigured(Role::Line))?;
        let weld = self
            .mapping
            .key_column(Role::Weld, table.columns())
            .ok_or(ValidationError::Unconfigured(Role::Weld))?;
        Ok((line, weld))
    }

    /// Options for the line picker
    pub fn line_options(&self) -> Result<Vec<String>, ValidationError> {
        let (line_col, _) = self.key_columns()?;
        let table = self.master_table()?;
        table
            .unique_values(line_col)
            .map_err(|_| ValidationError::Unconfigured(Role::Line))
    }

    /// Options for the weld picker once a line is chosen
    pub fn weld_options(&self, line: &str) -> Result<Vec<String>, ValidationError> {
        let (line_col, weld_col) = self.key_columns()?;
        let table = self.master_table()?;
        table
            .unique_values_where(weld_col, line_col, line)
            .map_err(|_| ValidationError::Unconfigured(Role::Weld))
    }

    /// First master row for the pair; duplicates resolve to the earliest
    fn reference_row(&self, line: &str, weld: &str) -> Result<Option<Row<'_>>, ValidationError> {
        let (line_col, weld_col) = self.key_columns()?;
        let table = self.master_table()?;
        let rows = table
            .filter_by_pair(line_col, line, weld_col, weld)
            .map_err(|_| ValidationError::Unconfigured(Role::Line))?;
        if rows.len() > 1 {
            warn!(
                "{} master rows match {}/{}, using the first",
                rows.len(),
                line,
                weld
            );
        }
        Ok(rows.into_iter().next())
    }

    /// Reference panel values for the selected pair
    ///
    /// `None` when no master row matches.
    pub fn reference_info(
        &self,
        line: &str,
        weld: &str,
    ) -> Result<Option<FieldLookup>, ValidationError> {
        let row = self.reference_row(line, weld)?;
        Ok(row.map(|row| extract_fields(&row, &self.mapping.production_ref_columns)))
    }

    /// Every column of the master row for the pair (weld info view)
    pub fn weld_record(&self, line: &str, weld: &str) -> Result<Option<Record>, ValidationError> {
        Ok(self.reference_row(line, weld)?.map(|row| row.to_record()))
    }

    // --- Production log ---

    pub fn log(&self) -> &ProductionLog {
        &self.log
    }

    /// Validate the form and append a new entry to the log
    ///
    /// Rejected submissions leave the log untouched. Auto-fill columns that
    /// are missing from the table are reported and skipped.
    pub fn submit(&mut self, form: &EntryForm) -> Result<SubmitOutcome, ValidationError> {
        self.key_columns()?;
        let (line, weld) = form.selection()?;

        let reference = self.reference_row(line, weld)?;
        let reference_found = reference.is_some();
        let built = build_entry(form, reference.as_ref(), &self.mapping)?;

        self.log.append(&built.record);
        info!("Logged {}/{} as {}", line, weld, form.result);

        Ok(SubmitOutcome {
            row: self.log.len() - 1,
            reference_found,
            missing: built.missing,
        })
    }

    /// Take a grid-edited copy of the log; `true` if it replaced the log
    pub fn replace_log(&mut self, edited: Table) -> bool {
        self.log.apply_edits(edited)
    }

    pub fn export_log(&self) -> Result<Vec<u8>, ExportError> {
        self.log.export_xlsx()
    }

    pub fn export_log_csv(&self) -> Result<String, ExportError> {
        self.log.export_csv()
    }
}
