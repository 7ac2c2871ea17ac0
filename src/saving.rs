use log::{debug, info};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, SettingsError};
use crate::mapping::ColumnMapping;

/// Default settings file name, relative to the working directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Flat-file store for the column mapping
///
/// The whole document is rewritten on every save. There is no locking; one
/// operator per settings file is assumed.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl Default for SettingsStore {
    fn default() -> Self {
        SettingsStore::new(SETTINGS_FILE)
    }
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved mapping
    ///
    /// A missing file is a first run and yields the empty mapping. An
    /// unreadable or malformed file is an error; the caller decides whether
    /// to fall back to defaults.
    pub fn load(&self) -> Result<ColumnMapping, LoadError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No settings file at {}, starting unconfigured", self.path.display());
                return Ok(ColumnMapping::default());
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mapping = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {}", self.path.display());
        Ok(mapping)
    }

    /// Overwrite the settings file with the full mapping
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so a crash mid-write leaves the old file intact.
    pub fn save(&self, mapping: &ColumnMapping) -> Result<(), SettingsError> {
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(mapping)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty_mapping() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), ColumnMapping::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = SettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LoadError::Settings(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let mapping = ColumnMapping {
            col_line_name: Some("LINE No".into()),
            col_weld_name: Some("Weld No".into()),
            auto_fill_columns: vec!["WPS".into()],
            production_ref_columns: vec!["Διάμετρος".into()],
            custom_free_columns: vec!["Remarks".into()],
        };
        store.save(&mapping).unwrap();
        assert_eq!(store.load().unwrap(), mapping);

        // Non-ASCII names are stored verbatim, not escaped
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("Διάμετρος"));
    }

    #[test]
    fn test_save_overwrites_whole_file() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let mut mapping = ColumnMapping {
            auto_fill_columns: vec!["A".into(), "B".into(), "C".into()],
            ..Default::default()
        };
        store.save(&mapping).unwrap();
        mapping.auto_fill_columns = vec!["A".into()];
        store.save(&mapping).unwrap();
        assert_eq!(store.load().unwrap().auto_fill_columns, vec!["A"]);
    }
}
