//! Column mapping registry.
//!
//! Maps the semantic roles of the weld log (line id, weld id, auto-fill,
//! reference and free-text columns) onto the column names of whatever master
//! workbook is loaded. Names are checked against a table lazily, at use time.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::MappingMismatch;

/// Preferred line column when nothing has been saved yet
pub const DEFAULT_LINE_COLUMN: &str = "LINE No";

/// Preferred weld column when nothing has been saved yet
pub const DEFAULT_WELD_COLUMN: &str = "Weld No";

/// A semantic role a master-table column can play
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Line,
    Weld,
    AutoFill,
    Reference,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Line => "line",
            Role::Weld => "weld",
            Role::AutoFill => "auto-fill",
            Role::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Saved role-to-column assignments
///
/// Serialized as the flat settings document; absent or `null` keys read as
/// unset / empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Column holding the line identifier
    pub col_line_name: Option<String>,

    /// Column holding the weld identifier
    pub col_weld_name: Option<String>,

    /// Master columns copied into every new log entry
    #[serde(deserialize_with = "null_as_empty")]
    pub auto_fill_columns: Vec<String>,

    /// Master columns shown read-only next to the entry form
    #[serde(deserialize_with = "null_as_empty")]
    pub production_ref_columns: Vec<String>,

    /// Log-only columns typed in by hand for every entry
    #[serde(deserialize_with = "null_as_empty")]
    pub custom_free_columns: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pre-selection for a mapping screen, computed against a loaded table
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MappingSuggestion {
    pub line: Option<String>,
    pub weld: Option<String>,
    pub auto_fill_columns: Vec<String>,
    pub production_ref_columns: Vec<String>,
    pub custom_free_columns: Vec<String>,
}

/// Pick a column for a role from the table's column list
///
/// Returns the saved name if the table has it, else the fallback if the
/// table has it, else the first column. Only an empty column list yields
/// `None`.
pub fn resolve_column<'a>(
    saved: Option<&str>,
    columns: &'a [String],
    fallback: Option<&str>,
) -> Option<&'a str> {
    let find = |name: &str| columns.iter().find(|c| *c == name).map(String::as_str);

    saved
        .and_then(find)
        .or_else(|| fallback.and_then(find))
        .or_else(|| columns.first().map(String::as_str))
}

/// Split a comma-separated list of free-text column names
///
/// Names are trimmed and blanks dropped.
pub fn parse_free_columns(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ColumnMapping {
    /// Saved column for a key role; list roles have no single column
    pub fn saved_key(&self, role: Role) -> Option<&str> {
        match role {
            Role::Line => self.col_line_name.as_deref(),
            Role::Weld => self.col_weld_name.as_deref(),
            Role::AutoFill | Role::Reference => None,
        }
    }

    /// Resolve a role against a table's columns with the three-tier fallback
    pub fn resolve_role<'a>(
        &self,
        role: Role,
        columns: &'a [String],
        fallback: Option<&str>,
    ) -> Option<&'a str> {
        resolve_column(self.saved_key(role), columns, fallback)
    }

    /// The saved key column for a role, but only if the table has it
    pub fn key_column<'a>(&'a self, role: Role, columns: &[String]) -> Option<&'a str> {
        self.saved_key(role)
            .filter(|name| columns.iter().any(|c| c == name))
    }

    /// Every configured master column that the table does not contain
    pub fn mismatches(&self, columns: &[String]) -> Vec<MappingMismatch> {
        let missing = |name: &str| !columns.iter().any(|c| c == name);
        let mut out = Vec::new();

        for role in [Role::Line, Role::Weld] {
            if let Some(name) = self.saved_key(role) {
                if missing(name) {
                    out.push(MappingMismatch {
                        role,
                        column: name.to_string(),
                    });
                }
            }
        }

        let lists = [
            (Role::AutoFill, &self.auto_fill_columns),
            (Role::Reference, &self.production_ref_columns),
        ];
        for (role, list) in lists {
            for name in list.iter().filter(|n| missing(n)) {
                out.push(MappingMismatch {
                    role,
                    column: name.clone(),
                });
            }
        }

        out
    }

    /// Defaults a mapping screen should start from for this table
    pub fn suggest(&self, columns: &[String]) -> MappingSuggestion {
        let existing = |list: &[String]| -> Vec<String> {
            list.iter()
                .filter(|name| columns.contains(name))
                .cloned()
                .collect()
        };

        MappingSuggestion {
            line: self
                .resolve_role(Role::Line, columns, Some(DEFAULT_LINE_COLUMN))
                .map(str::to_string),
            weld: self
                .resolve_role(Role::Weld, columns, Some(DEFAULT_WELD_COLUMN))
                .map(str::to_string),
            auto_fill_columns: existing(&self.auto_fill_columns),
            production_ref_columns: existing(&self.production_ref_columns),
            custom_free_columns: self.custom_free_columns.clone(),
        }
    }
}
