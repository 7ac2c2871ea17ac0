//! Reference lookup and auto-fill extraction from a master row.

use log::warn;
use serde::Serialize;

use crate::error::FieldNotFound;
use crate::table::{Record, Row};
use crate::value::Value;

/// Result of copying configured columns out of a reference row
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FieldLookup {
    /// Values of the columns the row has, in requested order
    pub fields: Record,
    /// Requested columns the table does not have
    pub missing: Vec<FieldNotFound>,
}

/// Copy one named value out of a row
///
/// An existing column with an empty cell is `Ok(&Value::Empty)`; only a
/// column absent from the table is an error.
pub fn extract_field<'a>(row: &Row<'a>, column: &str) -> Result<&'a Value, FieldNotFound> {
    row.get(column).ok_or_else(|| FieldNotFound::new(column))
}

/// Copy the named values out of a row, verbatim
///
/// Missing columns are reported per field and do not stop the others from
/// being copied.
pub fn extract_fields(row: &Row<'_>, columns: &[String]) -> FieldLookup {
    let mut lookup = FieldLookup::default();
    for column in columns {
        match extract_field(row, column) {
            Ok(value) => lookup.fields.set(column.clone(), value.clone()),
            Err(missing) => {
                warn!("Skipping {}", missing);
                lookup.missing.push(missing);
            }
        }
    }
    lookup
}
