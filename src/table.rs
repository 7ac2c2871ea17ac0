use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::error::FieldNotFound;
use crate::value::Value;

/// An ordered set of named fields, used for one log entry or one looked-up row
///
/// Setting a name that already exists replaces the value in place and keeps
/// its position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// In-memory table with ordered columns and rows of scalar values
///
/// Every row is kept exactly as wide as the column list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl From<RawTable> for Table {
    fn from(raw: RawTable) -> Self {
        Table::from_rows(raw.columns, raw.rows)
    }
}

/// Borrowed view of one table row
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    /// Position of this row in its table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of a named column, or `None` if the table lacks that column
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let col = self.table.column_index(column)?;
        Some(&self.table.rows[self.index][col])
    }

    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }

    /// Copy the row out as a record in column order
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        for (name, value) in self.table.columns.iter().zip(self.values()) {
            record.set(name.clone(), value.clone());
        }
        record
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, padding short rows with empty cells and cutting long ones
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn require_column(&self, column: &str) -> Result<usize, FieldNotFound> {
        self.column_index(column)
            .ok_or_else(|| FieldNotFound::new(column))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows.len()).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    /// Sorted, de-duplicated string forms of every value in a column
    ///
    /// Values of mixed types are compared by their string form only, so
    /// `10` sorts before `9`.
    pub fn unique_values(&self, column: &str) -> Result<Vec<String>, FieldNotFound> {
        let col = self.require_column(column)?;
        let unique: BTreeSet<String> = self.rows.iter().map(|r| r[col].to_string()).collect();
        Ok(unique.into_iter().collect())
    }

    /// Sorted unique values of `column` among rows whose `key_col` matches `key_val`
    pub fn unique_values_where(
        &self,
        column: &str,
        key_col: &str,
        key_val: &str,
    ) -> Result<Vec<String>, FieldNotFound> {
        let col = self.require_column(column)?;
        let key = self.require_column(key_col)?;
        let unique: BTreeSet<String> = self
            .rows
            .iter()
            .filter(|r| r[key].to_string() == key_val)
            .map(|r| r[col].to_string())
            .collect();
        Ok(unique.into_iter().collect())
    }

    /// All rows whose two key cells match the given values, in table order
    ///
    /// Duplicate key pairs are passed through; callers that need one row take
    /// the first.
    pub fn filter_by_pair(
        &self,
        key_col: &str,
        key_val: &str,
        key_col2: &str,
        key_val2: &str,
    ) -> Result<Vec<Row<'_>>, FieldNotFound> {
        let first = self.require_column(key_col)?;
        let second = self.require_column(key_col2)?;
        Ok(self
            .rows()
            .filter(|row| {
                let values = row.values();
                values[first].to_string() == key_val && values[second].to_string() == key_val2
            })
            .collect())
    }

    /// Append a record, adding any columns the table does not have yet
    ///
    /// New columns go to the end and earlier rows get empty cells for them.
    pub fn push_record(&mut self, record: &Record) {
        for name in record.names() {
            if !self.has_column(name) {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Value::Empty);
                }
            }
        }

        let mut row = vec![Value::Empty; self.columns.len()];
        for (name, value) in record.iter() {
            if let Some(col) = self.column_index(name) {
                row[col] = value.clone();
            }
        }
        self.rows.push(row);
    }
}
