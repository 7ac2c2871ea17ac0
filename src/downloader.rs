use chrono::NaiveDateTime;

use crate::error::ExportError;
use crate::production::DATE_FORMAT;
use crate::table::Table;
use crate::value::Value;

/// Sheet name used for exported workbooks
pub const SHEET_NAME: &str = "Sheet1";

/// File name offered when the log is downloaded
pub const EXPORT_FILE_NAME: &str = "daily_production.xlsx";

/// Convert a table to CSV format
///
/// The first line holds the column names in table order, followed by one
/// line per row. Quoting of commas, quotes and newlines is left to the `csv`
/// writer.
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `Result<String, ExportError>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use weldlog::downloader::to_csv;
/// use weldlog::table::Table;
///
/// let table = Table::new(vec!["LineId".to_string(), "WeldId".to_string()]);
/// assert_eq!(to_csv(&table).unwrap(), "LineId,WeldId\n");
/// ```
pub fn to_csv(table: &Table) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.values().iter().map(cell_text))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert a table to XLSX format
///
/// Writes a single worksheet with a header row of column names followed by
/// the data rows. Text is written as strings, numbers as numbers and
/// booleans as booleans; datetimes become `DD/MM/YYYY` strings and empty
/// cells are left blank.
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use weldlog::downloader::to_xlsx;
/// use weldlog::table::Table;
///
/// let table = Table::new(vec!["Date".to_string(), "Result".to_string()]);
/// let bytes = to_xlsx(&table).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    for (c, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, c as u16, name.as_str())?;
    }

    for row in table.rows() {
        let r = row.index() as u32 + 1;
        for (c, value) in row.values().iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Empty => {}
                Value::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Value::Int(i) => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                Value::Float(f) => {
                    worksheet.write_number(r, c, *f)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s.as_str())?;
                }
                Value::DateTime(dt) => {
                    worksheet.write_string(r, c, export_date(dt).as_str())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

fn export_date(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::DateTime(dt) => export_date(dt),
        other => other.to_string(),
    }
}
