use calamine::{Data, Range, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use log::{debug, info};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::LoadError;
use crate::table::Table;
use crate::value::Value;

/// Load a master table from an Excel workbook on disk
///
/// Reads the first worksheet. `header_row` is the 1-based sheet row holding
/// the column names; every row below it is data.
///
/// # Arguments
/// * `filepath` - Path to the workbook (xlsx, xlsm, xlsb, xls or ods)
/// * `header_row` - 1-based row number of the header
///
/// # Returns
/// * `Result<Table, LoadError>` - The loaded table or the reason it failed
///
/// # Examples
/// ```no_run
/// use weldlog::loader::from_excel;
///
/// match from_excel("master.xlsx", 1) {
///     Ok(table) => println!("Loaded {} rows", table.len()),
///     Err(e) => eprintln!("Error loading workbook: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>, header_row: usize) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto(filepath.as_ref())?;
    let range = first_sheet(&mut workbook)?;
    table_from_range(&range, header_row)
}

/// Load a master table from an in-memory workbook, e.g. an upload
pub fn from_excel_bytes(bytes: &[u8], header_row: usize) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = first_sheet(&mut workbook)?;
    table_from_range(&range, header_row)
}

/// Load a master table from CSV data
///
/// Rows may have different lengths; short rows are padded with empty cells.
/// Numeric fields are read as numbers, everything else as text.
pub fn from_csv_reader(reader: impl Read, header_row: usize) -> Result<Table, LoadError> {
    if header_row == 0 {
        return Err(LoadError::InvalidHeaderRow);
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let records = csv_reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let header_idx = header_row - 1;
    let Some(header) = records.get(header_idx) else {
        return Err(LoadError::HeaderRowOutOfRange {
            header_row,
            rows: records.len(),
        });
    };

    let width = records[header_idx..]
        .iter()
        .map(csv::StringRecord::len)
        .max()
        .unwrap_or(0);

    let mut header_cells: Vec<Value> = header.iter().map(Value::text).collect();
    header_cells.resize(width, Value::Empty);
    let columns = normalize_headers(&header_cells);

    let rows = records[header_idx + 1..]
        .iter()
        .map(|record| record.iter().map(Value::infer).collect())
        .collect();

    Ok(Table::from_rows(columns, rows))
}

/// Load a master table from a CSV file on disk
pub fn from_csv(filepath: impl AsRef<Path>, header_row: usize) -> Result<Table, LoadError> {
    let path = filepath.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_csv_reader(file, header_row)
}

/// Detect file type and load appropriate format
///
/// This function examines the file extension and calls the appropriate loader
/// for CSV or Excel files.
///
/// # Arguments
/// * `filepath` - Path to the file to load
/// * `header_row` - 1-based row number of the header
///
/// # Returns
/// * `Result<Table, LoadError>` - The loaded table or an error
///
/// # Examples
/// ```no_run
/// use weldlog::loader::load_master;
///
/// match load_master("welds.csv", 1) {
///     Ok(table) => println!("Columns: {:?}", table.columns()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_master(filepath: impl AsRef<Path>, header_row: usize) -> Result<Table, LoadError> {
    let path = filepath.as_ref();
    let table = match source_kind(path)? {
        SourceKind::Csv => from_csv(path, header_row)?,
        SourceKind::Workbook => from_excel(path, header_row)?,
    };
    info!(
        "Loaded {} ({} rows, {} columns)",
        path.display(),
        table.len(),
        table.width()
    );
    Ok(table)
}

/// Load an uploaded file, using its name only to pick the format
pub fn load_master_bytes(
    file_name: &str,
    bytes: &[u8],
    header_row: usize,
) -> Result<Table, LoadError> {
    let table = match source_kind(Path::new(file_name))? {
        SourceKind::Csv => from_csv_reader(bytes, header_row)?,
        SourceKind::Workbook => from_excel_bytes(bytes, header_row)?,
    };
    info!(
        "Loaded upload {} ({} rows, {} columns)",
        file_name,
        table.len(),
        table.width()
    );
    Ok(table)
}

enum SourceKind {
    Csv,
    Workbook,
}

fn source_kind(path: &Path) -> Result<SourceKind, LoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(SourceKind::Csv),
        Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
            Ok(SourceKind::Workbook)
        }
        Some(ext) => Err(LoadError::UnsupportedExtension(ext.to_string())),
        None => Err(LoadError::MissingExtension),
    }
}

fn first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<Range<Data>, LoadError> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;
    debug!("Reading worksheet '{}'", sheet_name);
    Ok(workbook.worksheet_range(&sheet_name)?)
}

// Sheet coordinates are absolute here: the used range may start below or to
// the right of A1, and the header row is counted from the top of the sheet.
fn table_from_range(range: &Range<Data>, header_row: usize) -> Result<Table, LoadError> {
    if header_row == 0 {
        return Err(LoadError::InvalidHeaderRow);
    }

    let Some((end_row, end_col)) = range.end() else {
        return Err(LoadError::HeaderRowOutOfRange { header_row, rows: 0 });
    };

    let header_idx = (header_row - 1) as u32;
    if header_idx > end_row {
        return Err(LoadError::HeaderRowOutOfRange {
            header_row,
            rows: end_row as usize + 1,
        });
    }

    let cell = |r: u32, c: u32| range.get_value((r, c)).map(Value::from).unwrap_or_default();

    let header_cells: Vec<Value> = (0..=end_col).map(|c| cell(header_idx, c)).collect();
    let columns = normalize_headers(&header_cells);

    let rows = (header_idx + 1..=end_row)
        .map(|r| (0..=end_col).map(|c| cell(r, c)).collect())
        .collect();

    Ok(Table::from_rows(columns, rows))
}

/// Turn raw header cells into unique, trimmed column names
///
/// Blank headers become `Unnamed: <index>`; repeated names get `.1`, `.2`
/// suffixes in order of appearance.
pub fn normalize_headers(cells: &[Value]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let trimmed = cell.to_string().trim().to_string();
            let base = if trimmed.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                trimmed
            };

            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}
