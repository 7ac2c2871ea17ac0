//! End-to-end tests for a weld log session: load, map, look up, log, export.

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;
use weldlog::error::{LoadError, ValidationError};
use weldlog::loader;
use weldlog::mapping::{ColumnMapping, Role};
use weldlog::production::{EntryForm, InspectionResult};
use weldlog::saving::SettingsStore;
use weldlog::session::Session;
use weldlog::table::Table;
use weldlog::value::Value;

const MASTER_CSV: &str = "LINE No,Weld No,WPS\nL1,W1,WPS-A\nL1,W2,WPS-B\n";

fn new_session(dir: &TempDir) -> Session {
    Session::open(SettingsStore::new(dir.path().join("settings.json")))
}

fn loaded_session(dir: &TempDir) -> Session {
    let mut session = new_session(dir);
    session
        .load_master_bytes("master.csv", MASTER_CSV.as_bytes(), 1)
        .unwrap();
    session.set_key_columns("LINE No", "Weld No").unwrap();
    session
}

fn form(line: &str, weld: &str) -> EntryForm {
    EntryForm {
        line: Some(line.to_string()),
        weld: Some(weld.to_string()),
        result: InspectionResult::Accepted,
        ..Default::default()
    }
}

fn master_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let rows = [
        ["LINE No", "Weld No", "WPS"],
        ["L1", "W1", "WPS-A"],
        ["L1", "W2", "WPS-B"],
        ["L2", "W1", "WPS-C"],
    ];
    for (r, row) in rows.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *text).unwrap();
        }
    }
    sheet.write_number(1, 3, 12.5).unwrap();
    workbook.save_to_buffer().unwrap()
}

#[test]
fn select_and_submit_appends_one_entry() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);

    assert_eq!(session.line_options().unwrap(), vec!["L1"]);
    assert_eq!(session.weld_options("L1").unwrap(), vec!["W1", "W2"]);

    let outcome = session.submit(&form("L1", "W2")).unwrap();
    assert_eq!(outcome.row, 0);
    assert!(outcome.reference_found);
    assert_eq!(session.log().len(), 1);

    let entry = session.log().table().row(0).unwrap();
    assert_eq!(entry.get("LineId"), Some(&Value::from("L1")));
    assert_eq!(entry.get("WeldId"), Some(&Value::from("W2")));
    assert_eq!(entry.get("Result"), Some(&Value::from("Accepted")));
}

#[test]
fn auto_fill_copies_reference_values() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();

    session.submit(&form("L1", "W2")).unwrap();

    let entry = session.log().table().row(0).unwrap();
    assert_eq!(entry.get("WPS"), Some(&Value::from("WPS-B")));
}

#[test]
fn missing_auto_fill_column_does_not_block_submission() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session
        .set_auto_fill_columns(vec!["WPS".to_string(), "Heat No".to_string()])
        .unwrap();

    let outcome = session.submit(&form("L1", "W1")).unwrap();
    assert_eq!(outcome.missing.len(), 1);
    assert_eq!(outcome.missing[0].column, "Heat No");

    let entry = session.log().table().row(0).unwrap();
    assert_eq!(entry.get("WPS"), Some(&Value::from("WPS-A")));
    assert_eq!(entry.get("Heat No"), None);
}

#[test]
fn submission_without_both_keys_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);

    let mut no_weld = form("L1", "W1");
    no_weld.weld = None;
    assert_eq!(
        session.submit(&no_weld),
        Err(ValidationError::MissingWeld)
    );

    let mut blank_line = form("L1", "W1");
    blank_line.line = Some("  ".to_string());
    assert_eq!(
        session.submit(&blank_line),
        Err(ValidationError::MissingLine)
    );

    assert!(session.log().is_empty());
}

#[test]
fn submission_needs_configured_keys() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(&dir);
    assert_eq!(
        session.submit(&form("L1", "W1")),
        Err(ValidationError::NoMasterTable)
    );

    session
        .load_master_bytes("master.csv", MASTER_CSV.as_bytes(), 1)
        .unwrap();
    assert_eq!(
        session.submit(&form("L1", "W1")),
        Err(ValidationError::Unconfigured(Role::Line))
    );
    assert!(session.log().is_empty());
}

#[test]
fn unknown_pair_is_logged_without_reference() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();

    assert!(session.reference_info("L9", "W9").unwrap().is_none());
    let outcome = session.submit(&form("L9", "W9")).unwrap();
    assert!(!outcome.reference_found);

    let entry = session.log().table().row(0).unwrap();
    assert_eq!(entry.get("LineId"), Some(&Value::from("L9")));
    assert_eq!(entry.get("WPS"), None);
}

#[test]
fn reference_info_reports_missing_fields() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session
        .set_reference_columns(vec!["WPS".to_string(), "Spool".to_string()])
        .unwrap();

    let info = session.reference_info("L1", "W1").unwrap().unwrap();
    assert_eq!(info.fields.get("WPS"), Some(&Value::from("WPS-A")));
    assert_eq!(info.missing.len(), 1);
    assert_eq!(info.missing[0].column, "Spool");
}

#[test]
fn duplicate_pairs_resolve_to_first_row() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(&dir);
    let csv = "LINE No,Weld No,WPS\nL1,W1,first\nL1,W1,second\n";
    session
        .load_master_bytes("dupes.csv", csv.as_bytes(), 1)
        .unwrap();
    session.set_key_columns("LINE No", "Weld No").unwrap();

    let record = session.weld_record("L1", "W1").unwrap().unwrap();
    assert_eq!(record.get("WPS"), Some(&Value::from("first")));
    assert_eq!(session.weld_options("L1").unwrap(), vec!["W1"]);
}

#[test]
fn numeric_keys_match_their_string_form() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(&dir);
    let csv = "LINE No,Weld No,WPS\n100,7,WPS-N\n";
    session
        .load_master_bytes("numeric.csv", csv.as_bytes(), 1)
        .unwrap();
    session.set_key_columns("LINE No", "Weld No").unwrap();

    assert_eq!(session.line_options().unwrap(), vec!["100"]);
    assert_eq!(session.weld_options("100").unwrap(), vec!["7"]);
    assert!(session.weld_record("100", "7").unwrap().is_some());
}

#[test]
fn xlsx_master_loads_from_bytes() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(&dir);

    let report = session
        .load_master_bytes("master.xlsx", &master_workbook(), 1)
        .unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.columns, vec!["LINE No", "Weld No", "WPS", "Unnamed: 3"]);

    session.set_key_columns("LINE No", "Weld No").unwrap();
    assert_eq!(session.line_options().unwrap(), vec!["L1", "L2"]);

    let record = session.weld_record("L1", "W1").unwrap().unwrap();
    assert_eq!(record.get("Unnamed: 3"), Some(&Value::Float(12.5)));
}

#[test]
fn failed_load_keeps_previous_table() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);

    let err = session
        .load_master_bytes("broken.xlsx", b"not a workbook", 1)
        .unwrap_err();
    assert!(matches!(err, LoadError::Workbook(_)));

    let err = session
        .load_master_bytes("master.csv", MASTER_CSV.as_bytes(), 9)
        .unwrap_err();
    assert!(matches!(err, LoadError::HeaderRowOutOfRange { .. }));

    let master = session.master().unwrap();
    assert_eq!(master.source, "master.csv");
    assert_eq!(master.table.len(), 2);
    assert_eq!(session.weld_options("L1").unwrap(), vec!["W1", "W2"]);
}

#[test]
fn reload_reports_mapping_mismatches() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();

    let csv = "Line,Weld,Material\nL1,W1,CS\n";
    let report = session
        .load_master_bytes("renamed.csv", csv.as_bytes(), 1)
        .unwrap();

    let roles: Vec<Role> = report.mismatches.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::Line, Role::Weld, Role::AutoFill]);

    // The saved mapping is kept; key lookups degrade to unconfigured
    assert_eq!(session.mapping().col_line_name.as_deref(), Some("LINE No"));
    assert_eq!(
        session.line_options(),
        Err(ValidationError::Unconfigured(Role::Line))
    );

    let suggestion = session.mapping_suggestion().unwrap();
    assert_eq!(suggestion.line.as_deref(), Some("Line"));
    assert!(suggestion.auto_fill_columns.is_empty());
}

#[test]
fn mapping_survives_a_new_session() {
    let dir = TempDir::new().unwrap();
    {
        let mut session = loaded_session(&dir);
        session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();
        let custom = session.set_custom_columns(" Remarks , , Heat No").unwrap();
        assert_eq!(custom, vec!["Remarks", "Heat No"]);
    }

    let session = new_session(&dir);
    let expected = ColumnMapping {
        col_line_name: Some("LINE No".to_string()),
        col_weld_name: Some("Weld No".to_string()),
        auto_fill_columns: vec!["WPS".to_string()],
        production_ref_columns: Vec::new(),
        custom_free_columns: vec!["Remarks".to_string(), "Heat No".to_string()],
    };
    assert_eq!(session.mapping(), &expected);
}

#[test]
fn corrupt_settings_fall_back_to_empty_mapping() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = SettingsStore::new(&path);
    assert!(matches!(store.load(), Err(LoadError::Settings(_))));

    let session = Session::open(store);
    assert_eq!(session.mapping(), &ColumnMapping::default());
    // Not overwritten until the operator confirms something
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn custom_fields_follow_fixed_and_auto_fill_columns() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();
    session.set_custom_columns("Remarks, Heat No").unwrap();

    let mut entry = form("L1", "W1");
    entry.custom.insert("Remarks".to_string(), "root ok".to_string());
    entry.custom.insert("Unlisted".to_string(), "dropped".to_string());
    session.submit(&entry).unwrap();

    let table = session.log().table();
    assert_eq!(
        table.columns(),
        &[
            "Date", "LineId", "WeldId", "Type 1", "Type 2", "Welder", "Result", "WPS", "Remarks",
            "Heat No"
        ]
    );
    let row = table.row(0).unwrap();
    assert_eq!(row.get("Remarks"), Some(&Value::from("root ok")));
    assert_eq!(row.get("Heat No"), Some(&Value::Empty));
    assert!(!table.has_column("Unlisted"));
}

#[test]
fn exported_log_reloads_cell_for_cell() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.set_auto_fill_columns(vec!["WPS".to_string()]).unwrap();
    session.set_custom_columns("Remarks").unwrap();

    let mut first = form("L1", "W1");
    first.type_1 = "Butt".to_string();
    first.custom.insert("Remarks".to_string(), "12".to_string());
    session.submit(&first).unwrap();

    let mut second = form("L1", "W2");
    second.result = InspectionResult::Rejected;
    session.submit(&second).unwrap();

    let bytes = session.export_log().unwrap();
    let reloaded = loader::load_master_bytes("daily_production.xlsx", &bytes, 1).unwrap();
    assert_eq!(&reloaded, session.log().table());
}

#[test]
fn exported_log_written_to_disk_reloads() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.submit(&form("L1", "W2")).unwrap();

    let path = dir.path().join("daily_production.xlsx");
    std::fs::write(&path, session.export_log().unwrap()).unwrap();

    let reloaded = loader::load_master(&path, 1).unwrap();
    assert_eq!(&reloaded, session.log().table());
}

#[test]
fn identical_edit_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let mut session = loaded_session(&dir);
    session.submit(&form("L1", "W1")).unwrap();

    let copy = session.log().table().clone();
    assert!(!session.replace_log(copy.clone()));

    let mut rows: Vec<Vec<Value>> = copy.rows().map(|r| r.values().to_vec()).collect();
    rows[0][6] = Value::from("Rejected");
    let edited = Table::from_rows(copy.columns().to_vec(), rows);
    assert!(session.replace_log(edited));

    let row = session.log().table().row(0).unwrap();
    assert_eq!(row.get("Result"), Some(&Value::from("Rejected")));
}

#[test]
fn filter_by_pair_finds_every_present_pair() {
    let dir = TempDir::new().unwrap();
    let mut session = new_session(&dir);
    session
        .load_master_bytes("master.xlsx", &master_workbook(), 1)
        .unwrap();
    let table = &session.master().unwrap().table;

    for row in table.rows() {
        let line = row.get("LINE No").unwrap().to_string();
        let weld = row.get("Weld No").unwrap().to_string();
        let hits = table
            .filter_by_pair("LINE No", &line, "Weld No", &weld)
            .unwrap();
        assert!(!hits.is_empty());
    }

    let hits = table
        .filter_by_pair("LINE No", "L2", "Weld No", "W2")
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn unique_values_sorted_and_idempotent() {
    let csv = "Tag\nb\n10\na\n2\nb\n";
    let table = loader::from_csv_reader(csv.as_bytes(), 1).unwrap();

    let once = table.unique_values("Tag").unwrap();
    assert_eq!(once, vec!["10", "2", "a", "b"]);

    let again = Table::from_rows(
        vec!["Tag".to_string()],
        once.iter().map(|v| vec![Value::from(v.as_str())]).collect(),
    )
    .unique_values("Tag")
    .unwrap();
    assert_eq!(once, again);
}
