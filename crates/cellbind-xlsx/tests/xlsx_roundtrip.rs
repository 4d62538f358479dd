//! End-to-end tests for the XLSX writer (create -> save -> read -> verify)

use std::io::{Cursor, Read};
use std::sync::Arc;

use cellbind_core::{CalcMode, CellError, CellValue, Workbook};
use cellbind_xlsx::hooks::original_write_cell;
use cellbind_xlsx::{
    CellValueInjector, OutputMode, ValueCache, WriteCellHook, WriteOptions, XlsxError, XlsxReader,
    XlsxWriter,
};
use pretty_assertions::assert_eq;

fn sheet_xml(bytes: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name("xl/worksheets/sheet1.xml").unwrap();
    let mut s = String::new();
    file.read_to_string(&mut s).unwrap();
    s
}

fn mixed_workbook() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 42.0).unwrap();
    sheet.set_cell_value("B1", "Special: <>&\"'").unwrap();
    sheet.set_cell_value("C1", true).unwrap();
    sheet.set_cell_value("D1", CellError::Div0).unwrap();
    sheet.set_cell_value("E1", "  spaced  ").unwrap();
    sheet.set_cell_formula("A2", "=A1*2").unwrap();
    sheet.set_cell_formula("B2", "=A1+1").unwrap();
    sheet.set_formula_result("B2", CellValue::Number(43.0)).unwrap();
    wb
}

/// Every value kind survives a write and read
#[test]
fn test_roundtrip_values() {
    let mut buf = Vec::new();
    XlsxWriter::write(&mixed_workbook(), Cursor::new(&mut buf)).unwrap();

    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = wb.worksheet(0).unwrap();

    assert_eq!(sheet.get_value("A1").unwrap().as_number(), Some(42.0));
    assert_eq!(
        sheet.get_value("B1").unwrap().as_string(),
        Some("Special: <>&\"'")
    );
    assert_eq!(sheet.get_value("C1").unwrap(), CellValue::Boolean(true));
    assert_eq!(
        sheet.get_value("D1").unwrap(),
        CellValue::Error(CellError::Div0)
    );
    assert_eq!(sheet.get_value("E1").unwrap().as_string(), Some("  spaced  "));

    let a2 = sheet.get_value("A2").unwrap();
    assert_eq!(a2.formula_text(), Some("=A1*2"));
    assert_eq!(a2.cached_value(), None);
    assert_eq!(sheet.get_value("B2").unwrap().as_number(), Some(43.0));
}

/// Calculation settings are written into workbook.xml and read back
#[test]
fn test_roundtrip_calc_mode() {
    let mut wb = mixed_workbook();
    wb.settings_mut().calc_mode = CalcMode::Manual;

    let mut buf = Vec::new();
    XlsxWriter::write(&wb, Cursor::new(&mut buf)).unwrap();
    let wb2 = XlsxReader::read(Cursor::new(&buf)).unwrap();
    assert_eq!(wb2.settings().calc_mode, CalcMode::Manual);
}

/// An injector passed explicitly replaces formula results without touching
/// other cells
#[test]
fn test_injector_through_write_options() {
    let wb = mixed_workbook();
    let mut cache = ValueCache::new();
    cache.insert("Sheet1", "A2", 84).unwrap();
    cache.insert("Sheet1", "B2", " text ").unwrap();

    let original = WriteCellHook::from_object(original_write_cell()).unwrap();
    let options = WriteOptions {
        cell_hook: Some(CellValueInjector::new(Arc::new(cache), original).into_hook()),
        ..Default::default()
    };

    let mut plain = Vec::new();
    let mut injected = Vec::new();
    XlsxWriter::write(&wb, Cursor::new(&mut plain)).unwrap();
    XlsxWriter::write_with_options(&wb, Cursor::new(&mut injected), &options).unwrap();

    let xml = sheet_xml(&injected);
    assert!(xml.contains(r#"<c r="A2"><f>A1*2</f><v>84</v></c>"#));
    assert!(xml.contains(r#"<c r="B2" t="str"><f>A1+1</f><v xml:space="preserve"> text </v></c>"#));
    assert_eq!(xml.matches("<v").count(), sheet_xml(&plain).matches("<v").count() + 1);

    let row1 = |s: &str| s[s.find("<row r=\"1\"").unwrap()..s.find("</row>").unwrap()].to_string();
    assert_eq!(row1(&xml), row1(&sheet_xml(&plain)));

    let wb2 = XlsxReader::read(Cursor::new(&injected)).unwrap();
    let sheet = wb2.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A2").unwrap().as_number(), Some(84.0));
    assert_eq!(sheet.get_value("B2").unwrap().as_string(), Some(" text "));
    assert_eq!(sheet.get_value("B2").unwrap().formula_text(), Some("=A1+1"));
}

/// Streaming output cannot carry injected values
#[test]
fn test_injector_rejects_streaming_output() {
    let mut cache = ValueCache::new();
    cache.insert("Sheet1", "A2", 1).unwrap();
    let original = WriteCellHook::from_object(original_write_cell()).unwrap();
    let options = WriteOptions {
        mode: OutputMode::Streaming,
        cell_hook: Some(CellValueInjector::new(Arc::new(cache), original).into_hook()),
    };

    let err = XlsxWriter::write_with_options(&mixed_workbook(), Cursor::new(Vec::new()), &options)
        .unwrap_err();
    assert!(matches!(err, XlsxError::UnsupportedOutputMode { .. }));
}

/// Files on disk work the same as buffers
#[test]
fn test_write_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    XlsxWriter::write_file(&mixed_workbook(), &path).unwrap();

    let wb = XlsxReader::read_file(&path).unwrap();
    assert_eq!(wb.worksheet(0).unwrap().cell_count(), 7);
}
