//! XLSX reader
//!
//! Reads back what the writer produces (and the common subset other producers
//! write): sheet cells with shared, inline and `str` strings, numbers,
//! booleans, errors, formulas with their cached results and `calcPr`.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use ahash::AHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use cellbind_core::{CalcMode, CellAddress, CellError, CellValue, Workbook, WorkbookSettings, Worksheet};

/// XLSX file reader
pub struct XlsxReader;

/// Raw pieces of one `<c>` element
#[derive(Default)]
struct RawCell {
    reference: Option<String>,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
    inline: Option<String>,
}

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;

        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let (sheet_info, settings) = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut workbook = Workbook::empty();
        *workbook.settings_mut() = settings;

        for (name, r_id) in &sheet_info {
            let path = sheet_paths
                .get(r_id)
                .ok_or_else(|| XlsxError::MissingPart(format!("relationship {}", r_id)))?;
            let index = workbook.add_worksheet_with_name(name)?;
            let sheet = workbook
                .worksheet_mut(index)
                .ok_or_else(|| XlsxError::InvalidFormat(format!("sheet {} vanished", name)))?;
            Self::read_worksheet(&mut archive, path, sheet, &shared_strings)?;
        }

        log::debug!("read {} sheet(s)", workbook.sheet_count());
        Ok(workbook)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        let mut buf = Vec::new();
        let mut current = String::new();
        let mut in_si = false;
        let mut in_t = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"t" if in_si => in_t = true,
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current));
                        in_si = false;
                    }
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => current.push_str(&e.unescape()?),
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read sheet names, rIds and calculation settings from workbook.xml
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<(Vec<(String, String)>, WorkbookSettings)> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();
        let mut settings = WorkbookSettings::default();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"sheet" => {
                        let name = attr(&e, b"name");
                        let r_id = attr(&e, b"r:id");
                        if let (Some(name), Some(r_id)) = (name, r_id) {
                            sheets.push((name, r_id));
                        }
                    }
                    b"calcPr" => {
                        if let Some(mode) = attr(&e, b"calcMode") {
                            settings.calc_mode = CalcMode::from_xlsx(&mode).ok_or_else(|| {
                                XlsxError::Parse(format!("unknown calcMode '{}'", mode))
                            })?;
                        }
                        settings.full_calc_on_load = attr(&e, b"fullCalcOnLoad")
                            .map_or(false, |v| v == "1" || v == "true");
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok((sheets, settings))
    }

    /// Read workbook.xml.rels to get sheet file paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<AHashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = AHashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr(&e, b"Id");
                    let target = attr(&e, b"Target");
                    let rel_type = attr(&e, b"Type");

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Targets are relative to xl/ unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read the cells of one worksheet.
    ///
    /// Text is not trimmed: leading and trailing whitespace in values is data.
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        let mut buf = Vec::new();

        let mut cell: Option<RawCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_text = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"c" => cell = Some(RawCell::from_start(&e)),
                    b"v" => {
                        in_value = true;
                        if let Some(c) = cell.as_mut() {
                            c.value = Some(String::new());
                        }
                    }
                    b"f" => {
                        in_formula = true;
                        if let Some(c) = cell.as_mut() {
                            c.formula = Some(String::new());
                        }
                    }
                    b"t" => {
                        in_inline_text = true;
                        if let Some(c) = cell.as_mut() {
                            c.inline.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"c" => {
                        let raw = RawCell::from_start(&e);
                        Self::process_cell(worksheet, raw, shared_strings)?;
                    }
                    b"v" => {
                        if let Some(c) = cell.as_mut() {
                            c.value = Some(String::new());
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(raw) = cell.take() {
                            Self::process_cell(worksheet, raw, shared_strings)?;
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(c) = cell.as_mut() {
                        let target = if in_value {
                            c.value.as_mut()
                        } else if in_formula {
                            c.formula.as_mut()
                        } else if in_inline_text {
                            c.inline.as_mut()
                        } else {
                            None
                        };
                        if let Some(target) = target {
                            target.push_str(&e.unescape()?);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    /// Convert a raw cell and store it in the worksheet
    fn process_cell(
        worksheet: &mut Worksheet,
        raw: RawCell,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let reference = raw
            .reference
            .as_deref()
            .ok_or_else(|| XlsxError::Parse("cell without a reference".into()))?;
        let addr = CellAddress::parse(reference).map_err(|e| {
            XlsxError::Parse(format!("Invalid cell reference '{}': {}", reference, e))
        })?;
        let cell_type = raw.cell_type.as_deref();

        let value = if let Some(formula) = raw.formula {
            let cached = match raw.value.as_deref() {
                Some(v) => Self::scalar(cell_type, v, shared_strings)?,
                None => None,
            };
            let text = if formula.starts_with('=') {
                formula
            } else {
                format!("={}", formula)
            };
            CellValue::Formula {
                text,
                cached_value: cached.map(Box::new),
            }
        } else if let Some(inline) = raw.inline {
            CellValue::String(inline)
        } else if let Some(v) = raw.value.as_deref() {
            Self::scalar(cell_type, v, shared_strings)?.unwrap_or_default()
        } else {
            CellValue::Empty
        };

        worksheet.set_cell_value_at(addr.row, addr.col, value)?;
        Ok(())
    }

    /// Decode the `<v>` text of a cell according to its type
    fn scalar(
        cell_type: Option<&str>,
        value: &str,
        shared_strings: &[String],
    ) -> XlsxResult<Option<CellValue>> {
        let decoded = match cell_type {
            Some("s") => {
                let idx: usize = value.parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                Some(CellValue::String(s.clone()))
            }
            Some("b") => Some(CellValue::Boolean(
                value == "1" || value.eq_ignore_ascii_case("true"),
            )),
            Some("e") => Some(
                CellError::parse(value)
                    .map(CellValue::Error)
                    .unwrap_or_else(|| CellValue::String(value.to_string())),
            ),
            Some("str") | Some("inlineStr") => Some(CellValue::String(value.to_string())),
            None | Some("n") => value.trim().parse::<f64>().ok().map(CellValue::Number),
            Some(_) => Some(CellValue::String(value.to_string())),
        };
        Ok(decoded)
    }
}

impl RawCell {
    fn from_start(e: &BytesStart<'_>) -> Self {
        Self {
            reference: attr(e, b"r"),
            cell_type: attr(e, b"t"),
            ..Default::default()
        }
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
