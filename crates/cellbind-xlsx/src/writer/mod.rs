//! XLSX writer

pub mod cell;

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::XlsxResult;
use crate::hooks::{
    current_write_cell, lock_shared, CellContext, HookOverrideGuard, WriteCellHook,
};
use crate::sink::{OutputMode, XmlSink};
use cellbind_core::{CalcMode, Workbook, Worksheet};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Options for [`XlsxWriter::write_with_options`]
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// How cells reach the worksheet XML
    pub mode: OutputMode,
    /// Hook to use instead of the one bound in the `writer` module
    pub cell_hook: Option<WriteCellHook>,
}

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        Self::write_file_with_options(workbook, path, &WriteOptions::default())
    }

    /// Write a workbook to a file path with options
    pub fn write_file_with_options<P: AsRef<Path>>(
        workbook: &Workbook,
        path: P,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write_with_options(workbook, file, options)
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        Self::write_with_options(workbook, writer, &WriteOptions::default())
    }

    /// Write a workbook to a writer with options.
    ///
    /// Without an explicit [`WriteOptions::cell_hook`] the hook bound in the
    /// `writer` module is used, and no rebinding of it can start until the
    /// write is done.
    pub fn write_with_options<W: Write + Seek>(
        workbook: &Workbook,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        if options.cell_hook.is_some() {
            return Self::write_package(workbook, writer, options);
        }
        let _slots = lock_shared();
        Self::write_package(workbook, writer, options)
    }

    /// Write a workbook while the caller holds the slots exclusively, so the
    /// hook it bound is the one used
    pub fn write_with_override<W: Write + Seek>(
        workbook: &Workbook,
        writer: W,
        options: &WriteOptions,
        _slots: &HookOverrideGuard,
    ) -> XlsxResult<()> {
        Self::write_package(workbook, writer, options)
    }

    fn write_package<W: Write + Seek>(
        workbook: &Workbook,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);

        Self::write_content_types(&mut zip, workbook)?;
        Self::write_root_rels(&mut zip)?;
        Self::write_workbook_xml(&mut zip, workbook)?;
        Self::write_workbook_rels(&mut zip, workbook)?;
        Self::write_styles_xml(&mut zip)?;

        for (i, sheet) in workbook.worksheets().enumerate() {
            // The hook is resolved once per sheet so a rebinding applies to
            // whole sheets only.
            let hook = match &options.cell_hook {
                Some(hook) => hook.clone(),
                None => current_write_cell()?,
            };
            let xml = Self::worksheet_xml(sheet, &hook, options.mode)?;

            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
            zip.write_all(&xml)?;
        }

        zip.finish()?;
        log::debug!(
            "wrote {} sheet(s) in {:?} mode",
            workbook.sheet_count(),
            options.mode
        );
        Ok(())
    }

    fn write_content_types<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        content.push_str("\n</Types>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_root_rels<W: Write + Seek>(zip: &mut zip::ZipWriter<W>) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("_rels/.rels", options)?;

        let content = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_workbook_xml<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/workbook.xml", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
        );

        for (i, sheet) in workbook.worksheets().enumerate() {
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_attr(sheet.name()),
                i + 1,
                i + 1
            ));
        }

        content.push_str("\n    </sheets>");
        content.push_str(&Self::calc_pr(workbook));
        content.push_str("\n</workbook>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn calc_pr(workbook: &Workbook) -> String {
        let settings = workbook.settings();
        let mut calc_pr = String::from("\n    <calcPr calcId=\"191029\"");
        if settings.calc_mode != CalcMode::Auto {
            calc_pr.push_str(&format!(" calcMode=\"{}\"", settings.calc_mode.as_xlsx()));
        }
        if settings.full_calc_on_load {
            calc_pr.push_str(" fullCalcOnLoad=\"1\"");
        }
        calc_pr.push_str("/>");
        calc_pr
    }

    fn write_workbook_rels<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            workbook.sheet_count() + 1
        ));

        content.push_str("\n</Relationships>");

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Minimal stylesheet: one font, the two mandatory fills, one border, one xf
    fn write_styles_xml<W: Write + Seek>(zip: &mut zip::ZipWriter<W>) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/styles.xml", options)?;

        let content = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
    <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
    <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
    <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
    <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
    <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Serialize one worksheet, emitting every cell through `hook`
    fn worksheet_xml(sheet: &Worksheet, hook: &WriteCellHook, mode: OutputMode) -> XlsxResult<Vec<u8>> {
        let mut xml = Writer::new(Vec::new());
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut root = BytesStart::new("worksheet");
        root.push_attribute(("xmlns", MAIN_NS));
        xml.write_event(Event::Start(root))?;

        if sheet.is_empty() {
            xml.write_event(Event::Empty(BytesStart::new("sheetData")))?;
        } else {
            xml.write_event(Event::Start(BytesStart::new("sheetData")))?;

            // Cells iterate row-major
            let mut current_row: Option<u32> = None;
            for (address, value) in sheet.iter_cells() {
                if current_row != Some(address.row) {
                    if current_row.is_some() {
                        xml.write_event(Event::End(BytesEnd::new("row")))?;
                    }
                    let mut row = BytesStart::new("row");
                    row.push_attribute(("r", (address.row + 1).to_string().as_str()));
                    xml.write_event(Event::Start(row))?;
                    current_row = Some(address.row);
                }

                let cell = CellContext {
                    sheet: sheet.name(),
                    address,
                    value,
                };
                hook.call(&mut XmlSink::new(&mut xml, mode), &cell)?;
            }

            if current_row.is_some() {
                xml.write_event(Event::End(BytesEnd::new("row")))?;
            }
            xml.write_event(Event::End(BytesEnd::new("sheetData")))?;
        }

        xml.write_event(Event::End(BytesEnd::new("worksheet")))?;
        Ok(xml.into_inner())
    }
}

fn escape_attr(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::sink::CellSink;
    use std::io::{Cursor, Read};

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_formula("B2", "=A1*2").unwrap();
        wb
    }

    #[test]
    fn test_package_parts() {
        let mut buf = Vec::new();
        XlsxWriter::write(&sample(), Cursor::new(&mut buf)).unwrap();

        let sheet = part(&buf, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<row r="1"><c r="A1"><v>1</v></c></row>"#));
        assert!(sheet.contains(r#"<row r="2"><c r="B2"><f>A1*2</f></c></row>"#));

        let workbook = part(&buf, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="Sheet1" sheetId="1" r:id="rId1"/>"#));
        assert!(!workbook.contains("calcMode"));
        assert!(part(&buf, "[Content_Types].xml").contains("/xl/worksheets/sheet1.xml"));
    }

    #[test]
    fn test_calc_pr() {
        let mut wb = sample();
        wb.settings_mut().calc_mode = CalcMode::Manual;
        wb.settings_mut().full_calc_on_load = true;

        let mut buf = Vec::new();
        XlsxWriter::write(&wb, Cursor::new(&mut buf)).unwrap();
        assert!(part(&buf, "xl/workbook.xml")
            .contains(r#"<calcPr calcId="191029" calcMode="manual" fullCalcOnLoad="1"/>"#));
    }

    #[test]
    fn test_streaming_mode_matches_tree_mode() {
        let wb = sample();
        let mut tree = Vec::new();
        let mut streaming = Vec::new();
        XlsxWriter::write(&wb, Cursor::new(&mut tree)).unwrap();
        let options = WriteOptions {
            mode: OutputMode::Streaming,
            ..Default::default()
        };
        XlsxWriter::write_with_options(&wb, Cursor::new(&mut streaming), &options).unwrap();

        assert_eq!(
            part(&tree, "xl/worksheets/sheet1.xml"),
            part(&streaming, "xl/worksheets/sheet1.xml")
        );
    }

    #[test]
    fn test_injected_hook_is_used() {
        let hook = WriteCellHook::new(|sink: &mut dyn CellSink, cell: &CellContext<'_>| {
            sink.write_element(
                &Element::new("c")
                    .with_attribute("r", cell.address.to_a1_string())
                    .with_child(Element::new("v").with_text("7")),
            )
        });
        let options = WriteOptions {
            cell_hook: Some(hook),
            ..Default::default()
        };

        let mut buf = Vec::new();
        XlsxWriter::write_with_options(&sample(), Cursor::new(&mut buf), &options).unwrap();
        let sheet = part(&buf, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A1"><v>7</v></c>"#));
        assert!(sheet.contains(r#"<c r="B2"><v>7</v></c>"#));
    }

    #[test]
    fn test_empty_sheet() {
        let mut buf = Vec::new();
        XlsxWriter::write(&Workbook::new(), Cursor::new(&mut buf)).unwrap();
        assert!(part(&buf, "xl/worksheets/sheet1.xml").contains("<sheetData/>"));
    }
}
