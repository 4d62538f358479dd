//! Default encoding of a single `<c>` element

use cellbind_core::CellValue;

use crate::element::Element;
use crate::error::{XlsxError, XlsxResult};
use crate::hooks::CellContext;
use crate::sink::{CellSink, OutputMode};

/// Write one cell in its default encoding.
///
/// Tree sinks receive the whole element; streaming sinks receive its events
/// one by one.
pub fn write_cell(sink: &mut dyn CellSink, cell: &CellContext<'_>) -> XlsxResult<()> {
    if let Some(n) = non_finite_number(cell.value) {
        return Err(XlsxError::InvalidValue(format!(
            "{} in {}!{}",
            n, cell.sheet, cell.address
        )));
    }
    let element = cell_element(cell);
    match sink.mode() {
        OutputMode::Tree => sink.write_element(&element),
        OutputMode::Streaming => element.emit(&mut |event| sink.write_event(event)),
    }
}

/// Build the `<c>` element for a cell
pub fn cell_element(cell: &CellContext<'_>) -> Element {
    let mut c = Element::new("c").with_attribute("r", cell.address.to_a1_string());

    match cell.value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            c.sub_element("v").set_text(n.to_string());
        }
        CellValue::Boolean(b) => {
            c.set_attribute("t", "b");
            c.sub_element("v").set_text(bool_text(*b));
        }
        CellValue::Error(e) => {
            c.set_attribute("t", "e");
            c.sub_element("v").set_text(e.as_str());
        }
        CellValue::String(s) => {
            c.set_attribute("t", "inlineStr");
            let t = c.sub_element("is").sub_element("t");
            if needs_space_preserve(s) {
                t.set_attribute("xml:space", "preserve");
            }
            t.set_text(s.as_str());
        }
        CellValue::Formula { text, cached_value } => {
            let formula = text.strip_prefix('=').unwrap_or(text);
            c.sub_element("f").set_text(formula);
            if let Some(cached) = cached_value.as_deref() {
                write_formula_result(&mut c, cached);
            }
        }
    }

    c
}

fn write_formula_result(c: &mut Element, cached: &CellValue) {
    let (kind, text) = match cached {
        CellValue::Number(n) => (None, n.to_string()),
        CellValue::Boolean(b) => (Some("b"), bool_text(*b).to_string()),
        CellValue::Error(e) => (Some("e"), e.as_str().to_string()),
        CellValue::String(s) => (Some("str"), s.clone()),
        CellValue::Empty | CellValue::Formula { .. } => return,
    };
    if let Some(kind) = kind {
        c.set_attribute("t", kind);
    }
    c.sub_element("v").set_text(text);
}

/// NaN or an infinity stored as the value or the formula result
fn non_finite_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if !n.is_finite() => Some(*n),
        CellValue::Formula {
            cached_value: Some(cached),
            ..
        } => non_finite_number(cached),
        _ => None,
    }
}

fn bool_text(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Whether text needs `xml:space="preserve"` to survive a round trip.
///
/// Empty text is included: some consumers drop empty text nodes otherwise.
pub fn needs_space_preserve(s: &str) -> bool {
    s.is_empty()
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbind_core::{CellAddress, CellError};
    use pretty_assertions::assert_eq;

    fn xml(value: CellValue) -> String {
        let cell = CellContext {
            sheet: "Sheet1",
            address: CellAddress::new(1, 1),
            value: &value,
        };
        cell_element(&cell).to_xml_string().unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(xml(CellValue::Number(42.0)), r#"<c r="B2"><v>42</v></c>"#);
        assert_eq!(xml(CellValue::Number(0.5)), r#"<c r="B2"><v>0.5</v></c>"#);
        assert_eq!(
            xml(CellValue::Boolean(true)),
            r#"<c r="B2" t="b"><v>1</v></c>"#
        );
        assert_eq!(
            xml(CellValue::Error(CellError::Div0)),
            r#"<c r="B2" t="e"><v>#DIV/0!</v></c>"#
        );
        assert_eq!(xml(CellValue::Empty), r#"<c r="B2"/>"#);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            xml(CellValue::string("hi")),
            r#"<c r="B2" t="inlineStr"><is><t>hi</t></is></c>"#
        );
        assert_eq!(
            xml(CellValue::string(" padded")),
            r#"<c r="B2" t="inlineStr"><is><t xml:space="preserve"> padded</t></is></c>"#
        );
    }

    #[test]
    fn test_formulas() {
        assert_eq!(xml(CellValue::formula("=A1+1")), r#"<c r="B2"><f>A1+1</f></c>"#);
        assert_eq!(
            xml(CellValue::Formula {
                text: "=A1".into(),
                cached_value: Some(Box::new(CellValue::Number(3.0))),
            }),
            r#"<c r="B2"><f>A1</f><v>3</v></c>"#
        );
        assert_eq!(
            xml(CellValue::Formula {
                text: "=A1".into(),
                cached_value: Some(Box::new(CellValue::string("x"))),
            }),
            r#"<c r="B2" t="str"><f>A1</f><v>x</v></c>"#
        );
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let mut writer = quick_xml::Writer::new(Vec::new());
        let mut sink = crate::sink::XmlSink::new(&mut writer, OutputMode::Tree);
        let nan_result = CellValue::Formula {
            text: "=0/0".into(),
            cached_value: Some(Box::new(CellValue::Number(f64::NAN))),
        };
        for value in [CellValue::Number(f64::INFINITY), nan_result] {
            let cell = CellContext {
                sheet: "Sheet1",
                address: CellAddress::new(0, 0),
                value: &value,
            };
            assert!(matches!(
                write_cell(&mut sink, &cell),
                Err(XlsxError::InvalidValue(_))
            ));
        }
        drop(sink);
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_space_preserve_rule() {
        assert!(needs_space_preserve(""));
        assert!(needs_space_preserve(" a"));
        assert!(needs_space_preserve("a\n"));
        assert!(!needs_space_preserve("a b"));
    }
}
