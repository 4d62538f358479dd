//! Cell output sinks

use quick_xml::events::Event;
use quick_xml::Writer;

use crate::element::Element;
use crate::error::{XlsxError, XlsxResult};

/// How the worksheet serializer hands cells to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Cells are built as element trees and written whole
    #[default]
    Tree,
    /// Cells are written as raw XML events straight to the output
    Streaming,
}

/// Destination for the XML of one cell
pub trait CellSink {
    /// Output mode of this sink
    fn mode(&self) -> OutputMode;

    /// Write a complete cell element
    fn write_element(&mut self, element: &Element) -> XlsxResult<()>;

    /// Write one raw XML event
    fn write_event(&mut self, event: Event<'_>) -> XlsxResult<()>;
}

/// Sink writing into the worksheet's XML stream
pub struct XmlSink<'a> {
    writer: &'a mut Writer<Vec<u8>>,
    mode: OutputMode,
}

impl<'a> XmlSink<'a> {
    pub fn new(writer: &'a mut Writer<Vec<u8>>, mode: OutputMode) -> Self {
        Self { writer, mode }
    }
}

impl CellSink for XmlSink<'_> {
    fn mode(&self) -> OutputMode {
        self.mode
    }

    fn write_element(&mut self, element: &Element) -> XlsxResult<()> {
        element.write_to(self.writer)
    }

    fn write_event(&mut self, event: Event<'_>) -> XlsxResult<()> {
        self.writer.write_event(event)?;
        Ok(())
    }
}

/// Sink that keeps elements in memory instead of writing them
#[derive(Debug, Default)]
pub struct CaptureSink {
    elements: Vec<Element>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

impl CellSink for CaptureSink {
    fn mode(&self) -> OutputMode {
        OutputMode::Tree
    }

    fn write_element(&mut self, element: &Element) -> XlsxResult<()> {
        self.elements.push(element.clone());
        Ok(())
    }

    fn write_event(&mut self, _event: Event<'_>) -> XlsxResult<()> {
        Err(XlsxError::UnsupportedOutputMode {
            mode: OutputMode::Streaming,
            cell: "raw event written to a capturing sink".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::BytesText;

    #[test]
    fn test_xml_sink_writes_through() {
        let mut writer = Writer::new(Vec::new());
        {
            let mut sink = XmlSink::new(&mut writer, OutputMode::Streaming);
            assert_eq!(sink.mode(), OutputMode::Streaming);
            sink.write_element(&Element::new("c").with_attribute("r", "A1"))
                .unwrap();
            sink.write_event(Event::Text(BytesText::new("x"))).unwrap();
        }
        assert_eq!(writer.into_inner(), br#"<c r="A1"/>x"#.to_vec());
    }

    #[test]
    fn test_capture_sink_rejects_raw_events() {
        let mut sink = CaptureSink::new();
        sink.write_element(&Element::new("c")).unwrap();
        assert!(sink
            .write_event(Event::Text(BytesText::new("x")))
            .is_err());
        assert_eq!(sink.into_elements().len(), 1);
    }
}
