//! Cached value injection
//!
//! [`CellValueInjector`] wraps a write-cell hook. Cells without a cached value
//! go straight to the wrapped hook. For a cached cell the hook writes into a
//! [`CaptureSink`] instead; the captured `<c>` element gets the cached value
//! in its single `<v>` child and is then written to the real sink.

use std::sync::Arc;

use crate::element::Element;
use crate::error::{XlsxError, XlsxResult};
use crate::hooks::{CellContext, WriteCellHook};
use crate::sink::{CaptureSink, CellSink, OutputMode};
use crate::valuecache::{CachedValue, ValueCache};
use crate::writer::cell::needs_space_preserve;

/// Write-cell hook replacement that injects cached values
#[derive(Clone)]
pub struct CellValueInjector {
    cache: Arc<ValueCache>,
    original: WriteCellHook,
}

impl CellValueInjector {
    pub fn new(cache: Arc<ValueCache>, original: WriteCellHook) -> Self {
        Self { cache, original }
    }

    /// Write one cell, injecting its cached value if there is one
    pub fn write_cell(&self, sink: &mut dyn CellSink, cell: &CellContext<'_>) -> XlsxResult<()> {
        let Some(cached) = self.cache.get(cell.sheet, cell.address) else {
            return self.original.call(sink, cell);
        };

        if sink.mode() != OutputMode::Tree {
            return Err(XlsxError::UnsupportedOutputMode {
                mode: sink.mode(),
                cell: format!("{}!{}", cell.sheet, cell.address),
            });
        }

        let mut capture = CaptureSink::new();
        self.original.call(&mut capture, cell)?;

        for mut element in capture.into_elements() {
            if element.name == "c" {
                inject_cached_value(&mut element, cached);
                log::trace!(
                    "injected {:?} into {}!{}",
                    cached,
                    cell.sheet,
                    cell.address
                );
            }
            sink.write_element(&element)?;
        }
        Ok(())
    }

    /// Package as a hook with the same signature as the one it wraps
    pub fn into_hook(self) -> WriteCellHook {
        WriteCellHook::new(move |sink, cell| self.write_cell(sink, cell))
    }
}

/// Put `value` into the `<v>` child of a `<c>` element.
///
/// The first `<v>` is reused (or one is appended) and any inline string is
/// dropped, so the cell ends up with exactly one value. Text values mark the
/// cell `t="str"`; numbers and booleans clear the type.
pub fn inject_cached_value(cell: &mut Element, value: &CachedValue) {
    cell.remove_children("is");
    while cell.count("v") > 1 {
        if let Some(pos) = cell.children.iter().rposition(|c| c.name == "v") {
            cell.children.remove(pos);
        }
    }

    let text = value.canonical_text();
    let preserve = value.is_text() && needs_space_preserve(&text);

    if cell.find("v").is_none() {
        cell.sub_element("v");
    }
    if let Some(v) = cell.find_mut("v") {
        v.set_text(text);
        if preserve {
            v.set_attribute("xml:space", "preserve");
        } else {
            v.remove_attribute("xml:space");
        }
    }

    if value.is_text() {
        cell.set_attribute("t", "str");
    } else {
        cell.remove_attribute("t");
    }
}
