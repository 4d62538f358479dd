//! Save with cached formula values
//!
//! Rebinds every `write_cell` slot of the XLSX writer to a
//! [`CellValueInjector`] for the duration of exactly one save, then puts the
//! original hook back.
//!
//! # Example
//!
//! ```rust
//! use cellbind::prelude::*;
//! use cellbind::save::write_with_cache;
//! use std::io::Cursor;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_formula("B2", "=A1*2").unwrap();
//!
//! let mut values = ValueCache::new();
//! values.insert("Sheet1", "B2", 42).unwrap();
//!
//! let mut buf = Vec::new();
//! write_with_cache(&workbook, Cursor::new(&mut buf), &values, &SaveOptions::default()).unwrap();
//!
//! let reloaded = XlsxReader::read(Cursor::new(&buf)).unwrap();
//! let b2 = reloaded.worksheet(0).unwrap().get_value("B2").unwrap();
//! assert_eq!(b2.as_number(), Some(42.0));
//! assert_eq!(b2.formula_text(), Some("=A1*2"));
//! ```

use std::io::{Cursor, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use cellbind_core::Workbook;
use cellbind_rebind::{locate_from, with_override, BindingCache, BindingSet};
use cellbind_xlsx::hooks::{lock_for_override, package};
use cellbind_xlsx::{
    CellValueInjector, OutputMode, ValueCache, ValueCacheKey, WriteCellHook, WriteOptions,
    XlsxError, XlsxResult, XlsxWriter,
};

/// Options for [`save_with_cache_with_options`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions<'a> {
    /// Reuse slot lookups across saves
    pub binding_cache: Option<&'a BindingCache>,
    /// Output mode for the writer; only [`OutputMode::Tree`] supports
    /// injection
    pub mode: OutputMode,
}

/// Save `workbook` to `path` with cached values injected
pub fn save_with_cache<P: AsRef<Path>>(
    workbook: &Workbook,
    path: P,
    values: &ValueCache,
) -> XlsxResult<()> {
    save_with_cache_with_options(workbook, path, values, &SaveOptions::default())
}

/// Save `workbook` to `path` with cached values injected, with options.
///
/// The package is built in memory first; `path` is only touched once the
/// whole save has succeeded.
pub fn save_with_cache_with_options<P: AsRef<Path>>(
    workbook: &Workbook,
    path: P,
    values: &ValueCache,
    options: &SaveOptions<'_>,
) -> XlsxResult<()> {
    let mut buf = Cursor::new(Vec::new());
    write_with_cache(workbook, &mut buf, values, options)?;
    std::fs::write(path, buf.into_inner())?;
    Ok(())
}

/// Write `workbook` to `writer` with cached values injected.
///
/// Keys naming cells the workbook does not have are ignored. Any other
/// mode than [`OutputMode::Tree`] fails before anything is written when a
/// key names an existing cell.
pub fn write_with_cache<W: Write + Seek>(
    workbook: &Workbook,
    writer: W,
    values: &ValueCache,
    options: &SaveOptions<'_>,
) -> XlsxResult<()> {
    check_output_mode(workbook, values, options.mode)?;

    // Plain writers wait while the slots hold the injector.
    let slots = lock_for_override();

    let package = package();
    let target = package.original();
    let original = WriteCellHook::from_object(target).ok_or_else(|| {
        XlsxError::Lookup(format!("{:?} is not a write-cell hook", target))
    })?;

    let bindings = write_cell_bindings(options.binding_cache)?;
    log_ignored_keys(workbook, values);

    let replacement = CellValueInjector::new(Arc::new(values.clone()), original)
        .into_hook()
        .into_object();
    let write_options = WriteOptions {
        mode: options.mode,
        cell_hook: None,
    };

    with_override(target, &replacement, &bindings, || {
        XlsxWriter::write_with_override(workbook, writer, &write_options, &slots)
    })
}

fn check_output_mode(
    workbook: &Workbook,
    values: &ValueCache,
    mode: OutputMode,
) -> XlsxResult<()> {
    if mode == OutputMode::Tree {
        return Ok(());
    }
    match values.iter().find(|(key, _)| names_cell(workbook, key)) {
        Some((key, _)) => Err(XlsxError::UnsupportedOutputMode {
            mode,
            cell: key.to_string(),
        }),
        None => Ok(()),
    }
}

fn names_cell(workbook: &Workbook, key: &ValueCacheKey) -> bool {
    workbook
        .worksheet_by_name(key.sheet())
        .map_or(false, |sheet| sheet.contains(&key.address()))
}

fn write_cell_bindings(cache: Option<&BindingCache>) -> XlsxResult<BindingSet> {
    let package = package();
    let bindings = match cache {
        Some(cache) => cache.lookup_or_compute(package.root(), package.original())?,
        None => locate_from(package.root(), package.original())?,
    };
    if bindings.is_empty() {
        return Err(XlsxError::Lookup(format!(
            "no slot under `{}` holds the write-cell hook",
            package.root().name()
        )));
    }
    Ok(bindings)
}

fn log_ignored_keys(workbook: &Workbook, values: &ValueCache) {
    let ignored = values
        .iter()
        .filter(|(key, _)| !names_cell(workbook, key))
        .count();
    if ignored > 0 {
        log::debug!("{} cached value(s) name cells not in the workbook", ignored);
    }
}
