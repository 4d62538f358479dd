//! # cellbind-core
//!
//! Document model used by the cellbind writer and save pipeline.
//!
//! This crate provides:
//! - [`CellValue`] - Cell contents (numbers, strings, booleans, errors, formulas)
//! - [`CellAddress`] - A1-style cell addressing
//! - [`Workbook`], [`Worksheet`] - The document structures
//!
//! ## Example
//!
//! ```rust
//! use cellbind_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 40.0).unwrap();
//! sheet.set_cell_formula("B2", "=A1+2").unwrap();
//!
//! assert!(sheet.get_value("B2").unwrap().is_formula());
//! assert_eq!(sheet.get_value_at(0, 0), CellValue::Number(40.0));
//! ```

pub mod cell;
pub mod error;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellValue};
pub use error::{Error, Result};
pub use workbook::{CalcMode, Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
