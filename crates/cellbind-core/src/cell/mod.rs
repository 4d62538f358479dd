//! Cell-related types
//!
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "B2")

mod address;
mod value;

pub use address::CellAddress;
pub use value::{CellError, CellValue};
