//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
///
/// Cells are stored sparsely and iterate in row-major order, which is the
/// order they are serialized in.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<CellAddress, CellValue>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Cell Access ===

    /// Get a cell value by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellValue>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(&addr))
    }

    /// Get a cell value by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&CellAddress::new(row, col))
    }

    /// Get cell value, `Empty` when the cell does not exist
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        Ok(self.cell(address)?.cloned().unwrap_or_default())
    }

    /// Get cell value by indices, `Empty` when the cell does not exist
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col).cloned().unwrap_or_default()
    }

    /// Check whether a cell exists (including explicitly empty cells)
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.cells.contains_key(addr)
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        self.cells.insert(CellAddress::new(row, col), value.into());
        Ok(())
    }

    /// Set a cell formula by address string; a missing leading `=` is added
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.set_cell_value_at(addr.row, addr.col, CellValue::formula(formula))
    }

    /// Store the calculated result of a formula cell
    pub fn set_formula_result(&mut self, address: &str, value: CellValue) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        match self.cells.get_mut(&addr) {
            Some(CellValue::Formula { cached_value, .. }) => {
                *cached_value = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::NotAFormula(addr.to_a1_string())),
        }
    }

    /// Remove a cell
    pub fn clear_cell(&mut self, address: &str) -> Result<Option<CellValue>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.remove(&addr))
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the worksheet has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellAddress, &CellValue)> {
        self.cells.iter().map(|(addr, value)| (*addr, value))
    }

    /// Iterate over formula cells: (address, formula text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> {
        self.iter_cells()
            .filter_map(|(addr, value)| value.formula_text().map(|text| (addr, text)))
    }

    fn validate_cell_position(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}
