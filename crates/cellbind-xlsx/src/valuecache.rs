//! Precomputed cell results keyed by (sheet, address)

use std::fmt;

use ahash::AHashMap;
use cellbind_core::{CellAddress, CellValue};

use crate::error::{XlsxError, XlsxResult};

/// Identity of one cell in one workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueCacheKey {
    sheet: String,
    address: CellAddress,
}

impl ValueCacheKey {
    pub fn new<S: Into<String>>(sheet: S, address: CellAddress) -> Self {
        Self {
            sheet: sheet.into(),
            address,
        }
    }

    /// Build a key from an A1 reference (`"B2"`, `"$b$2"`, ...)
    pub fn parse<S: Into<String>>(sheet: S, address: &str) -> XlsxResult<Self> {
        Ok(Self::new(sheet, CellAddress::parse(address)?))
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn address(&self) -> CellAddress {
        self.address
    }
}

impl fmt::Display for ValueCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.address)
    }
}

/// A scalar to store as a formula's cached result
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl CachedValue {
    /// Text written into the `<v>` element
    pub fn canonical_text(&self) -> String {
        match self {
            CachedValue::Text(s) => s.clone(),
            CachedValue::Number(n) => n.to_string(),
            CachedValue::Boolean(true) => "1".to_string(),
            CachedValue::Boolean(false) => "0".to_string(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CachedValue::Text(_))
    }

    /// NaN and infinities have no spreadsheet representation
    pub fn is_finite(&self) -> bool {
        match self {
            CachedValue::Number(n) => n.is_finite(),
            CachedValue::Text(_) | CachedValue::Boolean(_) => true,
        }
    }

    /// Scalar form of a cell value; formulas yield their stored result
    pub fn from_cell_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::String(s) => Some(CachedValue::Text(s.clone())),
            CellValue::Number(n) => Some(CachedValue::Number(*n)),
            CellValue::Boolean(b) => Some(CachedValue::Boolean(*b)),
            CellValue::Formula {
                cached_value: Some(v),
                ..
            } => Self::from_cell_value(v),
            CellValue::Empty | CellValue::Error(_) | CellValue::Formula { .. } => None,
        }
    }
}

impl From<f64> for CachedValue {
    fn from(n: f64) -> Self {
        CachedValue::Number(n)
    }
}

impl From<i32> for CachedValue {
    fn from(n: i32) -> Self {
        CachedValue::Number(n as f64)
    }
}

impl From<bool> for CachedValue {
    fn from(b: bool) -> Self {
        CachedValue::Boolean(b)
    }
}

impl From<&str> for CachedValue {
    fn from(s: &str) -> Self {
        CachedValue::Text(s.to_string())
    }
}

impl From<String> for CachedValue {
    fn from(s: String) -> Self {
        CachedValue::Text(s)
    }
}

/// Map from cell identity to the value to inject
#[derive(Debug, Clone, Default)]
pub struct ValueCache {
    sheets: AHashMap<String, AHashMap<CellAddress, CachedValue>>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert by sheet name and A1 reference; non-finite numbers are rejected
    pub fn insert<V: Into<CachedValue>>(
        &mut self,
        sheet: &str,
        address: &str,
        value: V,
    ) -> XlsxResult<Option<CachedValue>> {
        let key = ValueCacheKey::parse(sheet, address)?;
        self.insert_key(key, value.into())
    }

    pub fn insert_key(
        &mut self,
        key: ValueCacheKey,
        value: CachedValue,
    ) -> XlsxResult<Option<CachedValue>> {
        if !value.is_finite() {
            return Err(XlsxError::InvalidValue(format!(
                "{} cannot be stored for {}",
                value.canonical_text(),
                key
            )));
        }
        Ok(self
            .sheets
            .entry(key.sheet)
            .or_default()
            .insert(key.address, value))
    }

    /// Build a cache from entries, failing on the first rejected value
    pub fn from_entries<I>(entries: I) -> XlsxResult<Self>
    where
        I: IntoIterator<Item = (ValueCacheKey, CachedValue)>,
    {
        let mut cache = ValueCache::new();
        for (key, value) in entries {
            cache.insert_key(key, value)?;
        }
        Ok(cache)
    }

    pub fn get(&self, sheet: &str, address: CellAddress) -> Option<&CachedValue> {
        self.sheets.get(sheet)?.get(&address)
    }

    pub fn contains(&self, sheet: &str, address: CellAddress) -> bool {
        self.get(sheet, address).is_some()
    }

    pub fn remove(&mut self, sheet: &str, address: CellAddress) -> Option<CachedValue> {
        let cells = self.sheets.get_mut(sheet)?;
        let removed = cells.remove(&address);
        if cells.is_empty() {
            self.sheets.remove(sheet);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sheets.values().map(|cells| cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Entries in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (ValueCacheKey, &CachedValue)> {
        self.sheets.iter().flat_map(|(sheet, cells)| {
            cells
                .iter()
                .map(move |(address, value)| (ValueCacheKey::new(sheet.as_str(), *address), value))
        })
    }
}
