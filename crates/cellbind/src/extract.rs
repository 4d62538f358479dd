//! Building a [`ValueCache`] from the formula cells of a workbook

use cellbind_core::{CellAddress, Workbook};
use cellbind_xlsx::{CachedValue, ValueCache, ValueCacheKey};

/// Evaluate every formula cell with `evaluator` and collect the results.
///
/// The evaluator gets the sheet name, the cell address and the formula text
/// (with its leading `=`). Cells it returns `None` for are left out.
pub fn collect_formula_values<F>(workbook: &Workbook, mut evaluator: F) -> ValueCache
where
    F: FnMut(&str, CellAddress, &str) -> Option<CachedValue>,
{
    let mut values = ValueCache::new();
    for sheet in workbook.worksheets() {
        for (address, formula) in sheet.formula_cells() {
            match evaluator(sheet.name(), address, formula) {
                Some(value) => {
                    let key = ValueCacheKey::new(sheet.name(), address);
                    if let Err(e) = values.insert_key(key, value) {
                        log::warn!("skipping value: {}", e);
                    }
                }
                None => log::trace!("no value for {}!{}", sheet.name(), address),
            }
        }
    }
    log::debug!("collected {} formula value(s)", values.len());
    values
}

/// Results already stored on formula cells
pub fn cached_formula_values(workbook: &Workbook) -> ValueCache {
    let mut values = ValueCache::new();
    for sheet in workbook.worksheets() {
        for (address, value) in sheet.iter_cells() {
            if value.formula_text().is_none() {
                continue;
            }
            if let Some(cached) = CachedValue::from_cell_value(value) {
                let key = ValueCacheKey::new(sheet.name(), address);
                if let Err(e) = values.insert_key(key, cached) {
                    log::warn!("skipping stored result: {}", e);
                }
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbind_core::CellValue;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 2.0).unwrap();
        sheet.set_cell_formula("B1", "=A1*2").unwrap();
        sheet.set_cell_formula("C1", "=NOW()").unwrap();
        sheet
            .set_formula_result("C1", CellValue::string("later"))
            .unwrap();
        wb
    }

    #[test]
    fn test_collect_calls_evaluator_per_formula() {
        let mut seen = Vec::new();
        let values = collect_formula_values(&workbook(), |sheet, address, formula| {
            seen.push(format!("{}!{}={}", sheet, address, formula));
            (formula == "=A1*2").then(|| CachedValue::from(4))
        });

        seen.sort();
        assert_eq!(seen, vec!["Sheet1!B1==A1*2", "Sheet1!C1==NOW()"]);
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get("Sheet1", CellAddress::parse("B1").unwrap()),
            Some(&CachedValue::Number(4.0))
        );
    }

    #[test]
    fn test_collect_skips_non_finite_results() {
        let values = collect_formula_values(&workbook(), |_, _, formula| {
            Some(match formula {
                "=A1*2" => CachedValue::Number(f64::NAN),
                _ => CachedValue::from("ok"),
            })
        });
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("Sheet1", CellAddress::parse("B1").unwrap()), None);
    }

    #[test]
    fn test_cached_formula_values_skips_plain_cells() {
        let values = cached_formula_values(&workbook());
        assert_eq!(values.len(), 1);
        assert_eq!(
            values.get("Sheet1", CellAddress::parse("C1").unwrap()),
            Some(&CachedValue::from("later"))
        );
    }
}
