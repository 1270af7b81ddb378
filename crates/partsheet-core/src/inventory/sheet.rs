use std::io::Cursor;
use std::str::FromStr;

use calamine::{Data, Reader, Xlsx};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PartsheetError;
use crate::inventory::normalize_stock_number;

pub const STOCK_NUMBER_COLUMN: &str = "Stock #";
pub const PRICE_COLUMN: &str = "Value";
/// Title rows above the header row of the exported price list.
pub const SKIP_ROWS: u32 = 4;

/// One priced row of the price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRow {
    pub stock_number: String,
    pub price: Decimal,
}

/// Read stock numbers and prices from the first worksheet. Row `skip_rows`
/// (0-based) holds the column names.
pub fn read_price_sheet(bytes: &[u8], skip_rows: u32) -> Result<Vec<PriceRow>, PartsheetError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;

    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PartsheetError::Spreadsheet("workbook has no worksheets".into()))??;

    let (Some((_, first_col)), Some((last_row, last_col))) = (sheet.start(), sheet.end()) else {
        return Err(missing_columns(Vec::new()));
    };

    let header_row = skip_rows;
    let headers: Vec<(u32, String)> = (first_col..=last_col)
        .filter_map(|col| {
            sheet
                .get_value((header_row, col))
                .and_then(cell_as_string)
                .map(|name| (col, name))
        })
        .collect();
    let find = |name: &str| headers.iter().find(|(_, h)| h == name).map(|(c, _)| *c);

    let (Some(stock_col), Some(price_col)) = (find(STOCK_NUMBER_COLUMN), find(PRICE_COLUMN)) else {
        return Err(missing_columns(headers.into_iter().map(|(_, h)| h).collect()));
    };

    let mut rows = Vec::new();
    for row in header_row + 1..=last_row {
        let stock = sheet.get_value((row, stock_col)).and_then(cell_as_string);
        let price_cell = sheet.get_value((row, price_col));
        let (Some(stock), Some(price_cell)) = (stock, price_cell) else {
            continue;
        };
        match cell_as_decimal(price_cell) {
            Some(price) => rows.push(PriceRow {
                stock_number: normalize_stock_number(&stock),
                price,
            }),
            None if matches!(price_cell, Data::Empty) => {}
            None => warn!(row = row + 1, "skipping non-numeric price '{price_cell}' for {stock}"),
        }
    }

    debug!(rows = rows.len(), "read price sheet");
    Ok(rows)
}

fn missing_columns(available: Vec<String>) -> PartsheetError {
    PartsheetError::MissingColumns {
        stock: STOCK_NUMBER_COLUMN.into(),
        price: PRICE_COLUMN.into(),
        available,
    }
}

fn cell_as_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Empty => None,
        _ => Some(format!("{cell}")),
    }
}

fn cell_as_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Float(f) => Some(f64_to_decimal(*f)),
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::String(s) => Decimal::from_str(&s.trim().replace(',', "")).ok(),
        _ => None,
    }
}

/// Convert through the shortest decimal representation so that 19.99 stays
/// 19.99 instead of picking up binary noise.
fn f64_to_decimal(f: f64) -> Decimal {
    format!("{f}")
        .parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use rust_xlsxwriter::Workbook;

    fn price_list(headers: &[&str]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Inventory valuation").unwrap();
        sheet.write_string(1, 0, "As of today").unwrap();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(4, col as u16, *header).unwrap();
        }
        sheet.write_number(5, 0, 4711.0).unwrap();
        sheet.write_string(5, 1, "Hydraulic pump").unwrap();
        sheet.write_number(5, 2, 19.99).unwrap();
        sheet.write_string(6, 0, "B-12").unwrap();
        sheet.write_string(6, 2, "1,250.00").unwrap();
        // No price: skipped.
        sheet.write_string(7, 0, "C-7").unwrap();
        // No stock number: skipped.
        sheet.write_number(8, 2, 3.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_read_price_sheet() {
        let bytes = price_list(&["Stock #", "Description", "Value"]);
        let rows = read_price_sheet(&bytes, SKIP_ROWS).unwrap();
        assert_eq!(
            rows,
            vec![
                PriceRow {
                    stock_number: "4711".into(),
                    price: dec!(19.99),
                },
                PriceRow {
                    stock_number: "B-12".into(),
                    price: dec!(1250.00),
                },
            ]
        );
    }

    #[test]
    fn test_missing_columns_lists_available() {
        let bytes = price_list(&["Item", "Description", "Cost"]);
        match read_price_sheet(&bytes, SKIP_ROWS) {
            Err(PartsheetError::MissingColumns { available, .. }) => {
                assert_eq!(available, vec!["Item", "Description", "Cost"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_f64_to_decimal() {
        assert_eq!(f64_to_decimal(19.99), dec!(19.99));
        assert_eq!(f64_to_decimal(68.0), dec!(68));
    }

    #[test]
    fn test_not_a_workbook() {
        assert!(matches!(
            read_price_sheet(b"plain text", SKIP_ROWS),
            Err(PartsheetError::Calamine(_))
        ));
    }
}
