//! Ordering from the manufacturer's parts portal.
//!
//! The portal itself is driven through [`SupplierPortal`]; this module only
//! decides what to ask it and how to report the answers.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PartsheetError;
use crate::model::CanonicalColumn;

/// Width portal stock ids are zero-padded to.
pub const STOCK_ID_WIDTH: usize = 6;

/// Product details shown by the portal for a stock id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub sku: Option<String>,
    pub description: Option<String>,
    pub list_price: Option<String>,
    /// Quantity available.
    pub stock: u32,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub width: Option<String>,
    pub length: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(ProductInfo),
    NotFound,
}

/// A logged-in session on the supplier portal.
pub trait SupplierPortal {
    fn search(&mut self, stock_id: &str) -> Result<Lookup, PartsheetError>;

    /// Put `quantity` units of the product last found into the cart.
    fn add_to_cart(&mut self, stock_id: &str, quantity: u32) -> Result<(), PartsheetError>;
}

/// One line of a parts order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub stock_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderOutcome {
    Added { quantity: u32 },
    NotFound,
    InsufficientStock { available: u32, needed: u32 },
    Error { message: String },
}

impl fmt::Display for OrderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderOutcome::Added { quantity } => write!(f, "Added {quantity} to cart"),
            OrderOutcome::NotFound => f.write_str("Item was not found"),
            OrderOutcome::InsufficientStock { available, needed } => write!(
                f,
                "Not enough stock, there is {available} in stock, and {needed} is needed."
            ),
            OrderOutcome::Error { message } => write!(f, "Error processing item: {message}"),
        }
    }
}

/// Left-pad a stock id with zeros to the portal's width.
pub fn pad_stock_id(raw: &str) -> String {
    format!("{:0>width$}", raw.trim(), width = STOCK_ID_WIDTH)
}

/// Add every line to the cart when the portal has enough stock. Problems are
/// recorded per item; the run never stops early.
pub fn order_items(
    portal: &mut dyn SupplierPortal,
    lines: &[OrderLine],
) -> BTreeMap<String, OrderOutcome> {
    let mut outcomes = BTreeMap::new();

    for line in lines {
        let stock_id = pad_stock_id(&line.stock_id);
        let outcome = match order_one(portal, &stock_id, line.quantity) {
            Ok(outcome) => outcome,
            Err(e) => OrderOutcome::Error {
                message: e.to_string(),
            },
        };
        match &outcome {
            OrderOutcome::Added { .. } => info!(stock_id = %stock_id, "{outcome}"),
            _ => warn!(stock_id = %stock_id, "{outcome}"),
        }
        outcomes.insert(stock_id, outcome);
    }
    outcomes
}

fn order_one(
    portal: &mut dyn SupplierPortal,
    stock_id: &str,
    needed: u32,
) -> Result<OrderOutcome, PartsheetError> {
    let product = match portal.search(stock_id)? {
        Lookup::Found(product) => product,
        Lookup::NotFound => return Ok(OrderOutcome::NotFound),
    };
    if product.stock < needed {
        return Ok(OrderOutcome::InsufficientStock {
            available: product.stock,
            needed,
        });
    }
    portal.add_to_cart(stock_id, needed)?;
    Ok(OrderOutcome::Added { quantity: needed })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookupStatus {
    Found,
    #[serde(rename = "Not Found")]
    NotFound,
    Error,
}

/// One row of the enriched parts report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRow {
    pub stock_id: String,
    pub status: LookupStatus,
    #[serde(flatten)]
    pub product: Option<ProductInfo>,
}

/// Look every id up on the portal, keeping the input order.
pub fn lookup_items(portal: &mut dyn SupplierPortal, ids: &[String]) -> Vec<LookupRow> {
    ids.iter()
        .map(|raw| {
            let stock_id = pad_stock_id(raw);
            let (status, product) = match portal.search(&stock_id) {
                Ok(Lookup::Found(product)) => (LookupStatus::Found, Some(product)),
                Ok(Lookup::NotFound) => (LookupStatus::NotFound, None),
                Err(e) => {
                    warn!(stock_id = %stock_id, "lookup failed: {e}");
                    (LookupStatus::Error, None)
                }
            };
            LookupRow {
                stock_id,
                status,
                product,
            }
        })
        .collect()
}

/// Read order lines from a converted parts sheet: identification number and
/// quantity columns, header in the first row. Rows without an id or with a
/// quantity that is not a positive whole number are skipped.
pub fn read_order_lines(bytes: &[u8]) -> Result<Vec<OrderLine>, PartsheetError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PartsheetError::Spreadsheet("workbook has no worksheets".into()))??;

    let mut rows = sheet.rows();
    let header: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let column = |col: CanonicalColumn| header.iter().position(|h| h == col.name());

    let (Some(id_col), Some(qty_col)) = (
        column(CanonicalColumn::IdentificationNumber),
        column(CanonicalColumn::Quantity),
    ) else {
        return Err(PartsheetError::MissingColumns {
            stock: CanonicalColumn::IdentificationNumber.name().into(),
            price: CanonicalColumn::Quantity.name().into(),
            available: header,
        });
    };

    let mut lines = Vec::new();
    for row in rows {
        let stock_id = row.get(id_col).map(|c| c.to_string()).unwrap_or_default();
        let stock_id = stock_id.trim();
        if stock_id.is_empty() {
            continue;
        }
        let quantity = match row.get(qty_col) {
            Some(Data::Float(f)) if f.fract() == 0.0 && *f > 0.0 && *f <= f64::from(u32::MAX) => {
                Some(*f as u32)
            }
            Some(Data::Int(i)) => u32::try_from(*i).ok().filter(|q| *q > 0),
            Some(Data::String(s)) => s.trim().parse::<u32>().ok().filter(|q| *q > 0),
            _ => None,
        };
        match quantity {
            Some(quantity) => lines.push(OrderLine {
                stock_id: stock_id.to_string(),
                quantity,
            }),
            None => warn!(stock_id, "skipping order line without a usable quantity"),
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockPortal {
        products: HashMap<String, ProductInfo>,
        broken: Vec<String>,
        cart: Vec<(String, u32)>,
    }

    impl SupplierPortal for MockPortal {
        fn search(&mut self, stock_id: &str) -> Result<Lookup, PartsheetError> {
            if self.broken.iter().any(|b| b == stock_id) {
                return Err(PartsheetError::Inventory("page did not load".into()));
            }
            Ok(self
                .products
                .get(stock_id)
                .cloned()
                .map_or(Lookup::NotFound, Lookup::Found))
        }

        fn add_to_cart(&mut self, stock_id: &str, quantity: u32) -> Result<(), PartsheetError> {
            self.cart.push((stock_id.to_string(), quantity));
            Ok(())
        }
    }

    fn portal() -> MockPortal {
        let mut products = HashMap::new();
        products.insert(
            "004711".to_string(),
            ProductInfo {
                sku: Some("004711".into()),
                description: Some("Hydraulic Pump".into()),
                stock: 5,
                ..ProductInfo::default()
            },
        );
        products.insert(
            "012345".to_string(),
            ProductInfo {
                stock: 1,
                ..ProductInfo::default()
            },
        );
        MockPortal {
            products,
            broken: vec!["000777".into()],
            ..MockPortal::default()
        }
    }

    fn line(stock_id: &str, quantity: u32) -> OrderLine {
        OrderLine {
            stock_id: stock_id.into(),
            quantity,
        }
    }

    #[test]
    fn test_pad_stock_id() {
        assert_eq!(pad_stock_id("4711"), "004711");
        assert_eq!(pad_stock_id(" 1234567 "), "1234567");
    }

    #[test]
    fn test_order_items_outcomes() {
        let mut portal = portal();
        let outcomes = order_items(
            &mut portal,
            &[line("4711", 2), line("12345", 3), line("999", 1), line("777", 1)],
        );

        assert_eq!(outcomes["004711"], OrderOutcome::Added { quantity: 2 });
        assert_eq!(
            outcomes["012345"].to_string(),
            "Not enough stock, there is 1 in stock, and 3 is needed."
        );
        assert_eq!(outcomes["000999"].to_string(), "Item was not found");
        assert!(matches!(outcomes["000777"], OrderOutcome::Error { .. }));
        assert_eq!(portal.cart, vec![("004711".to_string(), 2)]);
    }

    #[test]
    fn test_lookup_items_keeps_order() {
        let mut portal = portal();
        let rows = lookup_items(&mut portal, &["999".into(), "4711".into()]);
        assert_eq!(rows[0].status, LookupStatus::NotFound);
        assert_eq!(rows[1].status, LookupStatus::Found);
        assert_eq!(
            rows[1].product.as_ref().and_then(|p| p.description.as_deref()),
            Some("Hydraulic Pump")
        );

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["status"], "Not Found");
    }

    #[test]
    fn test_read_order_lines_from_converted_sheet() {
        use crate::model::{CombinedDataset, NormalizedRow};
        use crate::output::xlsx::write_xlsx;

        let mut rows = Vec::new();
        for (id, qty) in [
            ("4711", "2"),
            ("", "1"),
            ("4712", "n/a"),
            ("4713", "1"),
            ("4714", "0"),
        ] {
            let mut row = NormalizedRow::empty(1);
            row.set(CanonicalColumn::IdentificationNumber, id);
            row.set(CanonicalColumn::Quantity, qty);
            rows.push(row);
        }
        let bytes = write_xlsx(&CombinedDataset {
            rows,
            warnings: vec![],
        })
        .unwrap();

        let lines = read_order_lines(&bytes).unwrap();
        assert_eq!(lines, vec![line("4711", 2), line("4713", 1)]);
    }

    #[test]
    fn test_read_order_lines_rejects_oversized_quantity() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Identification Number").unwrap();
        sheet.write_string(0, 1, "Quantity").unwrap();
        sheet.write_string(1, 0, "4711").unwrap();
        sheet.write_number(1, 1, 5_000_000_000.0).unwrap();
        sheet.write_string(2, 0, "4712").unwrap();
        sheet.write_number(2, 1, 7.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let lines = read_order_lines(&bytes).unwrap();
        assert_eq!(lines, vec![line("4712", 7)]);
    }
}
