//! Supplier invoices: read the line items and totals from the invoice PDF.

pub mod receiving_order;

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PartsheetError;
use crate::extraction::table::{extract_table, ExtractionConfig, HorizontalStrategy, VerticalStrategy};
use crate::extraction::{BBox, Page};

static SUBTOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SUBTOTAL\s+([\d,]+\.\d{2})").expect("valid subtotal regex"));
static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TOTAL\s+(USD|EUR)\s+([\d,]+\.\d{2})").expect("valid total regex")
});

/// Column edges of the line-item table.
const ITEM_COLUMNS: &[f32] = &[67.0, 225.0, 270.0, 340.0, 545.0];
/// Column edges of the ship-to / bill-to block on the first page.
const SHIPPING_COLUMNS: &[f32] = &[60.0, 210.0, 400.0, 520.0];

const FIRST_PAGE_SNAP_TOLERANCE: f32 = 9.0;
const LATER_PAGE_SNAP_TOLERANCE: f32 = 10.0;
const SHIPPING_SNAP_TOLERANCE: f32 = 8.0;

/// First-cell markers of signature rows printed under the item table.
const SIGNATURE_MARKERS: &[&str] = &["Approved", "Date"];
/// First-cell markers of shipping rows that are not addresses.
const SHIPPING_SKIP_MARKERS: &[&str] = &["Purchase", "ACTIV"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceItem {
    /// Item description; wrapped description lines are joined with `\n`.
    pub item: String,
    pub qty_order: String,
    pub each: String,
    pub total: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Invoice {
    pub subtotal: Option<Decimal>,
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    /// Rows of the three-column shipping block.
    pub shipping: Vec<[String; 3]>,
    pub items: Vec<InvoiceItem>,
}

/// Parse an amount like `1,234.56`.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    Decimal::from_str(&text.replace(',', "")).ok()
}

/// Read totals, shipping block and line items from the pages of an invoice.
pub fn parse_invoice(pages: &[Page]) -> Result<Invoice, PartsheetError> {
    let mut invoice = Invoice::default();

    for (i, page) in pages.iter().enumerate() {
        let text = page.text();
        if let Some(caps) = SUBTOTAL_RE.captures(&text) {
            invoice.subtotal = parse_amount(&caps[1]);
        }
        if let Some(caps) = TOTAL_RE.captures(&text) {
            invoice.currency = Some(caps[1].to_string());
            invoice.total = parse_amount(&caps[2]);
        }

        let first = i == 0;
        if first {
            invoice.shipping = parse_shipping(page);
        }

        let config = item_table_config(page, first);
        match extract_table(page, &config) {
            Some(table) => {
                debug!(page = page.page_number, rows = table.len(), "found invoice items");
                let rows = table
                    .into_iter()
                    .skip(1)
                    .map(|row| row.into_iter().map(Option::unwrap_or_default).collect());
                merge_item_rows(&mut invoice.items, rows);
            }
            None => debug!(page = page.page_number, "no item table"),
        }
    }

    if invoice.items.is_empty() {
        return Err(PartsheetError::EmptyInvoice);
    }
    if invoice.total.is_none() {
        warn!("invoice total not found");
    }
    Ok(invoice)
}

fn item_table_config(page: &Page, first: bool) -> ExtractionConfig {
    ExtractionConfig {
        horizontal_strategy: HorizontalStrategy::Text,
        vertical_strategy: VerticalStrategy::Explicit,
        explicit_vertical_lines: ITEM_COLUMNS.to_vec(),
        snap_tolerance: if first {
            FIRST_PAGE_SNAP_TOLERANCE
        } else {
            LATER_PAGE_SNAP_TOLERANCE
        },
        // The first page carries the letterhead and addresses above the items.
        crop: first.then(|| BBox::new(0.0, 2.0 * page.height / 5.0, page.width, page.height)),
        ..ExtractionConfig::default()
    }
}

/// Fold rows into items. A row with an empty `Qty Order` cell continues the
/// previous item's description.
fn merge_item_rows(items: &mut Vec<InvoiceItem>, rows: impl Iterator<Item = Vec<String>>) {
    for row in rows {
        let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");
        let first = cell(0);
        if SIGNATURE_MARKERS.iter().any(|m| first.contains(m)) {
            continue;
        }
        if cell(1).is_empty() {
            match items.last_mut() {
                Some(previous) if !first.is_empty() => {
                    previous.item.push('\n');
                    previous.item.push_str(first);
                }
                Some(_) => {}
                None => debug!("dropping item continuation before first item: {first:?}"),
            }
            continue;
        }
        items.push(InvoiceItem {
            item: first.to_string(),
            qty_order: cell(1).to_string(),
            each: cell(2).to_string(),
            total: cell(3).to_string(),
        });
    }
}

fn parse_shipping(page: &Page) -> Vec<[String; 3]> {
    let config = ExtractionConfig {
        horizontal_strategy: HorizontalStrategy::Text,
        vertical_strategy: VerticalStrategy::Explicit,
        explicit_vertical_lines: SHIPPING_COLUMNS.to_vec(),
        snap_tolerance: SHIPPING_SNAP_TOLERANCE,
        crop: Some(BBox::new(
            0.0,
            page.height / 5.0,
            page.width,
            4.0 * page.height / 9.0,
        )),
        ..ExtractionConfig::default()
    };

    let Some(table) = extract_table(page, &config) else {
        return Vec::new();
    };

    table
        .into_iter()
        .map(|row| {
            let cell = |i: usize| {
                row.get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            [cell(0), cell(1), cell(2)]
        })
        .filter(|row| {
            !SHIPPING_SKIP_MARKERS.iter().any(|m| row[0].contains(m))
                && !(row[0].is_empty() && row[1].is_empty())
        })
        .collect()
}
