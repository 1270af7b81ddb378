//! Fillable "receiving order" PDF built from a parsed invoice.
//!
//! The document repeats the invoice's line items with two empty form fields
//! per item (`Qty Rec`, `Qty B/O`) for the person checking the delivery, and
//! two signature fields at the end.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::error::PartsheetError;
use crate::invoice::Invoice;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 50;

pub const TITLE: &str = "Receiving Order";
pub const COLUMNS: [&str; 6] = ["Item", "Qty Order", "Qty Rec", "Qty B/O", "Each", "Total"];
const COLUMN_WIDTHS: [i64; 6] = [192, 64, 64, 64, 64, 64];
/// Columns rendered as text fields instead of text.
const FIELD_COLUMNS: [usize; 2] = [2, 3];

pub const RECEIVED_FIELD: &str = "RevievedDate";
pub const CHECKED_FIELD: &str = "CheckedDate";

const BODY_SIZE: i64 = 10;
const LEADING: i64 = 12;
const CELL_PADDING: i64 = 4;
const HEADER_ROW_HEIGHT: i64 = 18;
/// Space kept free at the bottom of a page for the totals and signatures.
const FOOTER_HEIGHT: i64 = 110;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
/// Title colour, `#d1a700`.
const TITLE_RGB: [f32; 3] = [0.82, 0.655, 0.0];

/// Company block printed at the top of the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letterhead {
    pub company: String,
    pub lines: Vec<String>,
}

impl Default for Letterhead {
    fn default() -> Self {
        Letterhead {
            company: "Equipment Reuse International, LLC".into(),
            lines: vec![
                "2962 Mechanic Street".into(),
                "Lake City, PA 16423".into(),
                "scott@equip-reuse.com".into(),
                "www.equip-reuse.com".into(),
            ],
        }
    }
}

/// Text as a PDF literal string in the fonts' WinAnsi encoding.
fn pdf_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// Break text into lines of at most `max_chars`, on whitespace where possible.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
            if !current.is_empty() && needed > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Characters of body text that fit into a column of the given width.
fn chars_fitting(width: i64) -> usize {
    // Helvetica averages about half an em per glyph.
    ((width - 2 * CELL_PADDING) * 2 / BODY_SIZE).max(1) as usize
}

struct Composer {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    fields: Vec<ObjectId>,
    page_id: ObjectId,
    operations: Vec<Operation>,
    annotations: Vec<ObjectId>,
    /// Top of the free space on the current page, in PDF units from the bottom.
    cursor: i64,
}

impl Composer {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR => regular_id,
                BOLD => bold_id,
                "Helv" => regular_id,
            },
        });
        let page_id = doc.new_object_id();

        Composer {
            doc,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            fields: Vec::new(),
            page_id,
            operations: Vec::new(),
            annotations: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }

    fn finish_page(&mut self) -> Result<(), PartsheetError> {
        let content = Content {
            operations: std::mem::take(&mut self.operations),
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));
        let annots: Vec<Object> = self.annotations.drain(..).map(Object::from).collect();

        self.doc.objects.insert(
            self.page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "Contents" => content_id,
                "Resources" => self.resources_id,
                "Annots" => annots,
            }),
        );
        self.page_ids.push(self.page_id);
        Ok(())
    }

    fn new_page(&mut self) -> Result<(), PartsheetError> {
        self.finish_page()?;
        self.page_id = self.doc.new_object_id();
        self.cursor = PAGE_HEIGHT - MARGIN;
        debug!(page = self.page_ids.len() + 1, "started receiving order page");
        Ok(())
    }

    fn ensure_space(&mut self, height: i64) -> Result<bool, PartsheetError> {
        if self.cursor - height < MARGIN {
            self.new_page()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn text(&mut self, font: &str, size: i64, x: i64, y: i64, text: &str) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![pdf_string(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn stroke_rect(&mut self, x: i64, y: i64, width: i64, height: i64) {
        self.operations.extend([
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    /// A single-line text field covering the given rectangle.
    fn text_field(&mut self, name: &str, x: i64, y: i64, width: i64, height: i64, size: i64) {
        let widget = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => pdf_string(name),
            "V" => pdf_string(""),
            "Rect" => vec![x.into(), y.into(), (x + width).into(), (y + height).into()],
            "F" => 4,
            "P" => self.page_id,
            "DA" => pdf_string(&format!("/Helv {size} Tf 0 g")),
            "MK" => dictionary! {
                "BC" => vec![Object::Integer(0)],
            },
        });
        self.annotations.push(widget);
        self.fields.push(widget);
    }

    fn letterhead(&mut self, letterhead: &Letterhead) {
        self.cursor -= 12;
        self.text(BOLD, 12, MARGIN, self.cursor, &letterhead.company);
        for line in &letterhead.lines {
            self.cursor -= LEADING;
            self.text(REGULAR, BODY_SIZE, MARGIN, self.cursor, line);
        }
        self.cursor -= 30;

        let [r, g, b] = TITLE_RGB;
        self.operations.push(Operation::new(
            "rg",
            vec![r.into(), g.into(), b.into()],
        ));
        self.text(BOLD, 20, MARGIN, self.cursor, TITLE);
        self.operations
            .push(Operation::new("rg", vec![0.into(), 0.into(), 0.into()]));
        self.cursor -= 16;
    }

    fn shipping(&mut self, rows: &[[String; 3]]) -> Result<(), PartsheetError> {
        let column = (PAGE_WIDTH - 2 * MARGIN) / 3;
        for row in rows {
            let wrapped: Vec<Vec<String>> =
                row.iter().map(|cell| wrap(cell, chars_fitting(column))).collect();
            let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1) as i64;
            self.ensure_space(lines * 13 + 4)?;
            for (i, cell_lines) in wrapped.iter().enumerate() {
                let x = MARGIN + i as i64 * column;
                for (l, line) in cell_lines.iter().enumerate() {
                    self.text(REGULAR, 11, x, self.cursor - 11 - l as i64 * 13, line);
                }
            }
            self.cursor -= lines * 13 + 4;
        }
        self.cursor -= 12;
        Ok(())
    }

    fn table_header(&mut self) {
        let top = self.cursor;
        let mut x = MARGIN;
        for (name, width) in COLUMNS.iter().zip(COLUMN_WIDTHS) {
            self.stroke_rect(x, top - HEADER_ROW_HEIGHT, width, HEADER_ROW_HEIGHT);
            self.text(BOLD, BODY_SIZE, x + CELL_PADDING, top - 13, name);
            x += width;
        }
        self.cursor -= HEADER_ROW_HEIGHT;
    }

    fn items(&mut self, invoice: &Invoice) -> Result<(), PartsheetError> {
        self.ensure_space(HEADER_ROW_HEIGHT * 2)?;
        self.table_header();

        for (index, item) in invoice.items.iter().enumerate() {
            let cells = [
                wrap(&item.item, chars_fitting(COLUMN_WIDTHS[0])),
                wrap(&item.qty_order, chars_fitting(COLUMN_WIDTHS[1])),
                Vec::new(),
                Vec::new(),
                wrap(&item.each, chars_fitting(COLUMN_WIDTHS[4])),
                wrap(&item.total, chars_fitting(COLUMN_WIDTHS[5])),
            ];
            let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1) as i64;
            let height = lines * LEADING + 2 * CELL_PADDING;

            if self.ensure_space(height)? {
                self.table_header();
            }

            let top = self.cursor;
            let bottom = top - height;
            let mut x = MARGIN;
            for (col, (cell_lines, width)) in cells.iter().zip(COLUMN_WIDTHS).enumerate() {
                self.stroke_rect(x, bottom, width, height);
                if FIELD_COLUMNS.contains(&col) {
                    let field_height = LEADING + 4;
                    self.text_field(
                        &format!("field_{index}_{col}"),
                        x + 2,
                        top - 2 - field_height,
                        width - 4,
                        field_height,
                        8,
                    );
                } else {
                    for (l, line) in cell_lines.iter().enumerate() {
                        let y = top - CELL_PADDING - BODY_SIZE - l as i64 * LEADING;
                        self.text(REGULAR, BODY_SIZE, x + CELL_PADDING, y, line);
                    }
                }
                x += width;
            }
            self.cursor = bottom;
        }
        self.cursor -= 20;
        Ok(())
    }

    fn totals(&mut self, invoice: &Invoice) -> Result<(), PartsheetError> {
        self.ensure_space(FOOTER_HEIGHT)?;
        let currency = invoice.currency.as_deref().unwrap_or("N/A");
        let total = invoice
            .total
            .map(|t| t.to_string())
            .unwrap_or_default();
        let value_x = MARGIN + 140;

        if let Some(subtotal) = invoice.subtotal {
            self.cursor -= 11;
            self.text(REGULAR, 11, MARGIN, self.cursor, "SUBTOTAL:");
            self.text(REGULAR, 11, value_x, self.cursor, &subtotal.to_string());
            self.cursor -= 4;
        }
        self.cursor -= 11;
        self.text(REGULAR, 11, MARGIN, self.cursor, "TOTAL:");
        self.text(
            REGULAR,
            11,
            value_x,
            self.cursor,
            &format!("{currency} {total}"),
        );
        self.cursor -= 24;

        for (label, field) in [("Received:", RECEIVED_FIELD), ("Checked & Scanned:", CHECKED_FIELD)] {
            self.cursor -= 18;
            self.text(REGULAR, 11, MARGIN, self.cursor + 4, label);
            self.text_field(field, value_x, self.cursor, 180, 18, 11);
            self.cursor -= 6;
        }
        Ok(())
    }

    fn into_bytes(mut self) -> Result<Vec<u8>, PartsheetError> {
        self.finish_page()?;

        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );

        let fields: Vec<Object> = self.fields.iter().map(|id| (*id).into()).collect();
        let acroform_id = self.doc.add_object(dictionary! {
            "Fields" => fields,
            "NeedAppearances" => true,
            "DA" => pdf_string("/Helv 0 Tf 0 g"),
            "DR" => self.resources_id,
        });
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
            "AcroForm" => acroform_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Render the receiving order for an invoice.
pub fn write_receiving_order(
    invoice: &Invoice,
    letterhead: &Letterhead,
) -> Result<Vec<u8>, PartsheetError> {
    if invoice.items.is_empty() {
        return Err(PartsheetError::EmptyInvoice);
    }

    let mut composer = Composer::new();
    composer.letterhead(letterhead);
    composer.shipping(&invoice.shipping)?;
    composer.items(invoice)?;
    composer.totals(invoice)?;

    debug!(
        pages = composer.page_ids.len() + 1,
        fields = composer.fields.len(),
        "rendered receiving order"
    );
    composer.into_bytes()
}
