use partsheet_core::error::PartsheetError;
use partsheet_core::invoice::receiving_order::{write_receiving_order, Letterhead};
use partsheet_core::invoice::parse_invoice;
use std::path::PathBuf;

use super::page_source;
use crate::Backend;

pub fn run(
    pdf_file: PathBuf,
    output_file: Option<PathBuf>,
    backend: Backend,
) -> Result<(), PartsheetError> {
    let pdf_bytes = std::fs::read(&pdf_file)?;
    let source = page_source(backend)?;
    let pages = source.extract_pages(&pdf_bytes)?;

    let invoice = parse_invoice(&pages)?;
    let bytes = write_receiving_order(&invoice, &Letterhead::default())?;

    let path = output_file.unwrap_or_else(|| {
        let stem = pdf_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "invoice".into());
        pdf_file.with_file_name(format!("{stem}_receiving_order.pdf"))
    });
    std::fs::write(&path, bytes)?;

    eprintln!(
        "Receiving order with {} item(s) written to {}",
        invoice.items.len(),
        path.display()
    );
    if invoice.total.is_none() {
        eprintln!("  warning: no invoice total found");
    }
    Ok(())
}
