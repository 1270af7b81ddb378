pub mod error;
pub mod extraction;
pub mod inventory;
pub mod invoice;
pub mod layout;
pub mod model;
pub mod output;
pub mod parsing;
pub mod supplier;

use std::path::PathBuf;

use tracing::info;

use error::PartsheetError;
use extraction::PageSource;
use model::Conversion;
use parsing::header::HeaderTable;

/// Options for [`convert_pdf`].
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Extra header aliases merged over the built-in table.
    pub header_file: Option<PathBuf>,
    /// Write an annotated SVG per page into this directory.
    pub debug_dir: Option<PathBuf>,
}

/// Main API entry point: turn a parts catalog PDF into one combined dataset
/// aligned to the canonical schema.
pub fn convert_pdf(
    pdf_bytes: &[u8],
    source: &dyn PageSource,
    options: &ConvertOptions,
) -> Result<Conversion, PartsheetError> {
    let mut headers = HeaderTable::builtin()?;
    if let Some(path) = &options.header_file {
        headers.extend(HeaderTable::load(path)?);
    }

    let pages = source.extract_pages(pdf_bytes)?;
    info!(
        backend = source.backend_name(),
        pages = pages.len(),
        "extracted PDF"
    );

    let (dataset, summaries) =
        parsing::parse_pages(&pages, &headers, options.debug_dir.as_deref())?;
    info!(
        rows = dataset.rows.len(),
        warnings = dataset.warnings.len(),
        "converted document"
    );

    Ok(Conversion {
        backend: source.backend_name().to_string(),
        dataset,
        pages: summaries,
    })
}
