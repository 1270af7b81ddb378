use partsheet_core::error::PartsheetError;
use partsheet_core::output::{self, OutputFormat};
use partsheet_core::ConvertOptions;
use std::path::PathBuf;

use super::page_source;
use crate::Backend;

pub fn run(
    pdf_file: PathBuf,
    output_file: Option<PathBuf>,
    format: OutputFormat,
    backend: Backend,
    header_file: Option<PathBuf>,
    debug_dir: Option<PathBuf>,
) -> Result<(), PartsheetError> {
    let pdf_bytes = std::fs::read(&pdf_file)?;
    let source = page_source(backend)?;
    if let Some(dir) = &debug_dir {
        std::fs::create_dir_all(dir)?;
    }
    let options = ConvertOptions {
        header_file,
        debug_dir,
    };

    let conversion = partsheet_core::convert_pdf(&pdf_bytes, source.as_ref(), &options)?;
    let bytes = output::render(&conversion, format)?;

    let path = output_file.unwrap_or_else(|| pdf_file.with_extension(format.extension()));
    std::fs::write(&path, bytes)?;

    eprintln!(
        "Converted {} row(s) from {} page(s), written to {}",
        conversion.dataset.rows.len(),
        conversion.pages.iter().filter(|p| !p.skipped).count(),
        path.display()
    );
    if !conversion.dataset.warnings.is_empty() {
        eprintln!("  {} warning(s):", conversion.dataset.warnings.len());
        for w in &conversion.dataset.warnings {
            eprintln!("  warning: {w}");
        }
    }

    Ok(())
}
