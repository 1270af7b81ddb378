use partsheet_core::error::PartsheetError;
use partsheet_core::parsing::extract_page;
use serde::Serialize;
use std::path::PathBuf;

use super::page_source;
use crate::output;
use crate::Backend;

/// What the table finder sees on one page.
#[derive(Debug, Serialize)]
pub struct PageReport {
    pub page: usize,
    pub layout: String,
    pub tables: usize,
    pub rows: usize,
    pub columns: usize,
    /// Header cells of the main table, as printed.
    pub header: Vec<String>,
}

pub fn run(pdf_file: PathBuf, backend: Backend, output_format: &str) -> Result<(), PartsheetError> {
    let pdf_bytes = std::fs::read(&pdf_file)?;
    let source = page_source(backend)?;
    let pages = source.extract_pages(&pdf_bytes)?;

    let reports: Vec<PageReport> = pages
        .iter()
        .map(|page| {
            let extraction = extract_page(page);
            let table = extraction.table();
            PageReport {
                page: page.page_number,
                layout: extraction.variant.to_string(),
                tables: extraction.tables.len(),
                rows: table.map_or(0, |t| t.rows.len()),
                columns: table
                    .and_then(|t| t.rows.first())
                    .map_or(0, |r| r.len()),
                header: table
                    .and_then(|t| t.rows.first())
                    .map(|r| {
                        r.iter()
                            .map(|c| c.as_deref().unwrap_or("").replace('\n', " "))
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect();

    match output_format {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => output::table::print_pages(source.backend_name(), &reports),
    }
    Ok(())
}
