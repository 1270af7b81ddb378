pub mod align;
pub mod header;
pub mod merge;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::PartsheetError;
use crate::extraction::debug::write_page_svg;
use crate::extraction::table::{find_tables, largest, ExtractionConfig, RawTable, TableGrid};
use crate::extraction::Page;
use crate::layout::{classify, LayoutVariant};
use crate::model::{
    CanonicalColumn, CombinedDataset, ConversionWarning, NormalizedRow, PageSummary, WarningCode,
};
use align::align_table;
use header::{normalize_headers, HeaderTable};
use merge::RowMerger;

/// Table finder output for one page.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub variant: LayoutVariant,
    pub config: Option<ExtractionConfig>,
    pub tables: Vec<TableGrid>,
}

impl PageExtraction {
    /// The page's main table: the one with the most cells.
    pub fn table(&self) -> Option<&TableGrid> {
        self.tables
            .iter()
            .fold(None, |best: Option<&TableGrid>, t| match best {
                Some(b) if b.cells.len() >= t.cells.len() => Some(b),
                _ => Some(t),
            })
    }
}

/// Classify a page and run the table finder with the matching settings.
pub fn extract_page(page: &Page) -> PageExtraction {
    let variant = classify(page);
    let config = variant.extraction_config(page);
    let tables = config
        .as_ref()
        .map(|c| find_tables(page, c))
        .unwrap_or_default();

    debug!(
        page = page.page_number,
        layout = %variant,
        tables = tables.len(),
        "extracted page"
    );

    PageExtraction {
        variant,
        config,
        tables,
    }
}

/// Run the whole table pipeline over a document's pages.
///
/// Pages are processed in order; problems with a single page become
/// warnings. Fails only when no page yields a table at all.
pub fn parse_pages(
    pages: &[Page],
    headers: &HeaderTable,
    debug_dir: Option<&Path>,
) -> Result<(CombinedDataset, Vec<PageSummary>), PartsheetError> {
    let mut merger: RowMerger<NormalizedRow> = RowMerger::new();
    let mut warnings = Vec::new();
    let mut summaries = Vec::new();
    let mut tables_found = 0;

    for page in pages {
        let page_no = page.page_number;

        if let Some(reason) = &page.read_error {
            push_warning(
                &mut warnings,
                ConversionWarning::new(
                    WarningCode::PageSkipped,
                    format!("page could not be read: {reason}"),
                )
                .with_page(page_no),
            );
            summaries.push(PageSummary {
                page: page_no,
                layout: "unreadable".into(),
                table_rows: 0,
                skipped: true,
            });
            continue;
        }

        let extraction = extract_page(page);

        if let Some(dir) = debug_dir {
            match write_page_svg(dir, page, extraction.config.as_ref(), &extraction.tables) {
                Ok(path) => debug!(page = page_no, path = %path.display(), "wrote debug SVG"),
                Err(e) => warn!(page = page_no, "failed to write debug SVG: {e}"),
            }
        }

        let mut summary = PageSummary {
            page: page_no,
            layout: extraction.variant.to_string(),
            table_rows: 0,
            skipped: true,
        };

        if extraction.variant == LayoutVariant::TableOfContents {
            debug!(page = page_no, "skipping table of contents");
            summaries.push(summary);
            continue;
        }

        let Some(table) = largest(extraction.tables) else {
            push_warning(
                &mut warnings,
                ConversionWarning::new(WarningCode::NoTableDetected, "no table detected")
                    .with_page(page_no),
            );
            summaries.push(summary);
            continue;
        };
        tables_found += 1;

        if let Err(reason) = check_table(&table.rows) {
            push_warning(
                &mut warnings,
                ConversionWarning::new(WarningCode::MalformedTable, reason).with_page(page_no),
            );
            summaries.push(summary);
            continue;
        }

        let normalized = normalize_headers(headers, &table.rows[0]);
        for header in &normalized.unmapped {
            push_warning(
                &mut warnings,
                ConversionWarning::new(
                    WarningCode::UnmappedHeader,
                    format!("unmapped header '{header}'"),
                )
                .with_page(page_no),
            );
        }

        let Some(identifier) = identifier_column(&normalized.columns) else {
            push_warning(
                &mut warnings,
                ConversionWarning::new(
                    WarningCode::MalformedTable,
                    "no header maps to a known column, page rows dropped",
                )
                .with_page(page_no),
            );
            summaries.push(summary);
            continue;
        };
        let policy = extraction.variant.identifier_policy();

        let rows = align_table(&normalized.columns, &table.rows[1..], page_no);
        summary.table_rows = rows.len();
        summary.skipped = false;
        for row in rows {
            merger.push(row, identifier.index(), policy, Some(page_no));
        }

        info!(
            page = page_no,
            layout = %extraction.variant,
            rows = summary.table_rows,
            "parsed page"
        );
        summaries.push(summary);
    }

    if tables_found == 0 {
        return Err(PartsheetError::NoTables);
    }

    let (rows, merge_warnings) = merger.finish();
    warnings.extend(merge_warnings);
    // Stable: keeps per-page order of warnings raised for the same page.
    warnings.sort_by_key(|w| w.page.unwrap_or(0));

    Ok((CombinedDataset { rows, warnings }, summaries))
}

/// Column whose text marks the first row of a record: the position when the
/// page has one, else the identification number, else the first mapped
/// column.
fn identifier_column(columns: &[Option<CanonicalColumn>]) -> Option<CanonicalColumn> {
    let mapped = || columns.iter().flatten().copied();
    [CanonicalColumn::Position, CanonicalColumn::IdentificationNumber]
        .into_iter()
        .find(|preferred| mapped().any(|c| c == *preferred))
        .or_else(|| mapped().next())
}

fn push_warning(warnings: &mut Vec<ConversionWarning>, warning: ConversionWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

/// A usable table has a header row with text and at least one body row.
fn check_table(rows: &RawTable) -> Result<(), String> {
    if rows.len() < 2 {
        return Err(format!("table has {} row(s), need at least 2", rows.len()));
    }
    let header_blank = rows[0]
        .iter()
        .all(|c| c.as_deref().map_or(true, |t| t.trim().is_empty()));
    if header_blank {
        return Err("table header row is empty".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::*;

    /// A page in the `Position` layout with ruled rows.
    fn position_page(page_number: usize, rows: &[[&str; 3]]) -> Page {
        let mut page = Page::new(page_number, 595.0, 842.0);
        page.words.push(word("SENNEBOGEN", 40.0, 20.0));
        // Two-line header cells: "Pos./\nFig." and "Ident./\nNo.".
        page.words.push(word("Pos./", 42.0, 39.0));
        page.words.push(word("Ident./", 72.0, 39.0));
        page.words.push(word("Benennung", 112.0, 39.0));
        page.words.push(word("Fig.", 42.0, 44.0));
        page.words.push(word("No.", 72.0, 44.0));

        let mut y = 38.0;
        page.segments.push(hline(30.0, y, 560.0));
        y += 16.0;
        for row in rows {
            page.segments.push(hline(30.0, y, 560.0));
            for (text, x) in row.iter().zip([42.0, 72.0, 112.0]) {
                if !text.is_empty() {
                    page.words.push(word(text, x, y + 3.0));
                }
            }
            y += 16.0;
        }
        page.segments.push(hline(30.0, y, 560.0));
        page
    }

    #[test]
    fn test_extract_page_uses_variant_columns() {
        let page = position_page(1, &[["1", "4711", "Pump"]]);
        let extraction = extract_page(&page);
        assert_eq!(extraction.variant, LayoutVariant::Position);
        let table = extraction.table().unwrap();
        assert_eq!(table.rows[0][0].as_deref(), Some("Pos./\nFig."));
        assert_eq!(table.rows[1][2].as_deref(), Some("Pump"));
    }

    #[test]
    fn test_rows_merge_across_pages() {
        let pages = vec![
            position_page(1, &[["1", "4711", "Hydraulic"], ["2", "4712", "Hose"]]),
            position_page(2, &[["", "", "assembly"], ["3", "4713", "Clamp"]]),
        ];
        let headers = HeaderTable::builtin().unwrap();
        let (dataset, summaries) = parse_pages(&pages, &headers, None).unwrap();

        let descriptions: Vec<&str> = dataset
            .rows
            .iter()
            .map(|r| r.get(CanonicalColumn::Description))
            .collect();
        assert_eq!(descriptions, vec!["Hydraulic", "Hose assembly", "Clamp"]);
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| !s.skipped));
    }

    #[test]
    fn test_table_of_contents_page_skipped() {
        let mut toc = Page::new(1, 595.0, 842.0);
        toc.words.push(word("Inhaltsverzeichnis", 40.0, 20.0));
        let pages = vec![toc, position_page(2, &[["1", "4711", "Pump"]])];
        let headers = HeaderTable::builtin().unwrap();
        let (dataset, summaries) = parse_pages(&pages, &headers, None).unwrap();
        assert_eq!(dataset.rows.len(), 1);
        assert!(summaries[0].skipped);
        assert_eq!(summaries[0].layout, "table-of-contents");
        assert!(dataset.warnings.is_empty());
    }

    #[test]
    fn test_no_tables_is_an_error() {
        let pages = vec![Page::new(1, 595.0, 842.0)];
        let headers = HeaderTable::builtin().unwrap();
        assert!(matches!(
            parse_pages(&pages, &headers, None),
            Err(PartsheetError::NoTables)
        ));
    }

    #[test]
    fn test_identifier_column_prefers_position() {
        use CanonicalColumn::*;
        assert_eq!(
            identifier_column(&[None, Some(IdentificationNumber), Some(Position)]),
            Some(Position)
        );
        assert_eq!(
            identifier_column(&[None, Some(Description), Some(IdentificationNumber)]),
            Some(IdentificationNumber)
        );
        assert_eq!(
            identifier_column(&[None, Some(Nomenclature), Some(Quantity)]),
            Some(Nomenclature)
        );
        assert_eq!(identifier_column(&[None, None]), None);
    }

    #[test]
    fn test_page_without_mapped_headers_is_dropped() {
        let pages = vec![position_page(1, &[["1", "4711", "Pump"]])];
        let (dataset, summaries) = parse_pages(&pages, &HeaderTable::default(), None).unwrap();
        assert!(dataset.rows.is_empty());
        assert!(summaries[0].skipped);
        assert!(dataset
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::MalformedTable && w.page == Some(1)));
    }

    #[test]
    fn test_unreadable_page_warns_and_is_skipped() {
        let pages = vec![
            Page::unreadable(1, 595.0, 842.0, "bad content stream"),
            position_page(2, &[["1", "4711", "Pump"]]),
        ];
        let headers = HeaderTable::builtin().unwrap();
        let (dataset, summaries) = parse_pages(&pages, &headers, None).unwrap();

        assert_eq!(dataset.rows.len(), 1);
        assert!(summaries[0].skipped);
        assert_eq!(summaries[0].layout, "unreadable");
        assert_eq!(dataset.warnings.len(), 1);
        assert_eq!(dataset.warnings[0].code, WarningCode::PageSkipped);
        assert_eq!(dataset.warnings[0].page, Some(1));
        assert!(dataset.warnings[0].message.contains("bad content stream"));
    }

    #[test]
    fn test_check_table() {
        assert!(check_table(&vec![vec![Some("Pos".to_string())]]).is_err());
        assert!(check_table(&vec![
            vec![Some(" ".to_string()), None],
            vec![Some("1".to_string()), None],
        ])
        .is_err());
        assert!(check_table(&vec![
            vec![Some("Pos".to_string())],
            vec![Some("1".to_string())],
        ])
        .is_ok());
    }
}
