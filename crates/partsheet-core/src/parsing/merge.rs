//! Reassembly of logical rows that the PDF wrapped over several table rows.

use tracing::warn;

use crate::model::{ConversionWarning, IdentifierPolicy, NormalizedRow, WarningCode};

/// Identifier text marking a header row repeated inside the table body.
pub const HEADER_REPEAT_MARKER: &str = "Pos";

/// A row the merger can read identifiers from and append text to.
pub trait MergeRow {
    fn cell(&self, index: usize) -> &str;
    fn width(&self) -> usize;
    fn append_cell(&mut self, index: usize, text: &str);
}

impl MergeRow for NormalizedRow {
    fn cell(&self, index: usize) -> &str {
        &self.values()[index]
    }

    fn width(&self) -> usize {
        self.values().len()
    }

    fn append_cell(&mut self, index: usize, text: &str) {
        let column = crate::model::CANONICAL_SCHEMA[index];
        self.append(column, text);
    }
}

impl MergeRow for Vec<String> {
    fn cell(&self, index: usize) -> &str {
        self.get(index).map(String::as_str).unwrap_or("")
    }

    fn width(&self) -> usize {
        self.len()
    }

    fn append_cell(&mut self, index: usize, text: &str) {
        let text = text.trim();
        if text.is_empty() || index >= self.len() {
            return;
        }
        let cell = &mut self[index];
        *cell = if cell.trim().is_empty() {
            text.to_string()
        } else {
            format!("{} {}", cell.trim(), text)
        };
    }
}

/// Streaming merger. A row with a well-formed identifier opens a new logical
/// row; rows without one are folded into the open row. The open row stays
/// pending across calls, so a record wrapped over a page break is joined.
#[derive(Debug)]
pub struct RowMerger<R> {
    pending: Option<R>,
    rows: Vec<R>,
    warnings: Vec<ConversionWarning>,
}

impl<R> Default for RowMerger<R> {
    fn default() -> Self {
        RowMerger {
            pending: None,
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<R: MergeRow + std::fmt::Debug> RowMerger<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row. `identifier` is the index of the identifier cell.
    pub fn push(
        &mut self,
        row: R,
        identifier: usize,
        policy: IdentifierPolicy,
        page: Option<usize>,
    ) {
        let id = row.cell(identifier).trim();

        if id.contains(HEADER_REPEAT_MARKER) {
            return;
        }

        if policy.accepts(id) {
            if let Some(done) = self.pending.replace(row) {
                self.rows.push(done);
            }
            return;
        }

        let blank = (0..row.width()).all(|i| row.cell(i).trim().is_empty());
        if blank {
            return;
        }

        match &mut self.pending {
            Some(parent) => {
                for i in (0..row.width().min(parent.width())).filter(|i| *i != identifier) {
                    parent.append_cell(i, row.cell(i));
                }
            }
            None => {
                let message = format!(
                    "continuation row before any identifier row dropped: {:?}",
                    row
                );
                warn!(page = ?page, "{message}");
                let mut warning = ConversionWarning::new(WarningCode::OrphanContinuationRow, message);
                if let Some(page) = page {
                    warning = warning.with_page(page);
                }
                self.warnings.push(warning);
            }
        }
    }

    /// Emit the pending row and return everything merged so far.
    pub fn finish(mut self) -> (Vec<R>, Vec<ConversionWarning>) {
        if let Some(last) = self.pending.take() {
            self.rows.push(last);
        }
        (self.rows, self.warnings)
    }
}

/// Merge continuation rows of a plain string table whose identifier is the
/// first cell.
pub fn merge_continuation_rows(
    rows: Vec<Vec<String>>,
    policy: IdentifierPolicy,
) -> (Vec<Vec<String>>, Vec<ConversionWarning>) {
    let mut merger = RowMerger::new();
    for row in rows {
        merger.push(row, 0, policy, None);
    }
    merger.finish()
}
