use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Target columns every vendor table is normalized onto, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalColumn {
    Position,
    #[serde(rename = "Identification Number")]
    IdentificationNumber,
    Nomenclature,
    Description,
    Quantity,
    Unit,
    Remark,
    #[serde(rename = "Page Reference")]
    PageReference,
}

/// The canonical schema in column order.
pub const CANONICAL_SCHEMA: [CanonicalColumn; 8] = [
    CanonicalColumn::Position,
    CanonicalColumn::IdentificationNumber,
    CanonicalColumn::Nomenclature,
    CanonicalColumn::Description,
    CanonicalColumn::Quantity,
    CanonicalColumn::Unit,
    CanonicalColumn::Remark,
    CanonicalColumn::PageReference,
];

impl CanonicalColumn {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalColumn::Position => "Position",
            CanonicalColumn::IdentificationNumber => "Identification Number",
            CanonicalColumn::Nomenclature => "Nomenclature",
            CanonicalColumn::Description => "Description",
            CanonicalColumn::Quantity => "Quantity",
            CanonicalColumn::Unit => "Unit",
            CanonicalColumn::Remark => "Remark",
            CanonicalColumn::PageReference => "Page Reference",
        }
    }

    pub fn from_name(name: &str) -> Option<CanonicalColumn> {
        CANONICAL_SCHEMA.iter().copied().find(|c| c.name() == name)
    }

    /// Position of this column in [`CANONICAL_SCHEMA`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the row merger recognises the first row of a logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierPolicy {
    /// Identifier must be all ASCII digits.
    #[default]
    Numeric,
    /// Any non-blank identifier starts a new row.
    NonEmpty,
}

impl IdentifierPolicy {
    pub fn accepts(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        match self {
            IdentifierPolicy::Numeric => {
                !identifier.is_empty() && identifier.chars().all(|c| c.is_ascii_digit())
            }
            IdentifierPolicy::NonEmpty => !identifier.is_empty(),
        }
    }
}

/// One logical table row aligned to [`CANONICAL_SCHEMA`]. Always holds one
/// value per canonical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    /// Page the row starts on (1-based).
    pub page: usize,
    values: Vec<String>,
}

impl NormalizedRow {
    pub fn empty(page: usize) -> Self {
        NormalizedRow {
            page,
            values: vec![String::new(); CANONICAL_SCHEMA.len()],
        }
    }

    pub fn get(&self, column: CanonicalColumn) -> &str {
        &self.values[column.index()]
    }

    pub fn set(&mut self, column: CanonicalColumn, value: impl Into<String>) {
        self.values[column.index()] = value.into();
    }

    /// Append text to a cell, space-joined and trimmed.
    pub fn append(&mut self, column: CanonicalColumn, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let cell = &mut self.values[column.index()];
        if cell.trim().is_empty() {
            *cell = text.to_string();
        } else {
            *cell = format!("{} {}", cell.trim(), text);
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CANONICAL_SCHEMA.len() + 1))?;
        map.serialize_entry("page", &self.page)?;
        for column in CANONICAL_SCHEMA {
            map.serialize_entry(column.name(), self.get(column))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// Page failed to extract or classify.
    PageSkipped,
    /// No table found on a page that should have one.
    NoTableDetected,
    /// Table with fewer than two rows or a blank header row.
    MalformedTable,
    /// Header text not in the alias table.
    UnmappedHeader,
    /// Continuation row seen before any identifier row.
    OrphanContinuationRow,
}

/// A non-fatal problem found while converting a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionWarning {
    pub code: WarningCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl ConversionWarning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {}: {}", page, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// All rows of one document in page order, plus the warnings raised while
/// building them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedDataset {
    pub rows: Vec<NormalizedRow>,
    pub warnings: Vec<ConversionWarning>,
}

impl CombinedDataset {
    pub fn headers() -> Vec<&'static str> {
        CANONICAL_SCHEMA.iter().map(|c| c.name()).collect()
    }
}

/// What happened to one page during conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub page: usize,
    pub layout: String,
    pub table_rows: usize,
    pub skipped: bool,
}

/// Result of converting one document.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub backend: String,
    pub dataset: CombinedDataset,
    pub pages: Vec<PageSummary>,
}
