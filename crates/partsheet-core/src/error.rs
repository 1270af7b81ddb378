use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PartsheetError {
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("failed to load PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to parse pdftotext output: {0}")]
    BboxXml(String),

    #[error("no tables found in the PDF")]
    NoTables,

    #[error("failed to load header aliases from {path}: {reason}")]
    HeaderTableLoad { path: PathBuf, reason: String },

    #[error("invalid header alias table: {0}")]
    HeaderTableInvalid(String),

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("spreadsheet must contain columns named '{stock}' and '{price}'. Available columns: {available:?}")]
    MissingColumns {
        stock: String,
        price: String,
        available: Vec<String>,
    },

    #[error("could not load or create the item map")]
    EmptyItemMap,

    #[error("inventory API request failed: {0}")]
    Inventory(String),

    #[error("invoice has no line items")]
    EmptyInvoice,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XLSX read error: {0}")]
    Calamine(#[from] calamine::XlsxError),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
