//! Writers for a converted dataset.

pub mod csv;
pub mod xlsx;

use serde::Serialize;
use std::fmt;

use crate::error::PartsheetError;
use crate::model::Conversion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_str_loose(s: &str) -> Option<OutputFormat> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Some(OutputFormat::Xlsx),
            "csv" => Some(OutputFormat::Csv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Render a conversion in the requested format.
pub fn render(conversion: &Conversion, format: OutputFormat) -> Result<Vec<u8>, PartsheetError> {
    match format {
        OutputFormat::Xlsx => xlsx::write_xlsx(&conversion.dataset),
        OutputFormat::Csv => csv::write_csv(&conversion.dataset),
        OutputFormat::Json => Ok(serde_json::to_vec_pretty(conversion)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CombinedDataset, NormalizedRow};

    #[test]
    fn test_format_from_str_loose() {
        assert_eq!(OutputFormat::from_str_loose("XLSX"), Some(OutputFormat::Xlsx));
        assert_eq!(OutputFormat::from_str_loose(" csv "), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_str_loose("pdf"), None);
    }

    #[test]
    fn test_render_json_has_dataset_and_pages() {
        let conversion = Conversion {
            backend: "mock".into(),
            dataset: CombinedDataset {
                rows: vec![NormalizedRow::empty(1)],
                warnings: vec![],
            },
            pages: vec![],
        };
        let bytes = render(&conversion, OutputFormat::Json).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["backend"], "mock");
        assert_eq!(json["dataset"]["rows"][0]["Position"], "");
        assert!(json["pages"].as_array().unwrap().is_empty());
    }
}
