use crate::error::PartsheetError;
use crate::model::CombinedDataset;

/// CSV with the canonical column names as header row.
pub fn write_csv(dataset: &CombinedDataset) -> Result<Vec<u8>, PartsheetError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CombinedDataset::headers())?;
    for row in &dataset.rows {
        writer.write_record(row.values())?;
    }
    writer
        .into_inner()
        .map_err(|e| PartsheetError::Io(e.into_error()))
}
