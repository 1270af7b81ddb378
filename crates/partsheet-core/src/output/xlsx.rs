use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};

use crate::error::PartsheetError;
use crate::model::CombinedDataset;

pub const SHEET_NAME: &str = "Combined Output";

/// Upper bound on a column's width, in characters.
pub const MAX_COLUMN_WIDTH: usize = 60;

/// Padding added to the longest value of a column.
const WIDTH_PADDING: usize = 2;

/// Width of each canonical column: longest value (header included) plus
/// padding, capped at [`MAX_COLUMN_WIDTH`].
pub fn column_widths(dataset: &CombinedDataset) -> Vec<usize> {
    CombinedDataset::headers()
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let longest = dataset
                .rows
                .iter()
                .map(|r| r.values()[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + WIDTH_PADDING).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Write the dataset as a single-sheet workbook: bold header, centred and
/// wrapped cells, thin borders everywhere.
pub fn write_xlsx(dataset: &CombinedDataset) -> Result<Vec<u8>, PartsheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let cell_format = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin);
    let header_format = cell_format.clone().set_bold();

    for (col, header) in CombinedDataset::headers().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (r, row) in dataset.rows.iter().enumerate() {
        for (col, value) in row.values().iter().enumerate() {
            worksheet.write_string_with_format(r as u32 + 1, col as u16, value, &cell_format)?;
        }
    }

    for (col, width) in column_widths(dataset).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalColumn, NormalizedRow};
    use calamine::{Reader, Xlsx};
    use std::io::Cursor;

    fn dataset() -> CombinedDataset {
        let mut row = NormalizedRow::empty(1);
        row.set(CanonicalColumn::Position, "1");
        row.set(CanonicalColumn::Description, "x".repeat(100));
        CombinedDataset {
            rows: vec![row],
            warnings: vec![],
        }
    }

    #[test]
    fn test_column_widths() {
        let widths = column_widths(&dataset());
        // "Position" header is longer than the value "1".
        assert_eq!(widths[0], "Position".len() + 2);
        assert_eq!(widths[3], MAX_COLUMN_WIDTH);
    }

    #[test]
    fn test_workbook_round_trips_through_calamine() {
        let bytes = write_xlsx(&dataset()).unwrap();
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(
            range.get_value((0, 1)),
            Some(&calamine::Data::String("Identification Number".into()))
        );
        assert_eq!(
            range.get_value((1, 0)),
            Some(&calamine::Data::String("1".into()))
        );
    }
}
