use crate::model::{CanonicalColumn, NormalizedRow};

/// Align one source row to the canonical schema. Unmapped source columns are
/// dropped; source columns mapped to the same canonical column are
/// space-joined in source order.
pub fn align_row(
    columns: &[Option<CanonicalColumn>],
    cells: &[Option<String>],
    page: usize,
) -> NormalizedRow {
    let mut row = NormalizedRow::empty(page);
    for (column, cell) in columns.iter().zip(cells) {
        if let (Some(column), Some(text)) = (column, cell) {
            row.append(*column, text);
        }
    }
    row
}

/// Align every body row of a table.
pub fn align_table(
    columns: &[Option<CanonicalColumn>],
    body: &[Vec<Option<String>>],
    page: usize,
) -> Vec<NormalizedRow> {
    body.iter().map(|cells| align_row(columns, cells, page)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CANONICAL_SCHEMA;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_missing_columns_are_empty() {
        let columns = vec![Some(CanonicalColumn::Position), None];
        let row = align_row(&columns, &cells(&["4", "dropped"]), 1);
        assert_eq!(row.values().len(), CANONICAL_SCHEMA.len());
        assert_eq!(row.get(CanonicalColumn::Position), "4");
        assert!(row.values()[1..].iter().all(|v| v.is_empty()));
    }

    #[test]
    fn test_order_stable_under_column_permutation() {
        let a = align_row(
            &[
                Some(CanonicalColumn::Quantity),
                Some(CanonicalColumn::Position),
                Some(CanonicalColumn::Description),
            ],
            &cells(&["2", "7", "Filter"]),
            1,
        );
        let b = align_row(
            &[
                Some(CanonicalColumn::Description),
                Some(CanonicalColumn::Quantity),
                Some(CanonicalColumn::Position),
            ],
            &cells(&["Filter", "2", "7"]),
            1,
        );
        assert_eq!(a, b);
        assert_eq!(a.values()[0], "7");
    }

    #[test]
    fn test_duplicate_mapping_joins_in_source_order() {
        let columns = vec![
            Some(CanonicalColumn::Remark),
            Some(CanonicalColumn::Position),
            Some(CanonicalColumn::Remark),
        ];
        let row = align_row(&columns, &cells(&["left", "1", "right"]), 1);
        assert_eq!(row.get(CanonicalColumn::Remark), "left right");
    }

    #[test]
    fn test_short_rows_and_missing_cells() {
        let columns = vec![Some(CanonicalColumn::Position), Some(CanonicalColumn::Unit)];
        let row = align_row(&columns, &[Some("1".to_string())], 2);
        assert_eq!(row.get(CanonicalColumn::Unit), "");
        let row = align_row(&columns, &[None, Some("pcs".to_string())], 2);
        assert_eq!(row.get(CanonicalColumn::Unit), "pcs");
        assert_eq!(row.page, 2);
    }
}
