pub mod geometry;

use serde::Serialize;
use std::fmt;

use crate::extraction::table::{ExtractionConfig, HorizontalStrategy, VerticalStrategy};
use crate::extraction::Page;
use crate::model::IdentifierPolicy;

/// Bottom edge closing the last row on catalogs that draw no final ruling.
const PAGE_BOTTOM_LINE: f32 = 800.0;

const STANDARD_JOIN_TOLERANCE: f32 = 7.0;
const STANDARD_INTERSECTION_TOLERANCE: f32 = 8.0;
const STANDARD_SNAP_TOLERANCE: f32 = 5.0;
const BILINGUAL_SNAP_TOLERANCE: f32 = 9.0;
const DEFAULT_JOIN_TOLERANCE: f32 = 3.0;

const BILINGUAL_REMARK_COLUMNS: &[f32] = &[43.0, 100.0, 140.0, 264.0, 400.0, 430.0, 540.0];
const QUANTITY_UNIT_COLUMNS: &[f32] = &[40.0, 70.0, 110.0, 220.0, 330.0, 365.0, 410.0, 505.0, 550.0];
const POSITION_MPOS_COLUMNS: &[f32] = &[40.0, 70.0, 110.0, 220.0, 340.0, 380.0, 510.0, 550.0];
const POSITION_COLUMNS: &[f32] = &[40.0, 70.0, 110.0, 220.0, 330.0, 370.0, 410.0, 510.0, 550.0];
const FIGURE_COLUMNS: &[f32] = &[40.0, 70.0, 110.0, 220.0, 340.0, 380.0, 510.0, 550.0];
const ITEM_QUANTITY_COLUMNS: &[f32] = &[43.0, 90.0, 200.0, 320.0, 370.0, 440.0, 560.0];
const ITEM_QUANTITY_PLAIN_COLUMNS: &[f32] = &[50.0, 85.0, 260.0, 440.0, 480.0, 555.0];
const ITEM_QUANTITY_FULL_COLUMNS: &[f32] = &[50.0, 85.0, 180.0, 260.0, 310.0, 380.0, 470.0, 555.0];
const COMMENT_HEADER_COLUMNS: &[f32] = &[35.0, 100.0, 235.0, 365.0, 440.0, 570.0];
const COMMENT_SUBHEADER_COLUMNS: &[f32] = &[50.0, 100.0, 235.0, 365.0, 440.0, 550.0];
const DESIGNATION_COLUMNS: &[f32] = &[40.0, 125.0, 295.0, 465.0, 550.0];

/// Page layouts seen across vendor catalogs, told apart by their first text
/// lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    /// Index pages; never hold part rows.
    TableOfContents,
    BilingualRemark,
    QuantityUnit,
    PositionMpos,
    Position,
    Figure,
    ItemQuantity { comment: bool, mpos: bool },
    CommentHeader,
    CommentSubheader,
    Designation,
    /// Unknown layout; boundaries are inferred from the page.
    Generic,
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutVariant::TableOfContents => write!(f, "table-of-contents"),
            LayoutVariant::BilingualRemark => write!(f, "bilingual-remark"),
            LayoutVariant::QuantityUnit => write!(f, "quantity-unit"),
            LayoutVariant::PositionMpos => write!(f, "position-mpos"),
            LayoutVariant::Position => write!(f, "position"),
            LayoutVariant::Figure => write!(f, "figure"),
            LayoutVariant::ItemQuantity { comment, mpos } => {
                write!(f, "item-quantity")?;
                if *comment {
                    write!(f, "+comment")?;
                }
                if *mpos {
                    write!(f, "+mpos")?;
                }
                Ok(())
            }
            LayoutVariant::CommentHeader => write!(f, "comment-header"),
            LayoutVariant::CommentSubheader => write!(f, "comment-subheader"),
            LayoutVariant::Designation => write!(f, "designation"),
            LayoutVariant::Generic => write!(f, "generic"),
        }
    }
}

/// Classify a page by the fingerprints in its first three text lines.
pub fn classify(page: &Page) -> LayoutVariant {
    let text = page.text();
    if text.contains("Inhaltsverzeichnis") || text.contains("overview") {
        return LayoutVariant::TableOfContents;
    }

    let lines: Vec<&str> = text.lines().collect();
    let line = |i: usize| lines.get(i).copied().unwrap_or("");
    let (first, second, third) = (line(0), line(1), line(2));

    if second.contains("Bemerkung") && !second.contains("Ident./") {
        LayoutVariant::BilingualRemark
    } else if second.contains("ME/") || second.contains("Qty. Unit/") {
        LayoutVariant::QuantityUnit
    } else if second.contains("Pos./") && (second.contains("MPOS") || second.contains("Bemerkung")) {
        LayoutVariant::PositionMpos
    } else if second.contains("Pos./") {
        LayoutVariant::Position
    } else if second.contains("Fig./") {
        LayoutVariant::Figure
    } else if second.contains("Quanti") || third.contains("Quanti") {
        LayoutVariant::ItemQuantity {
            comment: text.contains("Comment"),
            mpos: text.contains("Mpos"),
        }
    } else if first.contains("Comment") {
        LayoutVariant::CommentHeader
    } else if second.contains("Comment") {
        LayoutVariant::CommentSubheader
    } else if second.contains("Benennung") {
        LayoutVariant::Designation
    } else {
        LayoutVariant::Generic
    }
}

impl LayoutVariant {
    /// Table finder settings for this layout, or `None` for pages that are
    /// skipped.
    pub fn extraction_config(&self, page: &Page) -> Option<ExtractionConfig> {
        let config = match self {
            LayoutVariant::TableOfContents => return None,
            LayoutVariant::BilingualRemark => ExtractionConfig {
                horizontal_strategy: HorizontalStrategy::Lines,
                snap_tolerance: BILINGUAL_SNAP_TOLERANCE,
                ..standard(BILINGUAL_REMARK_COLUMNS, true)
            },
            LayoutVariant::QuantityUnit => standard(QUANTITY_UNIT_COLUMNS, true),
            LayoutVariant::PositionMpos => standard(POSITION_MPOS_COLUMNS, false),
            LayoutVariant::Position => standard(POSITION_COLUMNS, false),
            LayoutVariant::Figure => standard(FIGURE_COLUMNS, false),
            LayoutVariant::ItemQuantity { comment, mpos } => {
                let columns = match (*comment, *mpos) {
                    (false, true) | (true, false) => ITEM_QUANTITY_COLUMNS,
                    (false, false) => ITEM_QUANTITY_PLAIN_COLUMNS,
                    (true, true) => ITEM_QUANTITY_FULL_COLUMNS,
                };
                standard(columns, false)
            }
            LayoutVariant::CommentHeader => standard(COMMENT_HEADER_COLUMNS, true),
            LayoutVariant::CommentSubheader => standard(COMMENT_SUBHEADER_COLUMNS, true),
            LayoutVariant::Designation => ExtractionConfig {
                join_tolerance: DEFAULT_JOIN_TOLERANCE,
                ..standard(DESIGNATION_COLUMNS, true)
            },
            LayoutVariant::Generic => inferred(page),
        };
        Some(config)
    }

    pub fn identifier_policy(&self) -> IdentifierPolicy {
        match self {
            LayoutVariant::Designation => IdentifierPolicy::NonEmpty,
            _ => IdentifierPolicy::Numeric,
        }
    }
}

/// Explicit columns, ruled rows.
fn standard(columns: &[f32], bottom_line: bool) -> ExtractionConfig {
    ExtractionConfig {
        join_tolerance: STANDARD_JOIN_TOLERANCE,
        intersection_tolerance: STANDARD_INTERSECTION_TOLERANCE,
        snap_tolerance: STANDARD_SNAP_TOLERANCE,
        horizontal_strategy: HorizontalStrategy::LinesStrict,
        vertical_strategy: VerticalStrategy::Explicit,
        explicit_vertical_lines: columns.to_vec(),
        explicit_horizontal_lines: if bottom_line {
            vec![PAGE_BOTTOM_LINE]
        } else {
            Vec::new()
        },
        crop: None,
    }
}

/// Boundaries taken from the page itself. Rows come from the rulings when
/// there are any, otherwise from the text lines below the header.
fn inferred(page: &Page) -> ExtractionConfig {
    let columns = geometry::infer_column_boundaries(page);
    let rows = geometry::infer_row_boundaries(page, columns.table_top);
    ExtractionConfig {
        explicit_horizontal_lines: rows,
        ..standard(&columns.xs, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::*;

    fn page_with_lines(lines: &[&str]) -> Page {
        let mut page = Page::new(1, 595.0, 842.0);
        for (i, line) in lines.iter().enumerate() {
            let top = 40.0 + i as f32 * 20.0;
            let mut x = 40.0;
            for token in line.split_whitespace() {
                page.words.push(word(token, x, top));
                x += token.chars().count() as f32 * 5.0 + 5.0;
            }
        }
        page
    }

    #[test]
    fn test_table_of_contents_skipped() {
        let page = page_with_lines(&["Inhaltsverzeichnis", "1 Motor"]);
        let variant = classify(&page);
        assert_eq!(variant, LayoutVariant::TableOfContents);
        assert!(variant.extraction_config(&page).is_none());
    }

    #[test]
    fn test_second_line_fingerprints() {
        let cases = [
            ("Pos./ Benennung Bemerkung", LayoutVariant::BilingualRemark),
            ("Pos./ Ident./ ME/ Menge", LayoutVariant::QuantityUnit),
            ("Pos./ Ident./ MPOS", LayoutVariant::PositionMpos),
            ("Pos./ Ident./ Menge/", LayoutVariant::Position),
            ("Fig./ No./ Nomenclature", LayoutVariant::Figure),
            ("Item SeboNr Comment", LayoutVariant::CommentSubheader),
            ("Pos Benennung", LayoutVariant::Designation),
            ("nothing familiar", LayoutVariant::Generic),
        ];
        for (second, expected) in cases {
            let page = page_with_lines(&["SENNEBOGEN 818", second, "1 2 3"]);
            assert_eq!(classify(&page), expected, "line: {second}");
        }
    }

    #[test]
    fn test_item_quantity_sub_cases() {
        let page = page_with_lines(&["Catalog", "Group", "Item SeboNr Description Quantity Unit Mpos"]);
        let variant = classify(&page);
        assert_eq!(
            variant,
            LayoutVariant::ItemQuantity {
                comment: false,
                mpos: true
            }
        );
        let config = variant.extraction_config(&page).unwrap();
        assert_eq!(config.explicit_vertical_lines, ITEM_QUANTITY_COLUMNS.to_vec());

        let page = page_with_lines(&["Catalog", "Item Quantity Comment Mpos"]);
        let config = classify(&page).extraction_config(&page).unwrap();
        assert_eq!(config.explicit_vertical_lines, ITEM_QUANTITY_FULL_COLUMNS.to_vec());
    }

    #[test]
    fn test_comment_on_first_line() {
        let page = page_with_lines(&["Item SeboNr Description Comment", "1 4711 Pump"]);
        assert_eq!(classify(&page), LayoutVariant::CommentHeader);
    }

    #[test]
    fn test_short_page_falls_through() {
        let page = page_with_lines(&["only one line"]);
        assert_eq!(classify(&page), LayoutVariant::Generic);
    }

    #[test]
    fn test_presets() {
        let page = Page::new(1, 595.0, 842.0);
        let bilingual = LayoutVariant::BilingualRemark
            .extraction_config(&page)
            .unwrap();
        assert_eq!(bilingual.horizontal_strategy, HorizontalStrategy::Lines);
        assert_eq!(bilingual.snap_tolerance, 9.0);
        assert_eq!(bilingual.explicit_horizontal_lines, vec![800.0]);

        let designation = LayoutVariant::Designation.extraction_config(&page).unwrap();
        assert_eq!(designation.join_tolerance, 3.0);
        assert_eq!(
            LayoutVariant::Designation.identifier_policy(),
            IdentifierPolicy::NonEmpty
        );

        let position = LayoutVariant::Position.extraction_config(&page).unwrap();
        assert_eq!(position.horizontal_strategy, HorizontalStrategy::LinesStrict);
        assert!(position.explicit_horizontal_lines.is_empty());
        assert_eq!(position.join_tolerance, 7.0);
        assert_eq!(position.intersection_tolerance, 8.0);
    }

    #[test]
    fn test_generic_uses_inferred_boundaries() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.words = vec![word("1", 60.0, 140.0)];
        let config = LayoutVariant::Generic.extraction_config(&page).unwrap();
        assert_eq!(config.vertical_strategy, VerticalStrategy::Explicit);
        assert_eq!(
            config.explicit_vertical_lines,
            vec![40.0, 50.0, 100.0, 235.0, 460.0, 550.0]
        );
        assert_eq!(config.explicit_horizontal_lines, vec![140.0, 150.0]);
    }
}
