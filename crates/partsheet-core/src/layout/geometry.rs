//! Column and row boundary inference for pages without a known layout.

use serde::Serialize;
use tracing::debug;

use crate::extraction::table::text_row_edges;
use crate::extraction::{group_into_lines, BBox, Page, Word, LINE_TOLERANCE};

/// Boundaries used when nothing on the page gives a usable column layout.
pub const DEFAULT_BOUNDARIES: [f32; 5] = [50.0, 100.0, 235.0, 460.0, 550.0];

/// Fraction of the page height searched for the table header.
pub const HEADER_BAND_FRACTION: f32 = 0.25;

/// Vertical rulings shorter than this are ignored.
pub const MIN_SEGMENT_HEIGHT: f32 = 20.0;

/// x positions closer than this belong to the same boundary.
pub const CLUSTER_TOLERANCE: f32 = 5.0;

/// Fewest header words needed for text-based inference.
pub const MIN_HEADER_WORDS: usize = 3;

/// Fewest distinct rulings needed for line-based inference.
pub const MIN_RULINGS: usize = 3;

/// Fewest header boxes needed for box-based inference.
pub const MIN_HEADER_BOXES: usize = 2;

/// Words at least this much larger than the median size count as headers.
pub const LARGE_FONT_FACTOR: f32 = 1.15;

/// Horizontal gap, in multiples of the font size, separating two header
/// phrases on one line.
pub const PHRASE_GAP: f32 = 1.0;

/// Distance kept between a header's left edge and its boundary.
pub const TEXT_PADDING: f32 = 2.0;

/// Distance of the outer boundaries from the page edges.
pub const PAGE_MARGIN: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySource {
    Rulings,
    HeaderBoxes,
    HeaderText,
    Default,
}

/// Ordered column edges for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnBoundarySet {
    pub xs: Vec<f32>,
    pub source: BoundarySource,
    /// Top of the table header when it could be located.
    pub table_top: Option<f32>,
}

/// Infer column boundaries for a page. Always returns a usable set: sorted,
/// deduplicated within [`CLUSTER_TOLERANCE`], and enclosing the page margins.
pub fn infer_column_boundaries(page: &Page) -> ColumnBoundarySet {
    let candidate = from_rulings(page)
        .or_else(|| from_header_boxes(page))
        .or_else(|| from_header_text(page));

    let set = match candidate {
        Some((xs, source, table_top)) => ColumnBoundarySet {
            xs: finalize(xs, page.width),
            source,
            table_top: Some(table_top),
        },
        None => ColumnBoundarySet {
            xs: finalize(DEFAULT_BOUNDARIES.to_vec(), page.width),
            source: BoundarySource::Default,
            table_top: None,
        },
    };

    debug!(
        page = page.page_number,
        source = ?set.source,
        boundaries = ?set.xs,
        "inferred column boundaries"
    );
    set
}

/// Row boundaries from text lines, starting at the table header. Returns an
/// empty list when the page has horizontal rulings of its own.
pub fn infer_row_boundaries(page: &Page, table_top: Option<f32>) -> Vec<f32> {
    let has_rulings = page
        .segments
        .iter()
        .any(|s| s.is_horizontal(1.0) && s.width() >= MIN_SEGMENT_HEIGHT);
    if has_rulings {
        return Vec::new();
    }

    let top = table_top.unwrap_or(0.0) - LINE_TOLERANCE;
    let words: Vec<Word> = page
        .words
        .iter()
        .filter(|w| w.bbox.y_min >= top)
        .cloned()
        .collect();
    text_row_edges(&words)
}

/// Strategy A: tall vertical rulings.
fn from_rulings(page: &Page) -> Option<(Vec<f32>, BoundarySource, f32)> {
    let rulings: Vec<_> = page
        .segments
        .iter()
        .filter(|s| s.is_vertical(1.0) && s.height() >= MIN_SEGMENT_HEIGHT)
        .collect();
    let xs = cluster(rulings.iter().map(|s| s.x0).collect());
    if xs.len() < MIN_RULINGS {
        return None;
    }
    let top = rulings
        .iter()
        .map(|s| s.y0.min(s.y1))
        .fold(f32::INFINITY, f32::min);
    Some((xs, BoundarySource::Rulings, top))
}

/// Strategy C: header cell rectangles. Stacked boxes sharing both column
/// edges are one two-line header cell.
fn from_header_boxes(page: &Page) -> Option<(Vec<f32>, BoundarySource, f32)> {
    let band_bottom = page.height * HEADER_BAND_FRACTION;
    let mut boxes: Vec<BBox> = page
        .rects
        .iter()
        .filter(|r| r.y_min <= band_bottom && r.width() < page.width * 0.9)
        .copied()
        .collect();
    boxes.sort_by(|a, b| a.y_min.total_cmp(&b.y_min));

    let mut merged: Vec<BBox> = Vec::new();
    for b in boxes {
        let stacked = merged.iter_mut().find(|m| {
            (m.x_min - b.x_min).abs() <= CLUSTER_TOLERANCE
                && (m.x_max - b.x_max).abs() <= CLUSTER_TOLERANCE
                && (b.y_min - m.y_max).abs() <= CLUSTER_TOLERANCE
        });
        match stacked {
            Some(m) => *m = m.union(&b),
            None => merged.push(b),
        }
    }

    if merged.len() < MIN_HEADER_BOXES {
        return None;
    }

    let top = merged.iter().map(|b| b.y_min).fold(f32::INFINITY, f32::min);
    let edges = merged.iter().flat_map(|b| [b.x_min, b.x_max]).collect();
    Some((cluster(edges), BoundarySource::HeaderBoxes, top))
}

/// Strategy B: left edges of bold or large header phrases.
fn from_header_text(page: &Page) -> Option<(Vec<f32>, BoundarySource, f32)> {
    let band_bottom = page.height * HEADER_BAND_FRACTION;
    let band: Vec<&Word> = page
        .words
        .iter()
        .filter(|w| w.bbox.y_min <= band_bottom)
        .collect();

    let median = median_font_size(&page.words)?;
    let header_words: Vec<Word> = band
        .into_iter()
        .filter(|w| w.bold || w.font_size >= median * LARGE_FONT_FACTOR)
        .cloned()
        .collect();
    if header_words.len() < MIN_HEADER_WORDS {
        return None;
    }

    let mut lefts = Vec::new();
    for line in group_into_lines_words(&header_words) {
        let mut previous: Option<&Word> = None;
        for word in line {
            let starts_phrase = previous.map_or(true, |p| {
                word.bbox.x_min - p.bbox.x_max > word.font_size * PHRASE_GAP
            });
            if starts_phrase {
                lefts.push(word.bbox.x_min - TEXT_PADDING);
            }
            previous = Some(word);
        }
    }

    let top = header_words
        .iter()
        .map(|w| w.bbox.y_min)
        .fold(f32::INFINITY, f32::min);
    let mut xs = cluster(lefts);
    xs.push(page.width - PAGE_MARGIN);
    Some((xs, BoundarySource::HeaderText, top))
}

/// Words grouped into lines, each line sorted left to right.
fn group_into_lines_words(words: &[Word]) -> Vec<Vec<&Word>> {
    let lines = group_into_lines(words);
    lines
        .iter()
        .map(|line| {
            let mut members: Vec<&Word> = words
                .iter()
                .filter(|w| {
                    let (cx, cy) = w.bbox.center();
                    line.bbox.contains_point(cx, cy)
                })
                .collect();
            members.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
            members
        })
        .collect()
}

fn median_font_size(words: &[Word]) -> Option<f32> {
    let mut sizes: Vec<f32> = words.iter().map(|w| w.font_size).collect();
    if sizes.is_empty() {
        return None;
    }
    sizes.sort_by(f32::total_cmp);
    Some(sizes[sizes.len() / 2])
}

/// Cluster positions whose neighbours lie within [`CLUSTER_TOLERANCE`] and
/// return the sorted cluster centres.
fn cluster(mut xs: Vec<f32>) -> Vec<f32> {
    xs.sort_by(f32::total_cmp);
    let mut groups: Vec<Vec<f32>> = Vec::new();
    for x in xs {
        match groups.last_mut() {
            Some(group) if group.last().is_some_and(|last| x - last <= CLUSTER_TOLERANCE) => {
                group.push(x)
            }
            _ => groups.push(vec![x]),
        }
    }
    groups
        .into_iter()
        .map(|g| g.iter().sum::<f32>() / g.len() as f32)
        .collect()
}

/// Sort, add the page margins when nothing lies outside them, and drop
/// boundaries within tolerance of the previous one.
fn finalize(mut xs: Vec<f32>, page_width: f32) -> Vec<f32> {
    xs.retain(|x| x.is_finite());
    xs.sort_by(f32::total_cmp);

    let right_margin = page_width - PAGE_MARGIN;
    if xs.first().map_or(true, |x| *x > PAGE_MARGIN) {
        xs.insert(0, PAGE_MARGIN);
    }
    if xs.last().map_or(true, |x| *x < right_margin) {
        xs.push(right_margin);
    }

    let mut out: Vec<f32> = Vec::new();
    for x in xs {
        if out.last().map_or(true, |last| x - last > CLUSTER_TOLERANCE) {
            out.push(x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::*;

    fn assert_well_formed(set: &ColumnBoundarySet, width: f32) {
        assert!(set.xs.windows(2).all(|w| w[1] - w[0] > CLUSTER_TOLERANCE));
        assert!(set.xs[0] <= PAGE_MARGIN);
        assert!(*set.xs.last().unwrap() >= width - PAGE_MARGIN);
    }

    #[test]
    fn test_rulings_clustered() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.segments = vec![
            vline(38.0, 100.0, 700.0),
            vline(39.5, 700.0, 760.0),
            vline(120.0, 100.0, 700.0),
            vline(300.0, 100.0, 700.0),
            vline(556.0, 100.0, 700.0),
            // Too short to be a ruling.
            vline(450.0, 100.0, 105.0),
        ];
        let set = infer_column_boundaries(&page);
        assert_eq!(set.source, BoundarySource::Rulings);
        assert_eq!(set.xs, vec![38.75, 120.0, 300.0, 556.0]);
        assert_eq!(set.table_top, Some(100.0));
        assert_well_formed(&set, page.width);
    }

    #[test]
    fn test_bold_header_text() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.words = vec![
            bold_word("Item", 60.0, 100.0),
            bold_word("Ident./", 150.0, 100.0),
            bold_word("No.", 150.0, 112.0),
            bold_word("Description", 260.0, 100.0),
            word("1", 60.0, 140.0),
            word("4711", 150.0, 140.0),
            word("Pump", 260.0, 140.0),
        ];
        let set = infer_column_boundaries(&page);
        assert_eq!(set.source, BoundarySource::HeaderText);
        assert_eq!(set.xs, vec![40.0, 58.0, 148.0, 258.0, 555.0]);
        assert_eq!(set.table_top, Some(100.0));
        assert_well_formed(&set, page.width);
    }

    #[test]
    fn test_stacked_header_boxes_merge() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.rects = vec![
            BBox::new(50.0, 100.0, 150.0, 112.0),
            BBox::new(50.0, 112.0, 150.0, 124.0),
            BBox::new(150.0, 100.0, 400.0, 124.0),
        ];
        let set = infer_column_boundaries(&page);
        assert_eq!(set.source, BoundarySource::HeaderBoxes);
        assert_eq!(set.xs, vec![40.0, 50.0, 150.0, 400.0, 555.0]);
    }

    #[test]
    fn test_fallback_to_default() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.words = vec![word("hello", 60.0, 100.0)];
        let set = infer_column_boundaries(&page);
        assert_eq!(set.source, BoundarySource::Default);
        // 550 already sits within tolerance of the right margin.
        assert_eq!(set.xs, vec![40.0, 50.0, 100.0, 235.0, 460.0, 550.0]);
        assert_eq!(set.table_top, None);
    }

    #[test]
    fn test_row_boundaries_from_text() {
        let mut page = Page::new(1, 595.0, 842.0);
        page.words = vec![
            word("Title", 60.0, 40.0),
            word("Item", 60.0, 100.0),
            word("1", 60.0, 120.0),
        ];
        assert_eq!(infer_row_boundaries(&page, Some(100.0)), vec![100.0, 120.0, 130.0]);

        page.segments.push(hline(40.0, 95.0, 500.0));
        assert!(infer_row_boundaries(&page, Some(100.0)).is_empty());
    }
}
