//! Grid-based table finder.
//!
//! Builds horizontal and vertical edges from ruling lines, explicit
//! boundaries or text rows, snaps and joins them, finds their intersections
//! and turns every closed rectangle of intersections into a cell. Connected
//! cells form tables; words are assigned to cells by their centre.

use serde::Serialize;

use crate::extraction::{group_into_lines, BBox, Page, Word};

/// Rectangular grid of optional cell texts. `None` marks a position with no
/// cell in the grid; an existing cell without text is `Some("")`.
pub type RawTable = Vec<Vec<Option<String>>>;

/// Edges shorter than this after joining are ignored.
const EDGE_MIN_LENGTH: f32 = 3.0;

/// Where horizontal (row) edges come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HorizontalStrategy {
    /// Ruling segments and rectangle edges.
    Lines,
    /// Ruling segments only.
    LinesStrict,
    /// Tops of text rows.
    Text,
}

/// Where vertical (column) edges come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerticalStrategy {
    /// Ruling segments and rectangle edges.
    Lines,
    /// Only `explicit_vertical_lines`.
    Explicit,
}

/// Settings for one run of the table finder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionConfig {
    pub join_tolerance: f32,
    pub intersection_tolerance: f32,
    pub snap_tolerance: f32,
    pub horizontal_strategy: HorizontalStrategy,
    pub vertical_strategy: VerticalStrategy,
    /// x positions turned into full-height vertical edges.
    pub explicit_vertical_lines: Vec<f32>,
    /// y positions turned into full-width horizontal edges.
    pub explicit_horizontal_lines: Vec<f32>,
    /// Restrict the search to this region of the page.
    pub crop: Option<BBox>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            join_tolerance: 3.0,
            intersection_tolerance: 3.0,
            snap_tolerance: 3.0,
            horizontal_strategy: HorizontalStrategy::Lines,
            vertical_strategy: VerticalStrategy::Lines,
            explicit_vertical_lines: Vec::new(),
            explicit_horizontal_lines: Vec::new(),
            crop: None,
        }
    }
}

/// A table found on a page: its cells and the extracted text grid.
#[derive(Debug, Clone, Serialize)]
pub struct TableGrid {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
    pub rows: RawTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// `position` is x for vertical edges and y for horizontal ones; `start` and
/// `end` run along the edge.
#[derive(Debug, Clone, Copy)]
struct Edge {
    orientation: Orientation,
    position: f32,
    start: f32,
    end: f32,
}

impl Edge {
    fn vertical(x: f32, top: f32, bottom: f32) -> Edge {
        Edge {
            orientation: Orientation::Vertical,
            position: x,
            start: top.min(bottom),
            end: top.max(bottom),
        }
    }

    fn horizontal(y: f32, x0: f32, x1: f32) -> Edge {
        Edge {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    fn length(&self) -> f32 {
        self.end - self.start
    }
}

#[derive(Debug)]
struct Intersection {
    x: f32,
    y: f32,
    verticals: Vec<usize>,
    horizontals: Vec<usize>,
}

/// Run the table finder and return the largest table on the page.
pub fn extract_table(page: &Page, config: &ExtractionConfig) -> Option<RawTable> {
    largest(find_tables(page, config)).map(|t| t.rows)
}

/// Pick the table with the most cells, the topmost one on ties.
pub fn largest(tables: Vec<TableGrid>) -> Option<TableGrid> {
    let mut best: Option<TableGrid> = None;
    for table in tables {
        if best.as_ref().map_or(true, |b| table.cells.len() > b.cells.len()) {
            best = Some(table);
        }
    }
    best
}

/// Find every table on the page, ordered top to bottom.
pub fn find_tables(page: &Page, config: &ExtractionConfig) -> Vec<TableGrid> {
    let cropped;
    let (page, region) = match config.crop {
        Some(region) => {
            cropped = page.crop(region);
            (&cropped, region)
        }
        None => (page, page.bbox()),
    };

    let edges = collect_edges(page, region, config);
    let vertical = merge_edges(edges.iter().filter(|e| e.orientation == Orientation::Vertical), config);
    let horizontal =
        merge_edges(edges.iter().filter(|e| e.orientation == Orientation::Horizontal), config);

    let intersections = find_intersections(&vertical, &horizontal, config.intersection_tolerance);
    let cells = intersections_to_cells(&intersections);

    cells_to_tables(cells)
        .into_iter()
        .map(|cells| build_grid(cells, &page.words))
        .collect()
}

fn collect_edges(page: &Page, region: BBox, config: &ExtractionConfig) -> Vec<Edge> {
    let mut edges = Vec::new();
    let line_tolerance = 1.0;

    if config.vertical_strategy == VerticalStrategy::Lines {
        for s in page.segments.iter().filter(|s| s.is_vertical(line_tolerance)) {
            edges.push(Edge::vertical(s.x0, s.y0, s.y1));
        }
        for r in &page.rects {
            edges.push(Edge::vertical(r.x_min, r.y_min, r.y_max));
            edges.push(Edge::vertical(r.x_max, r.y_min, r.y_max));
        }
    }
    for x in &config.explicit_vertical_lines {
        edges.push(Edge::vertical(*x, region.y_min, region.y_max));
    }

    match config.horizontal_strategy {
        HorizontalStrategy::Lines | HorizontalStrategy::LinesStrict => {
            for s in page.segments.iter().filter(|s| s.is_horizontal(line_tolerance)) {
                edges.push(Edge::horizontal(s.y0, s.x0, s.x1));
            }
            if config.horizontal_strategy == HorizontalStrategy::Lines {
                for r in &page.rects {
                    edges.push(Edge::horizontal(r.y_min, r.x_min, r.x_max));
                    edges.push(Edge::horizontal(r.y_max, r.x_min, r.x_max));
                }
            }
        }
        HorizontalStrategy::Text => {
            for y in text_row_edges(&page.words) {
                edges.push(Edge::horizontal(y, region.x_min, region.x_max));
            }
        }
    }
    for y in &config.explicit_horizontal_lines {
        edges.push(Edge::horizontal(*y, region.x_min, region.x_max));
    }

    edges
}

/// y positions separating text rows: the top of every row plus the bottom of
/// the last one.
pub(crate) fn text_row_edges(words: &[Word]) -> Vec<f32> {
    let lines = group_into_lines(words);
    let mut ys: Vec<f32> = lines.iter().map(|l| l.bbox.y_min).collect();
    if let Some(last) = lines.last() {
        ys.push(last.bbox.y_max);
    }
    ys
}

/// Snap edges of one orientation onto shared positions, then join collinear
/// pieces and drop the short ones.
fn merge_edges<'a>(edges: impl Iterator<Item = &'a Edge>, config: &ExtractionConfig) -> Vec<Edge> {
    let mut edges: Vec<Edge> = edges.copied().collect();
    edges.sort_by(|a, b| a.position.total_cmp(&b.position));

    // Snap: chain positions whose neighbours are within tolerance and move
    // each cluster to its mean.
    let mut start = 0;
    while start < edges.len() {
        let mut end = start + 1;
        while end < edges.len()
            && edges[end].position - edges[end - 1].position <= config.snap_tolerance
        {
            end += 1;
        }
        let mean =
            edges[start..end].iter().map(|e| e.position).sum::<f32>() / (end - start) as f32;
        for edge in &mut edges[start..end] {
            edge.position = mean;
        }
        start = end;
    }

    // Join: within each position, merge pieces that overlap or nearly touch.
    edges.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.start.total_cmp(&b.start))
    });
    let mut joined: Vec<Edge> = Vec::new();
    for edge in edges {
        match joined.last_mut() {
            Some(last)
                if last.position == edge.position
                    && edge.start <= last.end + config.join_tolerance =>
            {
                last.end = last.end.max(edge.end);
            }
            _ => joined.push(edge),
        }
    }

    joined.retain(|e| e.length() >= EDGE_MIN_LENGTH);
    joined
}

fn find_intersections(vertical: &[Edge], horizontal: &[Edge], tolerance: f32) -> Vec<Intersection> {
    let mut points: Vec<Intersection> = Vec::new();

    for (vi, v) in vertical.iter().enumerate() {
        for (hi, h) in horizontal.iter().enumerate() {
            let crosses = v.start - tolerance <= h.position
                && h.position <= v.end + tolerance
                && h.start - tolerance <= v.position
                && v.position <= h.end + tolerance;
            if !crosses {
                continue;
            }
            match points
                .iter_mut()
                .find(|p| p.x == v.position && p.y == h.position)
            {
                Some(point) => {
                    point.verticals.push(vi);
                    point.horizontals.push(hi);
                }
                None => points.push(Intersection {
                    x: v.position,
                    y: h.position,
                    verticals: vec![vi],
                    horizontals: vec![hi],
                }),
            }
        }
    }

    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points
}

fn shares(a: &[usize], b: &[usize]) -> bool {
    a.iter().any(|i| b.contains(i))
}

fn edge_connects(a: &Intersection, b: &Intersection) -> bool {
    if a.x == b.x && shares(&a.verticals, &b.verticals) {
        return true;
    }
    a.y == b.y && shares(&a.horizontals, &b.horizontals)
}

/// Every intersection that is the top-left corner of a closed rectangle
/// yields the smallest such rectangle as a cell.
fn intersections_to_cells(points: &[Intersection]) -> Vec<BBox> {
    let mut cells = Vec::new();

    for (i, pt) in points.iter().enumerate() {
        let rest = &points[i + 1..];
        let below = rest.iter().filter(|p| p.x == pt.x);
        let right: Vec<&Intersection> = rest.iter().filter(|p| p.y == pt.y).collect();

        'search: for below_pt in below {
            if !edge_connects(pt, below_pt) {
                continue;
            }
            for right_pt in &right {
                if !edge_connects(pt, right_pt) {
                    continue;
                }
                let corner = points
                    .iter()
                    .find(|p| p.x == right_pt.x && p.y == below_pt.y);
                if let Some(corner) = corner {
                    if edge_connects(corner, right_pt) && edge_connects(corner, below_pt) {
                        cells.push(BBox::new(pt.x, pt.y, corner.x, corner.y));
                        break 'search;
                    }
                }
            }
        }
    }

    cells
}

fn corners(cell: &BBox) -> [(f32, f32); 4] {
    [
        (cell.x_min, cell.y_min),
        (cell.x_min, cell.y_max),
        (cell.x_max, cell.y_min),
        (cell.x_max, cell.y_max),
    ]
}

/// Group cells that share corners into tables. Single-cell groups are not
/// tables.
fn cells_to_tables(cells: Vec<BBox>) -> Vec<Vec<BBox>> {
    let mut remaining = cells;
    let mut tables: Vec<Vec<BBox>> = Vec::new();

    while !remaining.is_empty() {
        let mut current = vec![remaining.remove(0)];
        let mut current_corners: Vec<(f32, f32)> = corners(&current[0]).to_vec();

        loop {
            let before = current.len();
            let mut i = 0;
            while i < remaining.len() {
                if corners(&remaining[i])
                    .iter()
                    .any(|c| current_corners.contains(c))
                {
                    let cell = remaining.remove(i);
                    current_corners.extend(corners(&cell));
                    current.push(cell);
                } else {
                    i += 1;
                }
            }
            if current.len() == before {
                break;
            }
        }

        tables.push(current);
    }

    tables.retain(|t| t.len() > 1);
    tables.sort_by(|a, b| {
        let key = |t: &Vec<BBox>| {
            t.iter()
                .map(|c| (c.y_min, c.x_min))
                .fold((f32::INFINITY, f32::INFINITY), |acc, k| {
                    if k.0 < acc.0 || (k.0 == acc.0 && k.1 < acc.1) {
                        k
                    } else {
                        acc
                    }
                })
        };
        let (ka, kb) = (key(a), key(b));
        ka.0.total_cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
    });
    tables
}

fn build_grid(mut cells: Vec<BBox>, words: &[Word]) -> TableGrid {
    cells.sort_by(|a, b| a.y_min.total_cmp(&b.y_min).then(a.x_min.total_cmp(&b.x_min)));

    let bbox = cells
        .iter()
        .skip(1)
        .fold(cells[0], |acc, c| acc.union(c));

    let mut xs: Vec<f32> = cells.iter().map(|c| c.x_min).collect();
    xs.sort_by(f32::total_cmp);
    xs.dedup();

    let mut rows: RawTable = Vec::new();
    let mut i = 0;
    while i < cells.len() {
        let top = cells[i].y_min;
        let mut j = i;
        while j < cells.len() && cells[j].y_min == top {
            j += 1;
        }
        let row_cells = &cells[i..j];
        let row = xs
            .iter()
            .map(|x| {
                row_cells
                    .iter()
                    .find(|c| c.x_min == *x)
                    .map(|c| cell_text(c, words))
            })
            .collect();
        rows.push(row);
        i = j;
    }

    TableGrid { bbox, cells, rows }
}

fn cell_text(cell: &BBox, words: &[Word]) -> String {
    let inside: Vec<Word> = words
        .iter()
        .filter(|w| {
            let (cx, cy) = w.bbox.center();
            cell.contains_point(cx, cy)
        })
        .cloned()
        .collect();
    group_into_lines(&inside)
        .into_iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::*;

    fn ruled_page() -> Page {
        // Two columns, three rows, fully ruled.
        let mut page = Page::new(1, 600.0, 800.0);
        for x in [40.0, 140.0, 400.0] {
            page.segments.push(vline(x, 100.0, 160.0));
        }
        for y in [100.0, 120.0, 140.0, 160.0] {
            page.segments.push(hline(40.0, y, 400.0));
        }
        page.words = vec![
            word("Pos", 45.0, 105.0),
            word("Description", 150.0, 105.0),
            word("1", 45.0, 125.0),
            word("Bolt", 150.0, 125.0),
            word("M8", 180.0, 125.0),
            word("2", 45.0, 145.0),
        ];
        page
    }

    #[test]
    fn test_ruled_grid() {
        let table = extract_table(&ruled_page(), &ExtractionConfig::default()).unwrap();
        assert_eq!(
            table,
            vec![
                vec![Some("Pos".to_string()), Some("Description".to_string())],
                vec![Some("1".to_string()), Some("Bolt M8".to_string())],
                vec![Some("2".to_string()), Some(String::new())],
            ]
        );
    }

    #[test]
    fn test_snap_joins_nearly_aligned_rulings() {
        let mut page = ruled_page();
        // Nudge one vertical ruling and split another into two pieces.
        page.segments[1] = vline(142.0, 100.0, 130.0);
        page.segments.push(vline(141.0, 131.0, 160.0));
        let table = extract_table(&page, &ExtractionConfig::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].len(), 2);
    }

    #[test]
    fn test_explicit_verticals_with_text_rows() {
        let mut page = Page::new(1, 600.0, 800.0);
        page.words = vec![
            word("Item", 70.0, 100.0),
            word("Qty", 230.0, 100.0),
            word("Valve", 70.0, 120.0),
            word("3", 230.0, 120.0),
        ];
        let config = ExtractionConfig {
            vertical_strategy: VerticalStrategy::Explicit,
            horizontal_strategy: HorizontalStrategy::Text,
            explicit_vertical_lines: vec![67.0, 225.0, 270.0],
            ..ExtractionConfig::default()
        };
        let table = extract_table(&page, &config).unwrap();
        assert_eq!(
            table,
            vec![
                vec![Some("Item".to_string()), Some("Qty".to_string())],
                vec![Some("Valve".to_string()), Some("3".to_string())],
            ]
        );
    }

    #[test]
    fn test_crop_limits_search() {
        let mut page = Page::new(1, 600.0, 800.0);
        page.words = vec![
            word("Header", 70.0, 50.0),
            word("Item", 70.0, 500.0),
            word("Valve", 70.0, 520.0),
        ];
        let config = ExtractionConfig {
            vertical_strategy: VerticalStrategy::Explicit,
            horizontal_strategy: HorizontalStrategy::Text,
            explicit_vertical_lines: vec![67.0, 225.0],
            crop: Some(BBox::new(0.0, 320.0, 600.0, 800.0)),
            ..ExtractionConfig::default()
        };
        let table = extract_table(&page, &config).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0][0].as_deref(), Some("Item"));
    }

    #[test]
    fn test_no_edges_no_table() {
        let mut page = Page::new(1, 600.0, 800.0);
        page.words = vec![word("lonely", 10.0, 10.0)];
        assert!(extract_table(&page, &ExtractionConfig::default()).is_none());
    }

    #[test]
    fn test_missing_cell_is_none() {
        // Second row has no divider, so it spans both columns.
        let mut page = Page::new(1, 600.0, 800.0);
        page.segments = vec![
            vline(40.0, 100.0, 140.0),
            vline(140.0, 100.0, 120.0),
            vline(400.0, 100.0, 140.0),
            hline(40.0, 100.0, 400.0),
            hline(40.0, 120.0, 400.0),
            hline(40.0, 140.0, 400.0),
        ];
        page.words = vec![word("A", 45.0, 105.0), word("wide", 45.0, 125.0)];
        let table = extract_table(&page, &ExtractionConfig::default()).unwrap();
        assert_eq!(table[1], vec![Some("wide".to_string()), None]);
    }
}
