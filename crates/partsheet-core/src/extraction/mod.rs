pub mod content;
pub mod debug;
pub mod pdftotext;
pub mod table;

use serde::Serialize;

use crate::error::PartsheetError;

/// Vertical distance within which words are considered to sit on the same line.
pub const LINE_TOLERANCE: f32 = 3.0;

/// Axis-aligned box in page space. The origin is the top-left corner of the
/// page, so `y_min` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        BBox {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

/// A word with its bounding box and the font it was set in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub bold: bool,
}

/// A straight stroked segment. Rectangle outlines are kept separately in
/// [`Page::rects`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Segment {
    pub fn is_vertical(&self, tolerance: f32) -> bool {
        (self.x0 - self.x1).abs() <= tolerance
    }

    pub fn is_horizontal(&self, tolerance: f32) -> bool {
        (self.y0 - self.y1).abs() <= tolerance
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }
}

/// A line of text assembled from words sharing a baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub bbox: BBox,
}

/// Content extracted from a single page of a PDF.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub words: Vec<Word>,
    pub segments: Vec<Segment>,
    pub rects: Vec<BBox>,
    /// Why the backend could not read this page; such pages carry no content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl Page {
    pub fn new(page_number: usize, width: f32, height: f32) -> Self {
        Page {
            page_number,
            width,
            height,
            words: Vec::new(),
            segments: Vec::new(),
            rects: Vec::new(),
            read_error: None,
        }
    }

    /// A blank page standing in for one the backend failed to read.
    pub fn unreadable(
        page_number: usize,
        width: f32,
        height: f32,
        reason: impl Into<String>,
    ) -> Self {
        Page {
            read_error: Some(reason.into()),
            ..Page::new(page_number, width, height)
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }

    /// Group words into lines, top to bottom and left to right.
    pub fn text_lines(&self) -> Vec<TextLine> {
        group_into_lines(&self.words)
    }

    /// Plain text of the page, one text line per output line.
    pub fn text(&self) -> String {
        self.text_lines()
            .into_iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Restrict the page to a region. Words are kept when their centre falls
    /// inside the region; geometry is clipped to it.
    pub fn crop(&self, region: BBox) -> Page {
        let words = self
            .words
            .iter()
            .filter(|w| {
                let (cx, cy) = w.bbox.center();
                region.contains_point(cx, cy)
            })
            .cloned()
            .collect();

        let segments = self
            .segments
            .iter()
            .filter_map(|s| clip_segment(s, &region))
            .collect();

        let rects = self
            .rects
            .iter()
            .filter_map(|r| {
                let clipped = BBox {
                    x_min: r.x_min.max(region.x_min),
                    y_min: r.y_min.max(region.y_min),
                    x_max: r.x_max.min(region.x_max),
                    y_max: r.y_max.min(region.y_max),
                };
                (clipped.x_min <= clipped.x_max && clipped.y_min <= clipped.y_max)
                    .then_some(clipped)
            })
            .collect();

        Page {
            page_number: self.page_number,
            width: self.width,
            height: self.height,
            words,
            segments,
            rects,
            read_error: self.read_error.clone(),
        }
    }
}

fn clip_segment(s: &Segment, region: &BBox) -> Option<Segment> {
    if s.is_vertical(0.5) {
        let x = s.x0;
        if x < region.x_min || x > region.x_max {
            return None;
        }
        let top = s.y0.min(s.y1).max(region.y_min);
        let bottom = s.y0.max(s.y1).min(region.y_max);
        return (top <= bottom).then_some(Segment {
            x0: x,
            y0: top,
            x1: x,
            y1: bottom,
        });
    }
    if s.is_horizontal(0.5) {
        let y = s.y0;
        if y < region.y_min || y > region.y_max {
            return None;
        }
        let left = s.x0.min(s.x1).max(region.x_min);
        let right = s.x0.max(s.x1).min(region.x_max);
        return (left <= right).then_some(Segment {
            x0: left,
            y0: y,
            x1: right,
            y1: y,
        });
    }
    // Diagonal strokes never take part in table detection.
    None
}

pub(crate) fn group_into_lines(words: &[Word]) -> Vec<TextLine> {
    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .y_min
            .total_cmp(&b.bbox.y_min)
            .then(a.bbox.x_min.total_cmp(&b.bbox.x_min))
    });

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    for word in sorted {
        match lines.last_mut() {
            Some(line) if (line[0].bbox.y_min - word.bbox.y_min).abs() <= LINE_TOLERANCE => {
                line.push(word)
            }
            _ => lines.push(vec![word]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
            let bbox = line
                .iter()
                .skip(1)
                .fold(line[0].bbox, |acc, w| acc.union(&w.bbox));
            let text = line
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            TextLine { text, bbox }
        })
        .collect()
}

/// Trait for PDF extraction backends.
pub trait PageSource: Send + Sync {
    /// Extract words and geometry from PDF bytes, returning one Page per page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<Page>, PartsheetError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn word(text: &str, x: f32, top: f32) -> Word {
        let width = text.chars().count() as f32 * 5.0;
        Word {
            text: text.to_string(),
            bbox: BBox::new(x, top, x + width, top + 10.0),
            font_size: 10.0,
            bold: false,
        }
    }

    pub fn bold_word(text: &str, x: f32, top: f32) -> Word {
        Word {
            bold: true,
            ..word(text, x, top)
        }
    }

    pub fn vline(x: f32, top: f32, bottom: f32) -> Segment {
        Segment {
            x0: x,
            y0: top,
            x1: x,
            y1: bottom,
        }
    }

    pub fn hline(x0: f32, y: f32, x1: f32) -> Segment {
        Segment { x0, y0: y, x1, y1: y }
    }
}
