//! Page extraction straight from PDF content streams.
//!
//! Walks the operators of each page, tracking the graphics and text state
//! well enough to place every glyph and every ruling line on the page. Text
//! decoding uses the font's declared encoding; fonts that only carry a
//! ToUnicode map decode poorly here, use the pdftotext backend for those.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::error::PartsheetError;
use crate::extraction::{BBox, Page, PageSource, Segment, Word};

/// Fallback page size (US Letter) when a page declares no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Glyph width in thousandths of an em when the font has no widths.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Ascent/descent as a fraction of the font size, used for glyph boxes.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// Gap (in multiples of the font size) that splits two glyphs into two words.
const WORD_GAP: f32 = 0.25;

/// Rectangles thinner than this are treated as ruling lines.
const THIN_RECT: f32 = 2.0;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

/// PDF extraction backend that interprets content streams with `lopdf`.
pub struct LopdfSource;

impl LopdfSource {
    pub fn new() -> Self {
        LopdfSource
    }
}

impl Default for LopdfSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for LopdfSource {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<Page>, PartsheetError> {
        let document = Document::load_mem(pdf_bytes)?;
        let mut pages = Vec::new();

        for (page_no, page_id) in document.get_pages() {
            let page_number = page_no as usize;
            match read_page(&document, page_number, page_id) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!(page = page_number, "failed to read page content: {e}");
                    let [llx, lly, urx, ury] = media_box(&document, page_id);
                    pages.push(Page::unreadable(
                        page_number,
                        urx - llx,
                        ury - lly,
                        e.to_string(),
                    ));
                }
            }
        }

        if pages.is_empty() {
            return Err(PartsheetError::Extraction("PDF has no pages".into()));
        }

        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "lopdf"
    }
}

fn read_page(
    document: &Document,
    page_number: usize,
    page_id: ObjectId,
) -> Result<Page, PartsheetError> {
    let [llx, lly, urx, ury] = media_box(document, page_id);
    let raw_content = document.get_page_content(page_id)?;
    let content = Content::decode(&raw_content)?;
    if content.operations.is_empty() && raw_content.iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(PartsheetError::Extraction(
            "content stream has no readable operators".into(),
        ));
    }

    let fonts: BTreeMap<Vec<u8>, FontInfo> = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, FontInfo::from_dict(document, font)))
        .collect();

    let mut interpreter = Interpreter::new(&fonts, llx, ury);
    for operation in &content.operations {
        interpreter.execute(&operation.operator, &operation.operands);
    }
    interpreter.flush_word();

    debug!(
        page = page_number,
        words = interpreter.words.len(),
        segments = interpreter.segments.len(),
        rects = interpreter.rects.len(),
        "read page content"
    );

    Ok(Page {
        page_number,
        width: urx - llx,
        height: ury - lly,
        words: interpreter.words,
        segments: interpreter.segments,
        rects: interpreter.rects,
        read_error: None,
    })
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

/// MediaBox of a page, following the Parent chain for inherited values.
fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let Ok(dict) = document.get_dictionary(id) else {
            break;
        };
        if let Ok(value) = dict.get(b"MediaBox") {
            if let Ok(items) = resolve(document, value).as_array() {
                let values = items
                    .iter()
                    .filter_map(|o| number(resolve(document, o)))
                    .collect::<Vec<_>>();
                if let [llx, lly, urx, ury] = values[..] {
                    return [llx, lly, urx, ury];
                }
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 32 {
            break;
        }
    }

    DEFAULT_MEDIA_BOX
}

/// The parts of a font dictionary needed to place and decode glyphs.
#[derive(Debug, Clone)]
struct FontInfo {
    encoding: String,
    bold: bool,
    two_byte: bool,
    first_char: i64,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
}

impl FontInfo {
    fn from_dict(document: &Document, font: &Dictionary) -> FontInfo {
        let base_font = font
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_default();
        let subtype = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|n| n.to_vec())
            .unwrap_or_default();

        let mut info = FontInfo {
            encoding: font.get_font_encoding().to_string(),
            bold: is_bold_font_name(&base_font),
            two_byte: subtype == b"Type0",
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
        };

        if info.two_byte {
            info.read_cid_widths(document, font);
        } else {
            info.first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(|o| resolve(document, o).as_i64().ok())
                .unwrap_or(0);
            if let Some(widths) = font
                .get(b"Widths")
                .ok()
                .and_then(|o| resolve(document, o).as_array().ok())
            {
                info.widths = widths
                    .iter()
                    .map(|w| number(resolve(document, w)).unwrap_or(0.0))
                    .collect();
            }
        }

        info
    }

    /// Read `DW` and the `W` array of the first descendant font.
    fn read_cid_widths(&mut self, document: &Document, font: &Dictionary) {
        let Some(descendant) = font
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(document, o).as_array().ok())
            .and_then(|items| items.first())
            .and_then(|o| resolve(document, o).as_dict().ok())
        else {
            return;
        };

        if let Some(dw) = descendant
            .get(b"DW")
            .ok()
            .and_then(|o| number(resolve(document, o)))
        {
            self.default_width = dw;
        } else {
            self.default_width = 1000.0;
        }

        let Some(w) = descendant
            .get(b"W")
            .ok()
            .and_then(|o| resolve(document, o).as_array().ok())
        else {
            return;
        };

        // W is a sequence of `c [w1 w2 ...]` and `c_first c_last w` groups.
        let mut i = 0;
        while i < w.len() {
            let Some(first) = number(resolve(document, &w[i])) else {
                break;
            };
            let first = first as u32;
            match w.get(i + 1).map(|o| resolve(document, o)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = number(resolve(document, width)) {
                            self.cid_widths.insert(first + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let last = number(last).unwrap_or(first as f32) as u32;
                    let width = w
                        .get(i + 2)
                        .and_then(|o| number(resolve(document, o)))
                        .unwrap_or(self.default_width);
                    for code in first..=last.min(first + 0xFFFF) {
                        self.cid_widths.insert(code, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        let index = i64::from(code) - self.first_char;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.widths.get(i))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<(u32, Vec<u8>)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair
                        .iter()
                        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                    (code, pair.to_vec())
                })
                .collect()
        } else {
            bytes.iter().map(|b| (u32::from(*b), vec![*b])).collect()
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        Document::decode_text(Some(self.encoding.as_str()), bytes)
    }
}

fn is_bold_font_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[derive(Debug, Clone)]
struct TextParams {
    font: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        TextParams {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextParams,
}

#[derive(Debug, Clone, Copy)]
enum PathItem {
    Line((f32, f32), (f32, f32)),
    Rect([(f32, f32); 4]),
}

#[derive(Debug)]
struct PendingWord {
    text: String,
    x_min: f32,
    x_max: f32,
    top: f32,
    bottom: f32,
    font_size: f32,
    bold: bool,
}

struct Interpreter<'a> {
    fonts: &'a BTreeMap<Vec<u8>, FontInfo>,
    origin_x: f32,
    origin_top: f32,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    path: Vec<PathItem>,
    subpath_start: Option<(f32, f32)>,
    current_point: Option<(f32, f32)>,
    pending: Option<PendingWord>,
    words: Vec<Word>,
    segments: Vec<Segment>,
    rects: Vec<BBox>,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a BTreeMap<Vec<u8>, FontInfo>, origin_x: f32, origin_top: f32) -> Self {
        Interpreter {
            fonts,
            origin_x,
            origin_top,
            state: GraphicsState {
                ctm: IDENTITY,
                text: TextParams::default(),
            },
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            path: Vec::new(),
            subpath_start: None,
            current_point: None,
            pending: None,
            words: Vec::new(),
            segments: Vec::new(),
            rects: Vec::new(),
        }
    }

    /// Convert a point in user space to top-left page coordinates.
    fn to_page(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x - self.origin_x, self.origin_top - y)
    }

    fn execute(&mut self, operator: &str, operands: &[Object]) {
        let n = numbers(operands);
        match operator {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let [a, b, c, d, e, f] = n[..] {
                    self.state.ctm = multiply(&[a, b, c, d, e, f], &self.state.ctm);
                }
            }

            // Text objects and state
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "ET" => self.flush_word(),
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.state.text.font = Some(name.to_vec());
                }
                if let Some(size) = n.first() {
                    self.state.text.size = *size;
                }
            }
            "Tc" => self.set_text_param(&n, |t, v| t.char_spacing = v),
            "Tw" => self.set_text_param(&n, |t, v| t.word_spacing = v),
            "Tz" => self.set_text_param(&n, |t, v| t.h_scale = v / 100.0),
            "TL" => self.set_text_param(&n, |t, v| t.leading = v),
            "Ts" => self.set_text_param(&n, |t, v| t.rise = v),
            "Td" => {
                if let [tx, ty] = n[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = n[..] {
                    self.state.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = n[..] {
                    self.tm = [a, b, c, d, e, f];
                    self.tlm = self.tm;
                    self.flush_word();
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "\"" => {
                if let [aw, ac] = n[..] {
                    self.state.text.word_spacing = aw;
                    self.state.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show_text(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show_text(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let t = &self.state.text;
                                    let tx = -adjust / 1000.0 * t.size * t.h_scale;
                                    self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
                                }
                            }
                        }
                    }
                }
            }

            // Path construction
            "m" => {
                if let [x, y] = n[..] {
                    let p = apply(&self.state.ctm, x, y);
                    self.subpath_start = Some(p);
                    self.current_point = Some(p);
                }
            }
            "l" => {
                if let [x, y] = n[..] {
                    let p = apply(&self.state.ctm, x, y);
                    if let Some(from) = self.current_point {
                        self.path.push(PathItem::Line(from, p));
                    }
                    self.current_point = Some(p);
                }
            }
            "c" | "v" | "y" => {
                if let [.., x, y] = n[..] {
                    self.current_point = Some(apply(&self.state.ctm, x, y));
                }
            }
            "re" => {
                if let [x, y, w, h] = n[..] {
                    let ctm = self.state.ctm;
                    let corners = [
                        apply(&ctm, x, y),
                        apply(&ctm, x + w, y),
                        apply(&ctm, x + w, y + h),
                        apply(&ctm, x, y + h),
                    ];
                    self.path.push(PathItem::Rect(corners));
                    self.subpath_start = Some(corners[0]);
                    self.current_point = Some(corners[0]);
                }
            }
            "h" => self.close_subpath(),

            // Path painting
            "S" => self.paint(true),
            "s" => {
                self.close_subpath();
                self.paint(true);
            }
            "f" | "F" | "f*" => self.paint(false),
            "B" | "B*" => self.paint(true),
            "b" | "b*" => {
                self.close_subpath();
                self.paint(true);
            }
            "n" => self.clear_path(),
            _ => {}
        }
    }

    fn set_text_param(&mut self, n: &[f32], set: impl Fn(&mut TextParams, f32)) {
        if let Some(v) = n.first() {
            set(&mut self.state.text, *v);
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let fonts = self.fonts;
        let Some(font) = self
            .state
            .text
            .font
            .as_ref()
            .and_then(|name| fonts.get(name))
        else {
            return;
        };
        let params = self.state.text.clone();

        for (code, raw) in font.codes(bytes) {
            let glyph_width = font.width(code) / 1000.0;
            let scale = [
                params.size * params.h_scale,
                0.0,
                0.0,
                params.size,
                0.0,
                params.rise,
            ];
            let trm = multiply(&multiply(&scale, &self.tm), &self.state.ctm);
            let start = self.to_page(apply(&trm, 0.0, 0.0));
            let end = self.to_page(apply(&trm, glyph_width, 0.0));
            let device_size = (params.size * (self.tm[3] * self.state.ctm[3]).abs()).max(1.0);

            let text = font.decode(&raw);
            self.push_glyph(&text, start, end, device_size, font.bold);

            let word_spacing = if !font.two_byte && code == 32 {
                params.word_spacing
            } else {
                0.0
            };
            let tx =
                (glyph_width * params.size + params.char_spacing + word_spacing) * params.h_scale;
            self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
        }
    }

    fn push_glyph(&mut self, text: &str, start: (f32, f32), end: (f32, f32), size: f32, bold: bool) {
        if text.trim().is_empty() {
            self.flush_word();
            return;
        }

        let baseline = start.1;
        let x_min = start.0.min(end.0);
        let x_max = start.0.max(end.0);
        let top = baseline - size * ASCENT;
        let bottom = baseline + size * DESCENT;

        let starts_new_word = self.pending.as_ref().is_some_and(|word| {
            let same_line = (word.bottom - bottom).abs() <= size * 0.5;
            let gap = x_min - word.x_max;
            !same_line || gap > size * WORD_GAP || gap < -size
        });
        if starts_new_word {
            self.flush_word();
        }

        match &mut self.pending {
            Some(word) => {
                word.text.push_str(text);
                word.x_max = word.x_max.max(x_max);
                word.top = word.top.min(top);
                word.bottom = word.bottom.max(bottom);
                word.bold &= bold;
            }
            None => {
                self.pending = Some(PendingWord {
                    text: text.to_string(),
                    x_min,
                    x_max,
                    top,
                    bottom,
                    font_size: size,
                    bold,
                });
            }
        }
    }

    fn flush_word(&mut self) {
        if let Some(word) = self.pending.take() {
            let text = word.text.trim().to_string();
            if !text.is_empty() {
                self.words.push(Word {
                    text,
                    bbox: BBox::new(word.x_min, word.top, word.x_max, word.bottom),
                    font_size: word.font_size,
                    bold: word.bold,
                });
            }
        }
    }

    fn close_subpath(&mut self) {
        if let (Some(from), Some(start)) = (self.current_point, self.subpath_start) {
            if from != start {
                self.path.push(PathItem::Line(from, start));
            }
            self.current_point = Some(start);
        }
    }

    fn paint(&mut self, stroked: bool) {
        let items = std::mem::take(&mut self.path);
        for item in items {
            match item {
                PathItem::Line(a, b) => {
                    if !stroked {
                        continue;
                    }
                    let (x0, y0) = self.to_page(a);
                    let (x1, y1) = self.to_page(b);
                    self.segments.push(Segment { x0, y0, x1, y1 });
                }
                PathItem::Rect(corners) => {
                    let points = corners.map(|p| self.to_page(p));
                    let x_min = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
                    let x_max = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
                    let y_min = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
                    let y_max = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
                    let bbox = BBox::new(x_min, y_min, x_max, y_max);

                    if bbox.height() <= THIN_RECT && bbox.width() > THIN_RECT {
                        let y = (y_min + y_max) / 2.0;
                        self.segments.push(Segment {
                            x0: x_min,
                            y0: y,
                            x1: x_max,
                            y1: y,
                        });
                    } else if bbox.width() <= THIN_RECT && bbox.height() > THIN_RECT {
                        let x = (x_min + x_max) / 2.0;
                        self.segments.push(Segment {
                            x0: x,
                            y0: y_min,
                            x1: x,
                            y1: y_max,
                        });
                    } else if bbox.width() > THIN_RECT && bbox.height() > THIN_RECT {
                        self.rects.push(bbox);
                    }
                }
            }
        }
        self.clear_path();
    }

    fn clear_path(&mut self) {
        self.path.clear();
        self.subpath_start = None;
        self.current_point = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_translation() {
        let m = multiply(&[1.0, 0.0, 0.0, 1.0, 10.0, 20.0], &[2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(apply(&m, 1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn test_bold_font_names() {
        assert!(is_bold_font_name("Helvetica-Bold"));
        assert!(is_bold_font_name("ABCDEF+Arial,Bold"));
        assert!(!is_bold_font_name("Helvetica"));
    }

    #[test]
    fn test_interpreter_words_and_rulings() {
        let fonts = BTreeMap::from([(
            b"F1".to_vec(),
            FontInfo {
                encoding: "WinAnsiEncoding".into(),
                bold: false,
                two_byte: false,
                first_char: 0,
                widths: Vec::new(),
                cid_widths: HashMap::new(),
                default_width: 500.0,
            },
        )]);
        let mut interp = Interpreter::new(&fonts, 0.0, 800.0);
        let int = Object::Integer;

        let ops: Vec<(&str, Vec<Object>)> = vec![
            ("BT", vec![]),
            ("Tf", vec![Object::Name(b"F1".to_vec()), int(10)]),
            ("Td", vec![int(40), int(700)]),
            ("Tj", vec![Object::string_literal("Pos Item")]),
            ("ET", vec![]),
            ("m", vec![int(100), int(750)]),
            ("l", vec![int(100), int(100)]),
            ("S", vec![]),
            ("re", vec![int(30), int(720), int(500), int(1)]),
            ("f", vec![]),
        ];
        for (op, operands) in &ops {
            interp.execute(op, operands);
        }
        interp.flush_word();

        let texts: Vec<&str> = interp.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Pos", "Item"]);
        assert_eq!(interp.words[0].bbox.x_min, 40.0);
        // Baseline at y=700 means 100pt from the top of an 800pt page.
        assert!((interp.words[0].bbox.y_max - 102.0).abs() < 0.01);

        assert_eq!(interp.segments.len(), 2);
        assert!(interp.segments[0].is_vertical(0.1));
        assert!(interp.segments[1].is_horizontal(0.1));
        assert!(interp.rects.is_empty());
    }
}
