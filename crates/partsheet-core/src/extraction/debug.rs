//! Annotated SVG renderings of pages for checking table detection by eye.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::PartsheetError;
use crate::extraction::table::{ExtractionConfig, TableGrid};
use crate::extraction::Page;

const WORD_COLOR: &str = "#1f77b4";
const BOUNDARY_COLOR: &str = "#d62728";
const CELL_COLOR: &str = "#2ca02c";
const RULING_COLOR: &str = "#7f7f7f";

fn svg_err(e: impl std::fmt::Display) -> PartsheetError {
    PartsheetError::Extraction(format!("failed to write debug SVG: {e}"))
}

fn element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    attrs: &[(&str, String)],
) -> Result<(), PartsheetError> {
    let mut tag = BytesStart::new(name);
    for (key, value) in attrs {
        tag.push_attribute((*key, value.as_str()));
    }
    writer.write_event(Event::Empty(tag)).map_err(svg_err)
}

/// Render a page with its words, explicit boundaries and detected cells.
pub fn render_page_svg(
    page: &Page,
    config: Option<&ExtractionConfig>,
    tables: &[TableGrid],
) -> Result<String, PartsheetError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut svg = BytesStart::new("svg");
    svg.push_attribute(("xmlns", "http://www.w3.org/2000/svg"));
    let view_box = format!("0 0 {} {}", page.width, page.height);
    svg.push_attribute(("viewBox", view_box.as_str()));
    writer.write_event(Event::Start(svg)).map_err(svg_err)?;

    element(
        &mut writer,
        "rect",
        &[
            ("width", page.width.to_string()),
            ("height", page.height.to_string()),
            ("fill", "white".into()),
        ],
    )?;

    for s in &page.segments {
        element(
            &mut writer,
            "line",
            &[
                ("x1", s.x0.to_string()),
                ("y1", s.y0.to_string()),
                ("x2", s.x1.to_string()),
                ("y2", s.y1.to_string()),
                ("stroke", RULING_COLOR.into()),
                ("stroke-width", "0.5".into()),
            ],
        )?;
    }

    for word in &page.words {
        element(
            &mut writer,
            "rect",
            &[
                ("x", word.bbox.x_min.to_string()),
                ("y", word.bbox.y_min.to_string()),
                ("width", word.bbox.width().to_string()),
                ("height", word.bbox.height().to_string()),
                ("fill", "none".into()),
                ("stroke", WORD_COLOR.into()),
                ("stroke-width", "0.3".into()),
            ],
        )?;

        let mut text = BytesStart::new("text");
        let x = word.bbox.x_min.to_string();
        let y = word.bbox.y_max.to_string();
        let size = (word.font_size * 0.8).to_string();
        text.push_attribute(("x", x.as_str()));
        text.push_attribute(("y", y.as_str()));
        text.push_attribute(("font-size", size.as_str()));
        if word.bold {
            text.push_attribute(("font-weight", "bold"));
        }
        writer.write_event(Event::Start(text)).map_err(svg_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&word.text)))
            .map_err(svg_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("text")))
            .map_err(svg_err)?;
    }

    if let Some(config) = config {
        for x in &config.explicit_vertical_lines {
            element(
                &mut writer,
                "line",
                &[
                    ("x1", x.to_string()),
                    ("y1", "0".into()),
                    ("x2", x.to_string()),
                    ("y2", page.height.to_string()),
                    ("stroke", BOUNDARY_COLOR.into()),
                    ("stroke-dasharray", "4 2".into()),
                ],
            )?;
        }
        for y in &config.explicit_horizontal_lines {
            element(
                &mut writer,
                "line",
                &[
                    ("x1", "0".into()),
                    ("y1", y.to_string()),
                    ("x2", page.width.to_string()),
                    ("y2", y.to_string()),
                    ("stroke", BOUNDARY_COLOR.into()),
                    ("stroke-dasharray", "4 2".into()),
                ],
            )?;
        }
    }

    for table in tables {
        for cell in &table.cells {
            element(
                &mut writer,
                "rect",
                &[
                    ("x", cell.x_min.to_string()),
                    ("y", cell.y_min.to_string()),
                    ("width", cell.width().to_string()),
                    ("height", cell.height().to_string()),
                    ("fill", CELL_COLOR.into()),
                    ("fill-opacity", "0.15".into()),
                    ("stroke", CELL_COLOR.into()),
                ],
            )?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("svg")))
        .map_err(svg_err)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(svg_err)
}

/// Write `page-NNN.svg` into `dir`, creating the directory if needed.
pub fn write_page_svg(
    dir: &Path,
    page: &Page,
    config: Option<&ExtractionConfig>,
    tables: &[TableGrid],
) -> Result<PathBuf, PartsheetError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("page-{:03}.svg", page.page_number));
    std::fs::write(&path, render_page_svg(page, config, tables)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::*;
    use crate::extraction::table::find_tables;

    #[test]
    fn test_svg_contains_words_boundaries_and_cells() {
        let mut page = Page::new(4, 600.0, 800.0);
        page.words = vec![word("Item", 70.0, 100.0), word("A&B", 70.0, 120.0)];
        let config = ExtractionConfig {
            vertical_strategy: crate::extraction::table::VerticalStrategy::Explicit,
            horizontal_strategy: crate::extraction::table::HorizontalStrategy::Text,
            explicit_vertical_lines: vec![67.0, 225.0],
            ..ExtractionConfig::default()
        };
        let tables = find_tables(&page, &config);
        let svg = render_page_svg(&page, Some(&config), &tables).unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(">Item</text>"));
        assert!(svg.contains("A&amp;B"));
        assert!(svg.contains(BOUNDARY_COLOR));
        assert!(svg.contains(CELL_COLOR));
    }

    #[test]
    fn test_write_page_svg_names_file_by_page() {
        let dir = tempfile::tempdir().unwrap();
        let page = Page::new(7, 100.0, 100.0);
        let path = write_page_svg(dir.path(), &page, None, &[]).unwrap();
        assert!(path.ends_with("page-007.svg"));
        assert!(path.exists());
    }
}
