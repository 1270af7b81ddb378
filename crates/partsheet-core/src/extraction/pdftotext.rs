use crate::error::PartsheetError;
use crate::extraction::{BBox, Page, PageSource, Word};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -bbox` to get every word with its bounding box. Poppler
/// does not report vector graphics, so pages from this backend carry no
/// segments and tables are found from explicit boundaries or text alignment.
pub struct PdftotextSource;

impl PdftotextSource {
    pub fn new() -> Self {
        PdftotextSource
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSource for PdftotextSource {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<Page>, PartsheetError> {
        // Write PDF bytes to a temp file
        let mut tmpfile = tempfile::NamedTempFile::new()?;
        tmpfile.write_all(pdf_bytes)?;
        let tmp_path = tmpfile.path().to_path_buf();

        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(&tmp_path)
            .arg("-") // output to stdout
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PartsheetError::PdftotextNotFound
                } else {
                    PartsheetError::Extraction(format!("pdftotext failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(PartsheetError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let pages = parse_bbox_xml(&xml)?;
        if pages.is_empty() {
            return Err(PartsheetError::Extraction("PDF has no pages".into()));
        }
        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

fn parse_bbox_xml(xml: &str) -> Result<Vec<Page>, PartsheetError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut pages: Vec<Page> = Vec::new();
    let mut current_word: Option<BBox> = None;
    let mut word_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => match tag.name().as_ref() {
                b"page" => {
                    let width = attr_f32(&tag, "width").unwrap_or(0.0);
                    let height = attr_f32(&tag, "height").unwrap_or(0.0);
                    pages.push(Page::new(pages.len() + 1, width, height));
                }
                b"word" => {
                    current_word = parse_bbox(&tag);
                    word_text.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(tag)) if tag.name().as_ref() == b"page" => {
                let width = attr_f32(&tag, "width").unwrap_or(0.0);
                let height = attr_f32(&tag, "height").unwrap_or(0.0);
                pages.push(Page::new(pages.len() + 1, width, height));
            }
            Ok(Event::Text(text)) => {
                if current_word.is_some() {
                    let text = text
                        .unescape()
                        .map_err(|e| PartsheetError::BboxXml(e.to_string()))?;
                    word_text.push_str(&text);
                }
            }
            Ok(Event::End(tag)) if tag.name().as_ref() == b"word" => {
                let text = word_text.trim();
                if let (Some(bbox), Some(page)) = (current_word.take(), pages.last_mut()) {
                    if !text.is_empty() {
                        page.words.push(Word {
                            text: text.to_string(),
                            font_size: bbox.height(),
                            bbox,
                            bold: false,
                        });
                    }
                }
                word_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PartsheetError::BboxXml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(pages)
}

fn attr_f32(tag: &BytesStart, name: &str) -> Option<f32> {
    let attr = tag.try_get_attribute(name).ok()??;
    attr.unescape_value().ok()?.trim().parse().ok()
}

fn parse_bbox(tag: &BytesStart) -> Option<BBox> {
    Some(BBox::new(
        attr_f32(tag, "xMin")?,
        attr_f32(tag, "yMin")?,
        attr_f32(tag, "xMax")?,
        attr_f32(tag, "yMax")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox_xml_words() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="LibreOffice"/>
</head>
<body>
<doc>
  <page width="595.000000" height="842.000000">
    <word xMin="10.0" yMin="20.0" xMax="30.0" yMax="30.0">Ident.</word>
    <word xMin="32.0" yMin="20.0" xMax="40.0" yMax="30.0">&amp;</word>
  </page>
  <page width="595.000000" height="842.000000">
    <word xMin="50.0" yMin="60.0" xMax="80.0" yMax="72.0">Menge</word>
  </page>
</doc>
</body>
</html>
"#;
        let pages = parse_bbox_xml(xml).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].width, 595.0);
        assert_eq!(pages[0].words.len(), 2);
        assert_eq!(pages[0].words[0].text, "Ident.");
        assert_eq!(pages[0].words[1].text, "&");
        assert_eq!(pages[1].words[0].font_size, 12.0);
        assert!(pages[1].segments.is_empty());
    }

    #[test]
    fn test_parse_bbox_xml_skips_blank_words() {
        let xml = r#"<doc><page width="100" height="100"><word xMin="1" yMin="1" xMax="2" yMax="2">  </word></page></doc>"#;
        let pages = parse_bbox_xml(xml).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].words.is_empty());
    }
}
