//! DOCX extractor reading `word/document.xml` out of the zip container.

use super::{Extraction, Extractor, TextSpan};
use crate::error::{IngestError, IngestResult};
use murag_core::{DocumentType, Locator};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Extractor for Word documents.
#[derive(Default)]
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for DocxExtractor {
    fn extract(&self, path: &Path) -> IngestResult<Extraction> {
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        debug!("Extracting DOCX: {:?}", path);

        let parse_error = |message: String| IngestError::ParseError {
            path: path.to_path_buf(),
            message,
        };

        let file = std::fs::File::open(path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| parse_error(format!("Not a DOCX file: {}", e)))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| parse_error(format!("Missing word/document.xml: {}", e)))?
            .read_to_string(&mut xml)?;

        let pages = parse_document_xml(&xml).map_err(|e| parse_error(e.to_string()))?;

        let spans = pages
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.is_empty())
            .map(|(i, text)| TextSpan::new(text.clone(), Locator::Page { page: i as u32 + 1 }))
            .collect();

        Ok(Extraction::new(spans).with_metadata(serde_json::json!({
            "format": "docx",
            "pages": pages.len(),
        })))
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::Docx
    }
}

/// Split the body of `word/document.xml` into pages of paragraphs.
///
/// A page ends at an explicit `<w:br w:type="page"/>` or at a
/// `<w:lastRenderedPageBreak/>` left by Word's layout. A break on a page
/// that has no text yet is ignored, since Word often writes both markers
/// for the same boundary.
pub fn parse_document_xml(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" if is_page_break(&e) => page_break(&mut pages, &mut paragraph),
                b"br" | b"cr" => paragraph.push('\n'),
                b"lastRenderedPageBreak" => page_break(&mut pages, &mut paragraph),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(quick_xml::Error::from)?;
                paragraph.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        if let Some(page) = pages.last_mut() {
                            page.push(text.to_string());
                        }
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    // Text after the last paragraph end is malformed but still content.
    if !paragraph.trim().is_empty() {
        if let Some(page) = pages.last_mut() {
            page.push(paragraph.trim().to_string());
        }
    }

    while pages.len() > 1 && pages.last().map(|p| p.is_empty()).unwrap_or(false) {
        pages.pop();
    }

    Ok(pages.into_iter().map(|p| p.join("\n\n")).collect())
}

fn is_page_break(e: &BytesStart) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.local_name().as_ref() == b"type" && a.value.as_ref() == b"page")
}

fn page_break(pages: &mut Vec<Vec<String>>, paragraph: &mut String) {
    let partial = paragraph.trim().to_string();
    paragraph.clear();

    let current_is_empty = pages.last().map(|p| p.is_empty()).unwrap_or(true);
    if current_is_empty && partial.is_empty() {
        return;
    }
    if !partial.is_empty() {
        if let Some(page) = pages.last_mut() {
            page.push(partial);
        }
    }
    pages.push(Vec::new());
}
