//! Plain text from source files, dispatched on extension
//!
//! PDF pages and DOCX paragraphs are reduced to plain text before chunking;
//! every other allowed extension must already be UTF-8 text.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("not valid UTF-8 text")]
    NotUtf8,

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("no extractable text (scanned or image-only {0}?)")]
    NoText(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Text,
}

impl FileKind {
    /// Kind for a normalized extension such as ".pdf"
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            ".pdf" => FileKind::Pdf,
            ".docx" => FileKind::Docx,
            _ => FileKind::Text,
        }
    }
}

pub fn extract_text(kind: FileKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Text => String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed documents
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser aborted on malformed document".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let text = join_pages(&extracted);
    if text.is_empty() {
        return Err(ExtractError::NoText("PDF"));
    }
    Ok(text)
}

/// Non-empty pages, trimmed, separated by a blank line
fn join_pages(text: &str) -> String {
    text.split('\u{000C}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| ExtractError::Docx(format!("{}: {}", DOCX_BODY, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let text = docx_body_text(&xml)?;
    if text.trim().is_empty() {
        return Err(ExtractError::NoText("DOCX"));
    }
    Ok(text)
}

/// Text runs of a WordprocessingML body, one line per paragraph
fn docx_body_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let run = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Docx(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(text)
}
