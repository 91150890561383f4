//! Multi-format text parsers for uploaded documents.
//!
//! Each parser turns raw file bytes into [`DocumentRecord`]s. Parsers
//! are format-specific and provenance-agnostic: the loader stamps the
//! `source` metadata after parsing, so a parser never needs to know
//! the filename it is reading.

use std::io::Read;

use crate::models::DocumentRecord;

/// Maximum decompressed bytes to read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Parse failure for one file. The loader recovers from these and
/// reports them as non-fatal warnings; they never abort a batch.
#[derive(Debug)]
pub enum ParseError {
    Pdf(String),
    Docx(String),
    Csv(String),
    Io(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ParseError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            ParseError::Csv(e) => write!(f, "CSV parsing failed: {}", e),
            ParseError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

/// A format-specific parser keyed by file extension in the registry.
pub trait DocumentParser: Send + Sync {
    /// Short format label used in `status` output (e.g. `"pdf"`).
    fn format(&self) -> &str;

    /// Parse raw file bytes into one or more records.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError>;
}

// ============ PDF ============

/// Extracts plain text from a PDF body.
pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn format(&self) -> &str {
        "pdf"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ParseError::Pdf(e.to_string()))?;
        Ok(vec![DocumentRecord::new(text)])
    }
}

// ============ DOCX ============

/// Extracts the `w:t` text runs from `word/document.xml` inside the
/// OOXML ZIP container.
pub struct DocxParser;

impl DocumentParser for DocxParser {
    fn format(&self) -> &str {
        "docx"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| ParseError::Docx(e.to_string()))?;
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ParseError::Docx("word/document.xml not found".to_string()))?;

        let mut doc_xml = Vec::new();
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ParseError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ParseError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }

        let text = extract_w_t_elements(&doc_xml)?;
        Ok(vec![DocumentRecord::new(text)])
    }
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, ParseError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ParseError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ============ Plain text ============

/// Reads the file body as UTF-8 text (lossy on invalid sequences).
pub struct TextParser;

impl DocumentParser for TextParser {
    fn format(&self) -> &str {
        "txt"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
        let text = String::from_utf8_lossy(bytes).to_string();
        Ok(vec![DocumentRecord::new(text)])
    }
}

// ============ CSV ============

/// Flattens header and rows into pipe-separated lines of text.
pub struct CsvParser;

impl DocumentParser for CsvParser {
    fn format(&self) -> &str {
        "csv"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<DocumentRecord>, ParseError> {
        let mut reader = csv::Reader::from_reader(bytes);
        let mut text = String::new();

        let headers = reader
            .headers()
            .map_err(|e| ParseError::Csv(e.to_string()))?;
        text.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
        text.push('\n');

        for result in reader.records() {
            let record = result.map_err(|e| ParseError::Csv(e.to_string()))?;
            text.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            text.push('\n');
        }

        Ok(vec![DocumentRecord::new(text)])
    }
}
