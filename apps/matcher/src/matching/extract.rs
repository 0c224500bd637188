//! Document Text Extractor: turns an uploaded PDF or DOCX into plain text.
//!
//! PDF: page by page via `pdf-extract`, concatenated in page order. Pages with
//! no text layer contribute nothing.
//! DOCX: the text runs of the numbered header parts, then `word/document.xml`,
//! then the numbered footer parts (docx2txt order), one line per paragraph.
//! The decompressed XML is capped so a small archive cannot expand without
//! bound.
//!
//! Parsing is CPU-bound and third-party parsers may panic on hostile input, so
//! `extract_text` runs on the blocking pool and maps a crashed task to an error.

use std::io::{self, Cursor, Read};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOCX_BODY: &str = "word/document.xml";
const DOCX_HEADER_PREFIX: &str = "word/header";
const DOCX_FOOTER_PREFIX: &str = "word/footer";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type '{0}': upload a PDF or DOCX file")]
    Unsupported(String),

    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("Could not read DOCX container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Could not parse DOCX body: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Could not read DOCX body: {0}")]
    Io(#[from] io::Error),

    #[error("The document expands past the {0}-byte limit")]
    TooLarge(u64),

    #[error("The document parser crashed on this file")]
    ParserAborted,

    #[error("The document contains no extractable text")]
    NoText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Detects the kind from the file extension, falling back to the content type.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Result<Self, ExtractionError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            return Ok(DocumentKind::Pdf);
        }
        if lower.ends_with(".docx") {
            return Ok(DocumentKind::Docx);
        }
        match content_type {
            Some("application/pdf") => Ok(DocumentKind::Pdf),
            Some(DOCX_CONTENT_TYPE) => Ok(DocumentKind::Docx),
            _ => Err(ExtractionError::Unsupported(file_name.to_string())),
        }
    }
}

/// Extracts text on the blocking pool. Whitespace-only output is `NoText`.
///
/// `max_expanded_bytes` bounds the decompressed DOCX XML read into memory.
pub async fn extract_text(
    bytes: Bytes,
    kind: DocumentKind,
    max_expanded_bytes: u64,
) -> Result<String, ExtractionError> {
    let text = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => extract_pdf_text(&bytes),
        DocumentKind::Docx => extract_docx_text(&bytes, max_expanded_bytes),
    })
    .await
    .map_err(|_| ExtractionError::ParserAborted)??;

    if text.trim().is_empty() {
        return Err(ExtractionError::NoText);
    }
    debug!("Extracted {} chars from {:?}", text.len(), kind);
    Ok(text)
}

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    Ok(pages.concat())
}

/// Reads headers, body and footers. All parts share one `max_expanded_bytes`
/// budget of decompressed XML.
pub fn extract_docx_text(
    bytes: &[u8],
    max_expanded_bytes: u64,
) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    let headers = names.iter().filter(|n| is_numbered_part(n, DOCX_HEADER_PREFIX));
    let footers = names.iter().filter(|n| is_numbered_part(n, DOCX_FOOTER_PREFIX));
    let parts: Vec<&str> = headers
        .map(String::as_str)
        .chain(std::iter::once(DOCX_BODY))
        .chain(footers.map(String::as_str))
        .collect();

    let mut remaining = max_expanded_bytes;
    let mut text = String::new();
    for part in parts {
        let xml = read_part(&mut archive, part, max_expanded_bytes, &mut remaining)?;
        text.push_str(&docx_body_text(&xml)?);
    }
    Ok(text)
}

/// `word/header1.xml`, `word/footer2.xml`, ...
fn is_numbered_part(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limit: u64,
    remaining: &mut u64,
) -> Result<String, ExtractionError> {
    let part = archive.by_name(name)?;
    // The declared size can lie; the `take` below is the real bound.
    if part.size() > *remaining {
        return Err(ExtractionError::TooLarge(limit));
    }

    let mut xml = Vec::new();
    part.take(remaining.saturating_add(1)).read_to_end(&mut xml)?;
    let read = xml.len() as u64;
    if read > *remaining {
        return Err(ExtractionError::TooLarge(limit));
    }
    *remaining -= read;

    String::from_utf8(xml).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

/// Collects `w:t` run text. Paragraph ends and breaks become `\n`, tabs `\t`.
fn docx_body_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run_text => text.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Minimal single-font PDF builder for tests. Offsets in the xref table are
/// computed, so the output is a well-formed file.
#[cfg(test)]
pub(crate) fn pdf_fixture(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    // 1 catalog, 2 pages tree, 3 font, then (page, content) pairs.
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + i * 2))
        .collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (i, page_text) in pages.iter().enumerate() {
        let content_id = 5 + i * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = if page_text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({page_text}) Tj ET")
        };
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

/// Zips a `word/document.xml` with the given paragraphs.
#[cfg(test)]
pub(crate) fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    docx_package(&[(DOCX_BODY, paragraphs)])
}

/// Zips each named part as a WordprocessingML document with the given paragraphs.
#[cfg(test)]
pub(crate) fn docx_package(parts: &[(&str, &[&str])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::FileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, paragraphs) in parts {
        let body: String = paragraphs
            .iter()
            .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{p}</w:t></w:r></w:p>"#))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
