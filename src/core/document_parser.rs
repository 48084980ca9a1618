use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use super::errors::CoreError;
use super::models::{Document, DocumentFormat, RuntimeSettings, SectionSet};
use super::pdf::{PdfStrategy, PdfTextExtractor};
use super::pdftotext::PdftotextCliExtractor;
use super::sections::extract_sections;

static HORIZONTAL_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

pub struct DocumentParser {
    pdf_text_extractor: PdfTextExtractor,
    max_upload_bytes: usize,
}

impl DocumentParser {
    pub fn new(pdf_text_extractor: PdfTextExtractor, max_upload_bytes: usize) -> Self {
        Self {
            pdf_text_extractor,
            max_upload_bytes,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let fallback = PdftotextCliExtractor::new(
            settings.pdftotext_path.clone(),
            Duration::from_secs(settings.extraction_timeout_seconds.max(1)),
        );
        Self::new(PdfTextExtractor::new(fallback), settings.max_upload_bytes)
    }

    pub fn is_supported(file_name: &str) -> bool {
        DocumentFormat::from_file_name(file_name).is_some()
    }

    pub fn open(&self, file_name: &str, data: Vec<u8>) -> Result<Document, CoreError> {
        let format = DocumentFormat::from_file_name(file_name)
            .ok_or_else(|| CoreError::UnsupportedFormat(file_name.to_string()))?;

        if data.len() > self.max_upload_bytes {
            return Err(CoreError::FileTooLarge {
                file_name: file_name.to_string(),
                size: data.len(),
                limit: self.max_upload_bytes,
            });
        }

        Ok(Document {
            file_name: file_name.to_string(),
            format,
            bytes: data,
        })
    }

    pub async fn extract_text(&self, document: &Document) -> anyhow::Result<String> {
        let raw = match document.format {
            DocumentFormat::Pdf => {
                let (text, strategy) = self
                    .pdf_text_extractor
                    .extract_text_with_fallback(&document.bytes)
                    .await
                    .map_err(|err| CoreError::parse(&document.file_name, err))?;
                if strategy == PdfStrategy::Secondary {
                    debug!(file = %document.file_name, "text recovered by pdftotext");
                }
                text
            }
            DocumentFormat::Docx => extract_docx_text(&document.bytes)
                .map_err(|err| CoreError::parse(&document.file_name, err))?,
            DocumentFormat::Txt => decode_text(&document.file_name, &document.bytes)?,
        };

        Ok(clean_extracted_text(&raw))
    }

    pub async fn parse_bytes(&self, file_name: &str, data: Vec<u8>) -> anyhow::Result<String> {
        let document = self.open(file_name, data)?;
        self.extract_text(&document).await
    }

    pub async fn parse_sections(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<SectionSet> {
        let text = self.parse_bytes(file_name, data).await?;
        Ok(extract_sections(&text))
    }
}

pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|v| v.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| file_name.to_string())
}

// Horizontal whitespace collapses; runs of blank lines become one.
pub fn clean_extracted_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = false;

    for line in normalized.split('\n') {
        let collapsed = HORIZONTAL_WS_RE.replace_all(line, " ");
        let line = collapsed.trim();
        if line.is_empty() {
            if !lines.is_empty() && !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
            continue;
        }

        previous_blank = false;
        lines.push(line.to_string());
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn decode_text(file_name: &str, data: &[u8]) -> Result<String, CoreError> {
    if data.contains(&0) {
        return Err(CoreError::Encoding(file_name.to_string()));
    }

    let data = data.strip_prefix(&UTF8_BOM).unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            debug!(file = %file_name, "not valid UTF-8, decoding as Latin-1");
            Ok(data.iter().map(|&b| b as char).collect())
        }
    }
}

fn extract_docx_text(data: &[u8]) -> anyhow::Result<String> {
    let cursor = Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)?;

    let mut document_file = archive.by_name("word/document.xml")?;
    let mut xml = String::new();
    document_file.read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);

    let mut buf = Vec::new();
    let mut current = String::new();
    // Text boxes nest whole paragraphs inside a run of the outer one.
    let mut enclosing: Vec<String> = Vec::new();
    let mut lines = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => enclosing.push(std::mem::take(&mut current)),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:p" => {
                    lines.push(current.trim().to_string());
                    current = enclosing.pop().unwrap_or_default();
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" => lines.push(String::new()),
                b"w:tab" => current.push(' '),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&e.xml_content()?);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text {
                    if let Some(value) = resolve_entity(&e.decode()?) {
                        current.push_str(&value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }

        buf.clear();
    }

    Ok(lines.join("\n"))
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(code, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(code) = name.strip_prefix('#') {
        return code
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }

    resolve_predefined_entity(name).map(str::to_string)
}
