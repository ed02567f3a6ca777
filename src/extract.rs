use std::path::Path;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::error::RenamerError;

const MIN_TITLE_LEN: usize = 8;
const REJECTED_TITLE_FRAGMENTS: &[&str] = &["microsoft word", "untitled", "doi", "title"];

pub trait PdfDocument {
    fn title(&self) -> Option<String>;
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String, RenamerError>;
}

pub trait PdfLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, RenamerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfLoader;

impl PdfLoader for LopdfLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, RenamerError> {
        let document = Document::load(path)
            .map_err(|err| RenamerError::PdfRead(format!("{}: {err}", path.display())))?;
        let page_numbers = document.get_pages().keys().copied().collect();
        Ok(Box::new(LopdfDocument {
            document,
            page_numbers,
        }))
    }
}

struct LopdfDocument {
    document: Document,
    page_numbers: Vec<u32>,
}

impl LopdfDocument {
    fn info_dictionary(&self) -> Option<&Dictionary> {
        match self.document.trailer.get(b"Info").ok()? {
            Object::Dictionary(dict) => Some(dict),
            Object::Reference(id) => self.document.get_object(*id).ok()?.as_dict().ok(),
            _ => None,
        }
    }
}

impl PdfDocument for LopdfDocument {
    fn title(&self) -> Option<String> {
        let raw = match self.info_dictionary()?.get(b"Title").ok()? {
            Object::Reference(id) => self.document.get_object(*id).ok()?,
            other => other,
        };
        raw.as_str().ok().map(decode_pdf_string)
    }

    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, RenamerError> {
        let page = self
            .page_numbers
            .get(index)
            .copied()
            .ok_or_else(|| RenamerError::PdfRead(format!("page index {index} out of range")))?;
        self.document
            .extract_text(&[page])
            .map_err(|err| RenamerError::PdfRead(format!("page {page}: {err}")))
    }
}

pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|byte| *byte as char).collect(),
    }
}

pub fn accept_title(raw: &str) -> Option<String> {
    let title = raw.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        return None;
    }
    let lower = title.to_lowercase();
    if REJECTED_TITLE_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
    {
        return None;
    }
    Some(title.to_string())
}

pub fn extract_title(document: &dyn PdfDocument) -> Option<String> {
    document.title().as_deref().and_then(accept_title)
}

pub fn extract_text_first_pages(document: &dyn PdfDocument, pages: usize) -> String {
    let limit = pages.min(document.page_count());
    let mut texts = Vec::with_capacity(limit);
    for index in 0..limit {
        match document.page_text(index) {
            Ok(text) => texts.push(text),
            Err(err) => debug!("skipping page {}: {err}", index + 1),
        }
    }
    texts.join("\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub title: Option<String>,
    pub text: String,
}

pub fn extract(loader: &dyn PdfLoader, path: &Path, pages: usize) -> Extracted {
    let document = match loader.open(path) {
        Ok(document) => document,
        Err(err) => {
            debug!("unreadable PDF {}: {err}", path.display());
            return Extracted::default();
        }
    };
    Extracted {
        title: extract_title(document.as_ref()),
        text: extract_text_first_pages(document.as_ref(), pages),
    }
}
