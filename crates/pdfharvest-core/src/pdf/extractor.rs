//! PDF text extraction using lopdf and pdf-extract.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use lopdf::Document;
use tracing::{debug, trace};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

/// Extracted content from a PDF.
#[derive(Debug, Clone)]
pub struct PdfContent {
    /// Pages with their content.
    pub pages: Vec<PdfPage>,
}

/// Content from a single PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// Page number (1-indexed).
    pub number: u32,
    /// Extracted text from this page.
    pub text: String,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Extract all pages of the loaded document.
    pub fn extract_all(&self) -> Result<PdfContent> {
        let pages = self.extract_pages()?;
        debug!(
            "Extracted {} pages, {} chars of text",
            pages.len(),
            pages.iter().map(|p| p.text.len()).sum::<usize>()
        );
        Ok(PdfContent { pages })
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_pages(&self) -> Result<Vec<PdfPage>> {
        if self.document.is_none() {
            return Err(PdfError::Parse("no document loaded".to_string()));
        }

        // The text decoder panics on some malformed content streams.
        let data = &self.raw_data;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(data)
        }));

        let texts = match outcome {
            Ok(Ok(texts)) => texts,
            Ok(Err(e)) => return Err(PdfError::TextExtraction(e.to_string())),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "text decoder panicked".to_string());
                return Err(PdfError::TextExtraction(msg));
            }
        };

        trace!("Decoded {} page texts", texts.len());

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PdfPage {
                number: i as u32 + 1,
                text,
            })
            .collect())
    }
}

/// Read a PDF file from disk and extract its pages.
pub fn read_pdf(path: &Path) -> Result<PdfContent> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(PdfError::NotPdf(path.to_path_buf()));
    }

    let data = std::fs::read(path).map_err(|source| PdfError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut extractor = PdfExtractor::new();
    extractor.load(&data)?;
    extractor.extract_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_pdf;

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut extractor = PdfExtractor::new();
        let err = extractor.load(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn test_extract_pages() {
        let data = make_pdf(&[&["ACME Corp", "Invoice #: INV-1"], &["Total: $10.00"]]);
        let mut extractor = PdfExtractor::new();
        extractor.load(&data).unwrap();

        assert_eq!(extractor.page_count(), 2);

        let pages = extractor.extract_pages().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("ACME"));
        assert!(pages[1].text.contains("Total"));
    }

    #[test]
    fn test_read_pdf_requires_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain").unwrap();

        assert!(matches!(read_pdf(&path), Err(PdfError::NotPdf(_))));
    }

    #[test]
    fn test_read_pdf_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pdf");

        assert!(matches!(read_pdf(&path), Err(PdfError::Read { .. })));
    }
}
