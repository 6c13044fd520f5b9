//! PDF text acquisition.

mod extractor;

pub use extractor::{PdfContent, PdfExtractor, PdfPage, read_pdf};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract plain text page by page.
    fn extract_pages(&self) -> Result<Vec<PdfPage>>;
}
