// PDF text extraction for uploaded documents.
// Keep this module small and dependency-light.

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("not a PDF document (missing %PDF- header)")]
    NotPdf,

    #[error("failed to extract text from PDF: {0}")]
    Parse(String),
}

/// Extracts the text of every page, in page order, and concatenates it.
///
/// Returns whatever text is found, including an empty string; deciding that
/// an empty document is unusable is left to the caller.
///
/// pdf-extract stops at the first page it cannot decode and returns the pages
/// before it, so the result may cover only a prefix of the document. That case
/// is logged as a warning against the page tree's own count.
pub fn extract(bytes: &[u8]) -> Result<String, ExtractionError> {
    // pdf-extract can panic on some malformed inputs instead of returning an error.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::Parse("PDF parser aborted on malformed input".to_string()))?
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;
    debug!("Extracted {} page(s) from PDF", pages.len());
    match page_count(bytes) {
        Some(total) if total != pages.len() => warn!(
            "Extracted text from {} of {} page(s); the rest could not be decoded",
            pages.len(),
            total
        ),
        _ => {}
    }
    Ok(join_pages(pages))
}

/// Number of pages in the document's page tree, if lopdf can load it.
pub fn page_count(bytes: &[u8]) -> Option<usize> {
    std::panic::catch_unwind(|| lopdf::Document::load_mem(bytes).ok())
        .ok()
        .flatten()
        .map(|doc| doc.get_pages().len())
}

/// Ordered concatenation with no separator beyond what each page already contains.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages.into_iter().fold(String::new(), |mut acc, page| {
        acc.push_str(page.as_ref());
        acc
    })
}

/// Returns true if the bytes start with the `%PDF-` magic.
pub fn is_pdf(head: &[u8]) -> bool {
    head.starts_with(b"%PDF-")
}
