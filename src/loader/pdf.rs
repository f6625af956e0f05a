//! PDF loader using the `pdf-extract` crate.
//!
//! Extraction runs on the uploaded bytes directly. `pdf-extract` separates
//! pages with form feeds; those become blank lines so the model sees page
//! boundaries as paragraph breaks.

use super::error::{LoadError, LoadResult};
use super::{DocumentLoader, DocumentType, RawInput, require_upload};

/// PDF loader backed by `pdf-extract`.
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, input: &RawInput) -> LoadResult<String> {
        let upload = require_upload(DocumentType::Pdf, input)?;
        let text = pdf_extract::extract_text_from_mem(&upload.bytes).map_err(|e| LoadError::Parse {
            format: "pdf".into(),
            message: e.to_string(),
        })?;

        let text = join_pages(&text);
        if text.is_empty() {
            return Err(LoadError::EmptyDocument {
                origin: upload.file_name.clone(),
            });
        }
        Ok(text)
    }
}

/// Replace form-feed page breaks with blank lines and trim empty pages.
fn join_pages(text: &str) -> String {
    text.split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Upload;

    #[test]
    fn non_pdf_bytes_fail_to_parse() {
        // pdf-extract needs actual PDF bytes, so only the error path is
        // reachable with inline fixtures.
        let input = RawInput::Upload(Upload::new("fake.pdf", b"This is not a PDF".to_vec()));
        let result = PdfLoader.load(&input);
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn pages_become_paragraphs() {
        let raw = "Page one.\n\x0C\n\x0CPage three.\n";
        assert_eq!(join_pages(raw), "Page one.\n\nPage three.");
    }

    #[test]
    fn blank_extraction_is_empty() {
        assert!(join_pages(" \n\x0C\n ").is_empty());
    }
}
