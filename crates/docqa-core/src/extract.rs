//! Document → plain text extraction with per-document failure isolation.
use crate::error::{Error, Result};
use crate::traits::TextExtractor;
use crate::types::DocumentText;

/// An uploaded document before extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub content: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), content: content.into() }
    }
}

/// Accepts UTF-8 text (an optional BOM is dropped). Anything else is an extraction error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, name: &str, content: &[u8]) -> Result<String> {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        let text = std::str::from_utf8(content).map_err(|e| Error::Extraction {
            document: name.to_string(),
            reason: format!("not valid UTF-8 text ({})", e),
        })?;
        if text.contains('\0') {
            return Err(Error::Extraction { document: name.to_string(), reason: "binary content".to_string() });
        }
        Ok(text.to_string())
    }
}

/// Text of every page of a PDF, in page order.
///
/// Needs the `pdf` feature; without it every PDF is an extraction error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[cfg(feature = "pdf")]
    fn extract(&self, name: &str, content: &[u8]) -> Result<String> {
        let failed = |reason: String| Error::Extraction { document: name.to_string(), reason };
        // pdf-extract panics on some malformed files instead of returning an error.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(content))
            .map_err(|_| failed("malformed PDF".to_string()))?
            .map_err(|e| failed(format!("could not read PDF ({})", e)))?;
        tracing::debug!(document = name, chars = text.len(), "extracted PDF text");
        Ok(text)
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, name: &str, _content: &[u8]) -> Result<String> {
        Err(Error::Extraction {
            document: name.to_string(),
            reason: "PDF support not enabled; compile with --features pdf".to_string(),
        })
    }
}

/// Picks an extractor from the document name: `.pdf` goes to [`PdfExtractor`], everything
/// else to [`PlainTextExtractor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn is_pdf(name: &str) -> bool {
        std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
    }
}

impl TextExtractor for FileExtractor {
    fn extract(&self, name: &str, content: &[u8]) -> Result<String> {
        if Self::is_pdf(name) {
            PdfExtractor.extract(name, content)
        } else {
            PlainTextExtractor.extract(name, content)
        }
    }
}

/// Outcome of extracting a batch: the texts that succeeded and the errors that were skipped.
#[derive(Debug, Default)]
pub struct Extracted {
    pub documents: Vec<DocumentText>,
    pub failures: Vec<Error>,
}

/// Extract every document; failures are logged and collected, the rest proceed.
pub fn extract_documents(docs: &[SourceDocument], extractor: &dyn TextExtractor) -> Extracted {
    let mut out = Extracted::default();
    for doc in docs {
        match extractor.extract(&doc.name, &doc.content) {
            Ok(text) => out.documents.push(DocumentText::new(doc.name.clone(), text)),
            Err(e) => {
                tracing::warn!(document = %doc.name, error = %e, "skipping document");
                out.failures.push(e);
            }
        }
    }
    out
}
