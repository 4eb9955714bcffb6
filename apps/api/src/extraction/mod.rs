//! Text extraction: turns an uploaded résumé (plain text or PDF) into normalized plain text.
//!
//! The extractor is a leaf: it knows nothing about sessions or stages. Every error it
//! raises is phrased for the end user and points at the plain-text fallback.

pub mod pdf;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use pdf::{assemble_pages, LopdfEngine, PdfEngine, PdfEngineError};

/// Upload ceiling for a single document (5 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Minimum trimmed length of PDF text. Anything shorter is treated as an image-only scan.
pub const MIN_PDF_TEXT_CHARS: usize = 50;

/// Cap applied to every free-text field (résumé, job description).
pub const MAX_TEXT_CHARS: usize = 50_000;

const PLAIN_TEXT_HINT: &str = "Upload a .txt file or paste the résumé text instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PlainText,
    Pdf,
}

impl DocumentKind {
    /// Resolves a declared media type (`text/plain; charset=utf-8`, `application/pdf`, ...).
    pub fn from_media_type(media_type: &str) -> Result<Self, ExtractError> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/plain" => Ok(DocumentKind::PlainText),
            "application/pdf" => Ok(DocumentKind::Pdf),
            _ => Err(ExtractError::UnsupportedFormat(media_type.to_string())),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentKind::PlainText => "text/plain",
            DocumentKind::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File is too large ({size} bytes). Upload a file smaller than 5 MiB.")]
    TooLarge { size: usize },

    #[error("Unsupported file type '{0}'. Upload a .txt or .pdf file.")]
    UnsupportedFormat(String),

    #[error("File could not be read as UTF-8 text: {0}. {}", PLAIN_TEXT_HINT)]
    InvalidUtf8(String),

    #[error("PDF processing is unavailable: {0}. Try again shortly. {}", PLAIN_TEXT_HINT)]
    EngineUnavailable(String),

    #[error("PDF processing failed: {0}. {}", PLAIN_TEXT_HINT)]
    PdfParse(String),

    #[error(
        "PDF processing failed: only {chars} characters of text were found (minimum {}). \
         Make sure the PDF contains selectable text. {}",
        MIN_PDF_TEXT_CHARS,
        PLAIN_TEXT_HINT
    )]
    InsufficientText { chars: usize },
}

impl ExtractError {
    /// True for failures caused by the input itself rather than the PDF engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExtractError::TooLarge { .. }
                | ExtractError::UnsupportedFormat(_)
                | ExtractError::InvalidUtf8(_)
        )
    }
}

impl From<PdfEngineError> for ExtractError {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::Unavailable(msg) => ExtractError::EngineUnavailable(msg),
            PdfEngineError::Parse(msg) => ExtractError::PdfParse(msg),
        }
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub kind: DocumentKind,
}

/// Extracts plain text from uploaded documents.
///
/// Cheap to clone; the PDF engine is shared behind an `Arc`. `None` means no engine is
/// installed and every PDF fails with `EngineUnavailable`.
#[derive(Clone)]
pub struct TextExtractor {
    pdf_engine: Option<Arc<dyn PdfEngine>>,
}

impl TextExtractor {
    pub fn new(pdf_engine: Option<Arc<dyn PdfEngine>>) -> Self {
        Self { pdf_engine }
    }

    pub fn with_lopdf() -> Self {
        Self::new(Some(Arc::new(LopdfEngine)))
    }

    pub fn without_pdf_engine() -> Self {
        Self::new(None)
    }

    /// Extracts text from `blob`, whose type is declared by `media_type`.
    ///
    /// The size limit is checked before the media type or any byte is looked at.
    pub async fn extract(&self, blob: Bytes, media_type: &str) -> Result<Extracted, ExtractError> {
        if blob.len() > MAX_DOCUMENT_BYTES {
            return Err(ExtractError::TooLarge { size: blob.len() });
        }

        let kind = DocumentKind::from_media_type(media_type)?;
        debug!("Extracting {} bytes as {}", blob.len(), kind.media_type());

        let text = match kind {
            DocumentKind::PlainText => decode_plain_text(&blob)?,
            DocumentKind::Pdf => self.extract_pdf(blob).await?,
        };

        Ok(Extracted { text, kind })
    }

    async fn extract_pdf(&self, blob: Bytes) -> Result<String, ExtractError> {
        let engine = self.pdf_engine.clone().ok_or_else(|| {
            PdfEngineError::Unavailable("no PDF engine is configured".to_string())
        })?;

        engine.ensure_ready()?;

        // Parsing is CPU-bound; keep it off the async workers.
        let pages = tokio::task::spawn_blocking(move || engine.extract_pages(&blob))
            .await
            .map_err(|e| {
                // A parser panic is a property of the document.
                if e.is_panic() {
                    ExtractError::PdfParse("the document crashed the PDF parser".to_string())
                } else {
                    ExtractError::EngineUnavailable(format!("PDF worker stopped: {e}"))
                }
            })??;

        let text = assemble_pages(&pages);
        let chars = text.chars().count();
        debug!("PDF yielded {} pages, {} characters", pages.len(), chars);

        if chars < MIN_PDF_TEXT_CHARS {
            return Err(ExtractError::InsufficientText { chars });
        }

        Ok(text)
    }
}

/// Decodes UTF-8, dropping a leading byte-order mark.
fn decode_plain_text(blob: &[u8]) -> Result<String, ExtractError> {
    let text = std::str::from_utf8(blob).map_err(|e| ExtractError::InvalidUtf8(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_owned())
}
