use lopdf::Document;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PdfEngineError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Parse(String),
}

/// A PDF text layer reader.
///
/// Implementations return one entry per page in ascending page-number order, each entry
/// holding that page's visible text tokens in the order the text layer yields them.
pub trait PdfEngine: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Idempotent readiness check, run before every extraction.
    fn ensure_ready(&self) -> Result<(), PdfEngineError> {
        Ok(())
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, PdfEngineError>;
}

/// Pure-Rust engine backed by `lopdf`.
///
/// A token is one text object (`BT … ET`) of the page content stream.
pub struct LopdfEngine;

impl PdfEngine for LopdfEngine {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<Vec<String>>, PdfEngineError> {
        let _span = tracing::info_span!("extraction.pdf", engine = self.name()).entered();

        let doc = Document::load_mem(bytes)
            .map_err(|e| PdfEngineError::Parse(format!("failed to load PDF: {e}")))?;

        // BTreeMap keyed by page number, so iteration is already ascending.
        let pages = doc.get_pages();
        debug!("PDF has {} pages", pages.len());

        let mut out = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            let raw = doc.extract_text(&[*page_number]).map_err(|e| {
                PdfEngineError::Parse(format!("failed to read page {page_number}: {e}"))
            })?;
            out.push(page_tokens(&raw));
        }

        Ok(out)
    }
}

fn page_tokens(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// Joins tokens with a single space within a page and pages with a blank line, then trims.
pub fn assemble_pages<S: AsRef<str>>(pages: &[Vec<S>]) -> String {
    let mut text = String::new();
    for tokens in pages {
        let line: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        text.push_str(&line.join(" "));
        text.push_str("\n\n");
    }
    text.trim().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{mpsc, Arc, Mutex};

    use lopdf::{dictionary, Document, Object, Stream};
    use tokio::sync::Notify;

    use super::{PdfEngine, PdfEngineError};

    /// Engine stub returning fixed pages.
    pub(crate) struct StaticPages {
        pages: Vec<Vec<String>>,
        not_ready: Option<String>,
        explode: bool,
    }

    impl StaticPages {
        pub(crate) fn new(pages: Vec<Vec<&str>>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|p| p.into_iter().map(String::from).collect())
                    .collect(),
                not_ready: None,
                explode: false,
            }
        }

        pub(crate) fn not_ready(message: &str) -> Self {
            Self {
                pages: vec![],
                not_ready: Some(message.to_string()),
                explode: false,
            }
        }

        pub(crate) fn exploding() -> Self {
            Self {
                pages: vec![],
                not_ready: None,
                explode: true,
            }
        }
    }

    impl PdfEngine for StaticPages {
        fn name(&self) -> &'static str {
            "static"
        }

        fn ensure_ready(&self) -> Result<(), PdfEngineError> {
            match &self.not_ready {
                Some(msg) => Err(PdfEngineError::Unavailable(msg.clone())),
                None => Ok(()),
            }
        }

        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<Vec<String>>, PdfEngineError> {
            assert!(!self.explode, "static PDF engine exploded");
            Ok(self.pages.clone())
        }
    }

    /// Engine stub that parks inside `extract_pages` until the returned sender fires.
    pub(crate) struct GatedPages {
        pages: Vec<Vec<String>>,
        entered: Arc<Notify>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedPages {
        /// Returns the engine, a notifier that fires once parsing has started, and the release.
        pub(crate) fn new(pages: Vec<Vec<&str>>) -> (Self, Arc<Notify>, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let entered = Arc::new(Notify::new());
            let engine = Self {
                pages: pages
                    .into_iter()
                    .map(|p| p.into_iter().map(String::from).collect())
                    .collect(),
                entered: entered.clone(),
                release: Mutex::new(rx),
            };
            (engine, entered, tx)
        }
    }

    impl PdfEngine for GatedPages {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<Vec<String>>, PdfEngineError> {
            self.entered.notify_one();
            let _ = self.release.lock().unwrap().recv();
            Ok(self.pages.clone())
        }
    }

    /// Builds an in-memory PDF; every line becomes its own text object.
    pub(crate) fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut content = String::new();
            for (i, line) in lines.iter().enumerate() {
                let y = 742 - (i as i64) * 14;
                content.push_str(&format!("BT /F1 12 Tf 50 {y} Td ({line}) Tj ET\n"));
            }
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
