use bytes::Bytes;
use chrono::{DateTime, Utc};

pub const EXPORT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";

/// The optimized résumé packaged as a downloadable text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedResume {
    pub file_name: String,
    pub bytes: Bytes,
}

impl ExportedResume {
    /// Bytes are exactly the UTF-8 encoding of `text`; nothing is added or normalized.
    pub fn new(text: &str, at: DateTime<Utc>) -> Self {
        Self {
            file_name: export_file_name(at),
            bytes: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("optimized_cv_{}.txt", at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;

    use super::*;
    use crate::extraction::{DocumentKind, TextExtractor};

    #[test]
    fn test_file_name_uses_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_718_000_000_123).unwrap();
        assert_eq!(export_file_name(at), "optimized_cv_1718000000123.txt");
    }

    #[test]
    fn test_content_disposition() {
        let at = Utc.timestamp_millis_opt(42).unwrap();
        let exported = ExportedResume::new("cv", at);
        assert_eq!(
            exported.content_disposition(),
            "attachment; filename=\"optimized_cv_42.txt\""
        );
    }

    #[tokio::test]
    async fn test_exported_file_reimports_identically() {
        let text = "JANE DOE\n\nSenior Engineer · Zürich\n  - Rust, Kubernetes, SQL\n";
        let exported = ExportedResume::new(text, Utc::now());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&exported.bytes).unwrap();
        let on_disk = std::fs::read(file.path()).unwrap();
        assert_eq!(on_disk, text.as_bytes());

        let reimported = TextExtractor::without_pdf_engine()
            .extract(Bytes::from(on_disk), "text/plain")
            .await
            .unwrap();
        assert_eq!(reimported.kind, DocumentKind::PlainText);
        assert_eq!(reimported.text, text);
    }
}
