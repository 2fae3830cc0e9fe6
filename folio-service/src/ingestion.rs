//! Upload validation and picture extraction.

pub mod assets;
pub mod hash;
pub mod pdf;

pub use pdf::{ExtractedPicture, PdfSource, PictureEncoding};

use crate::error::{ServiceError, ServiceResult};

/// Leading bytes searched for the PDF header; some producers prepend junk
const SNIFF_WINDOW: usize = 1024;

/// Supported upload formats, detected from content rather than the filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
}

impl DocumentFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
        }
    }
}

/// Identify the upload format from its magic bytes
pub fn sniff_format(content: &[u8]) -> ServiceResult<DocumentFormat> {
    let window = &content[..content.len().min(SNIFF_WINDOW)];

    if window.windows(5).any(|w| w == b"%PDF-") {
        Ok(DocumentFormat::Pdf)
    } else {
        Err(ServiceError::MalformedDocument {
            message: "Unsupported document format".to_string(),
        })
    }
}

/// Parse an upload of a known format
pub fn parse_document(format: DocumentFormat, content: &[u8]) -> ServiceResult<PdfSource> {
    match format {
        DocumentFormat::Pdf => PdfSource::parse(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_pdf() {
        assert_eq!(sniff_format(b"%PDF-1.7\n...").unwrap(), DocumentFormat::Pdf);
        assert_eq!(
            sniff_format(b"\xef\xbb\xbf%PDF-1.4").unwrap(),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn test_sniff_ignores_extension_claims() {
        let png = b"\x89PNG\r\n\x1a\n rest of file";
        assert!(matches!(
            sniff_format(png),
            Err(ServiceError::MalformedDocument { .. })
        ));
        assert!(sniff_format(b"").is_err());
    }

    #[test]
    fn test_header_must_be_near_start() {
        let mut content = vec![b' '; SNIFF_WINDOW];
        content.extend_from_slice(b"%PDF-1.4");
        assert!(sniff_format(&content).is_err());
    }
}
