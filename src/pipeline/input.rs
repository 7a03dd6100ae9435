//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Everything downstream works on an in-memory byte buffer, the same shape an
//! upload handler receives, so local files, downloads and uploads all enter
//! the pipeline through one door. The `%PDF` magic is checked here so callers
//! get a meaningful error rather than a pdfium parse failure.

use crate::error::{ExtractionError, PdfSumError};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to the bytes of a PDF.
///
/// URLs are downloaded (bounded by `timeout_secs`); anything else is read
/// as a local file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, PdfSumError> {
    if input.trim().is_empty() {
        return Err(PdfSumError::InvalidInput {
            input: input.to_string(),
        });
    }

    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };

    check_pdf_magic(&bytes)?;
    Ok(bytes)
}

/// Reject buffers that do not start with `%PDF`.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ExtractionError::NotAPdf { magic });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, PdfSumError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(PdfSumError::PermissionDenied { path })
        }
        Err(_) => Err(PdfSumError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PdfSumError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfSumError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfSumError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfSumError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfSumError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            PdfSumError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfSumError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_accepts_pdf_header() {
        assert!(check_pdf_magic(b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn magic_rejects_other_bytes() {
        match check_pdf_magic(b"PK\x03\x04rest") {
            Err(ExtractionError::NotAPdf { magic }) => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(check_pdf_magic(b"%P").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, PdfSumError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_rejected() {
        let err = resolve_input("   ", 5).await.unwrap_err();
        assert!(matches!(err, PdfSumError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello, not a pdf").unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PdfSumError::Extraction(ExtractionError::NotAPdf { .. })
        ));
    }

    #[tokio::test]
    async fn local_pdf_bytes_returned() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n%%EOF").unwrap();
        let bytes = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
