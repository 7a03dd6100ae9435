//! OCR collaborator: rendered page image in, best-effort text out.
//!
//! Two engines implement [`OcrEngine`]:
//!
//! * [`TesseractOcr`] shells out to the `tesseract` CLI. Free, local, and
//!   good on clean scans.
//! * [`VisionOcr`] sends the page to a vision LLM. Better on photographs,
//!   handwriting and messy layouts, at API cost.
//!
//! Both return `Ok(String::new())` when the page simply has no text; `Err`
//! is reserved for the engine itself failing.

use crate::error::OcrError;
use crate::pipeline::encode;
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::DynamicImage;
use std::io::{ErrorKind, Write};
use std::sync::Arc;
use tracing::debug;

/// Recognises text in a rendered page.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Recognise the text on `image` (page `page_num`, 1-indexed).
    async fn recognize(&self, page_num: usize, image: &DynamicImage) -> Result<String, OcrError>;
}

/// [`OcrEngine`] backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }

    /// Use a tesseract binary other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, page_num: usize, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode::encode_png(image)
            .map_err(|e| OcrError::Processing(format!("PNG encoding failed: {e}")))?;

        // tesseract reads from a path; the temp file is removed on drop.
        let mut input = tempfile::Builder::new()
            .prefix("pdfsum-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Processing(format!("temp file: {e}")))?;
        input
            .write_all(&png)
            .map_err(|e| OcrError::Processing(format!("temp file write: {e}")))?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.language, "--oem", "3", "--psm", "3"])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    OcrError::Unavailable(format!(
                        "'{}' not found; install tesseract-ocr or choose another OCR backend",
                        self.binary
                    ))
                } else {
                    OcrError::Unavailable(format!("failed to run '{}': {e}", self.binary))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Processing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Page {}: tesseract recognised {} chars", page_num, text.len());
        Ok(text)
    }
}

/// [`OcrEngine`] that asks a vision LLM to transcribe the page.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
}

/// Output budget for one transcribed page.
const VISION_MAX_TOKENS: usize = 4096;

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn recognize(&self, page_num: usize, image: &DynamicImage) -> Result<String, OcrError> {
        let image_data = encode::encode_page(image)
            .map_err(|e| OcrError::Processing(format!("image encoding failed: {e}")))?;

        // VLM APIs require a user turn; the image carries the content.
        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(VISION_MAX_TOKENS),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| OcrError::Processing(format!("vision model: {e}")))?;

        debug!(
            "Page {}: vision OCR {} input tokens, {} output tokens",
            page_num, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content.trim().to_string())
    }
}
