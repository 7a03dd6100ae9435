//! Prompts for summarisation and vision OCR.
//!
//! Callers can override the summary prompt via
//! [`crate::config::SummaryConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt for summarising a document's extracted text.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"You are an expert technical writer. You will receive the full text extracted from a PDF document. Write a faithful, self-contained summary of it.

Rules:
- Cover the main purpose, key points, findings and conclusions, in the order the document presents them
- Keep names, figures, dates and units exactly as written
- Do not invent facts that are not in the text
- Ignore page numbers, running headers/footers and OCR noise
- Write plain prose paragraphs; use a short bulleted list only when the document itself enumerates items
- Output ONLY the summary, with no preamble such as "Here is a summary""#;

/// System prompt used for each slice when the text is summarised in chunks.
pub const CHUNK_SUMMARY_PROMPT: &str = r#"You are an expert technical writer. You will receive one consecutive excerpt of a longer PDF document. Summarise this excerpt faithfully in a few sentences.

Rules:
- Keep names, figures, dates and units exactly as written
- Do not speculate about the parts of the document you cannot see
- Output ONLY the summary of the excerpt"#;

/// System prompt for transcribing a rendered page with a vision model.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image exactly as written, in natural reading order.

- Output plain text only, no Markdown, no commentary
- Preserve paragraph breaks with blank lines
- If the page contains no text, output nothing"#;

/// Wrap the document text in the user turn sent to the summarization model.
pub fn summary_request(text: &str) -> String {
    format!("Summarize the following text:\n\n\"\"\"\n{}\n\"\"\"", text)
}

/// User turn for one chunk, numbered so the model knows where it sits.
pub fn chunk_request(text: &str, index: usize, total: usize) -> String {
    format!(
        "Excerpt {} of {}:\n\n\"\"\"\n{}\n\"\"\"",
        index + 1,
        total,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_request_embeds_text() {
        let req = summary_request("quarterly revenue grew 12%");
        assert!(req.starts_with("Summarize the following text:"));
        assert!(req.contains("quarterly revenue grew 12%"));
    }

    #[test]
    fn chunk_request_is_one_indexed() {
        let req = chunk_request("body", 0, 3);
        assert!(req.starts_with("Excerpt 1 of 3"));
    }
}
