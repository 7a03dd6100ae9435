//! Deterministic text cleanup.
//!
//! Two entry points share one set of small `&str → String` rules:
//!
//! * [`normalise_text`] runs on every page's text (embedded or OCR) before
//!   it is joined into the document blob.
//! * [`clean_summary`] runs on the model's reply before it is returned.
//!
//! Rule order matters: line endings are normalised before per-line trimming,
//! and fences are stripped before anything looks at line structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a page's text.
///
/// 1. CRLF / CR → LF
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to one
/// 5. Trim leading/trailing blank space of the whole page
pub fn normalise_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean a summary returned by the model.
///
/// Same as [`normalise_text`], plus removal of an outer code fence and of a
/// leading "Here is a summary:" style preamble the prompt asks the model
/// not to write.
pub fn clean_summary(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = strip_preamble(&s);
    normalise_text(&s)
}

// ── Outer fences ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").expect("static regex")
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Preamble ─────────────────────────────────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:sure[,!.]?\s*)?here(?:'s| is) (?:a |the |your )?(?:concise |brief |short )?summary[^\n:]*:\s*\n")
        .expect("static regex")
});

fn strip_preamble(input: &str) -> String {
    RE_PREAMBLE.replace(input, "").to_string()
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Trailing whitespace ──────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Blank lines ──────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Invisible Unicode ────────────────────────────────────────────────────────

/// Zero-width spaces and joiners, BOM, soft hyphen, word joiner.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

fn remove_invisible_chars(input: &str) -> String {
    input.replace(INVISIBLE, "")
}

/// Whether `input` has anything left once whitespace and invisible
/// characters are ignored. `str::trim` keeps the invisible ones.
pub fn has_visible_text(input: &str) -> bool {
    input
        .chars()
        .any(|c| !c.is_whitespace() && !INVISIBLE.contains(&c))
}
