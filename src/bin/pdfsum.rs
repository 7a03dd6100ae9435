//! CLI binary for edgequake-pdfsum.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SummaryConfig`, wires Ctrl-C to cancellation, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfsum::{
    extract_text, summarize, summarize_to_file, ChunkStrategy, OcrBackend, PageSelection,
    PageSeparator, ProgressCallback, SummaryConfig, SummaryOutput, SummaryProgressCallback,
    TextSource, Truncation,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Page bar while text is acquired, then a spinner while the model works.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SummaryProgressCallback for CliProgressCallback {
    fn on_acquire_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
        self.bar.set_message("");
    }

    fn on_page_extracted(&self, page_num: usize, source: TextSource, chars: usize) {
        let tag = match source {
            TextSource::Embedded => green("text"),
            TextSource::Ocr => cyan("ocr "),
            TextSource::Skipped => yellow("skip"),
        };
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            green("✓"),
            page_num,
            tag,
            dim(&format!("{chars:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_warning(&self, page_num: usize, message: &str) {
        let msg = if message.chars().count() > 80 {
            let cut: String = message.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            message.to_string()
        };
        self.bar
            .println(format!("  {} Page {:>3}  {}", yellow("⚠"), page_num, yellow(&msg)));
    }

    fn on_truncated(&self, kept_chars: usize, total_chars: usize) {
        self.bar.println(format!(
            "{} Text truncated to {} of {} characters",
            yellow("⚠"),
            kept_chars,
            total_chars
        ));
    }

    fn on_summary_attempt(&self, attempt: u32, max_attempts: u32) {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(spinner_style);
        self.bar.set_prefix("Summarising");
        self.bar
            .set_message(format!("attempt {attempt}/{max_attempts}"));
    }

    fn on_retry(&self, attempt: u32, delay: Duration) {
        self.bar.println(format!(
            "  {} Rate limited on attempt {}, retrying in {:.1}s",
            yellow("↻"),
            attempt,
            delay.as_secs_f64()
        ));
    }

    fn on_summary_complete(&self, summary_chars: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Summary ready ({} chars)",
            green("✔"),
            bold(&summary_chars.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summary to stdout
  pdfsum report.pdf

  # Write the summary to a file
  pdfsum report.pdf -o report.summary.txt

  # Scanned document, German + English OCR
  pdfsum --ocr-lang deu+eng scan.pdf

  # Long book: summarise in 20k-character chunks
  pdfsum --chunk-chars 20000 book.pdf

  # Cap the text sent to the model (reported when it applies)
  pdfsum --truncate-chars 50000 book.pdf

  # Be patient with a busy API
  pdfsum --max-attempts 8 --initial-delay-ms 2000 report.pdf

  # Just the extracted text, no API key needed
  pdfsum --extract-only report.pdf

  # Structured output
  pdfsum --json report.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDFSUM_*                Any flag, e.g. PDFSUM_MAX_ATTEMPTS=6
  RUST_LOG                Log filter, overrides --verbose

  A .env file in the working directory is loaded before flags are parsed.
"#;

/// Summarise PDF files and URLs with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsum",
    version,
    about = "Summarise PDF files and URLs with an LLM",
    long_about = "Summarise PDF documents (local files or URLs). Embedded text is read \
directly; pages without text are OCR'd with tesseract or a vision model. Rate-limited \
requests are retried with exponential backoff.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the summary to this file instead of stdout.
    #[arg(short, long, env = "PDFSUM_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "PDFSUM_JSON")]
    json: bool,

    /// Print the extracted text only; no summarisation.
    #[arg(long)]
    extract_only: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFSUM_PAGES", default_value = "all")]
    pages: String,

    /// OCR engine for pages without embedded text.
    #[arg(long, env = "PDFSUM_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Tesseract language pack(s), e.g. eng or deu+eng.
    #[arg(long, env = "PDFSUM_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Total summarisation attempts, counting the first.
    #[arg(long, env = "PDFSUM_MAX_ATTEMPTS", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Wait before the first retry, in milliseconds.
    #[arg(long, env = "PDFSUM_INITIAL_DELAY_MS", default_value_t = 1000)]
    initial_delay_ms: u64,

    /// Factor applied to the wait after each retry (> 1).
    #[arg(long, env = "PDFSUM_BACKOFF_MULTIPLIER", default_value_t = 2.0)]
    backoff_multiplier: f64,

    /// Upper bound on a single wait, in milliseconds. 0 disables the cap.
    #[arg(long, env = "PDFSUM_MAX_DELAY_MS", default_value_t = 60_000)]
    max_delay_ms: u64,

    /// Summarise in chunks of at most this many characters.
    #[arg(long, env = "PDFSUM_CHUNK_CHARS")]
    chunk_chars: Option<usize>,

    /// Send at most this many characters to the model.
    #[arg(long, env = "PDFSUM_TRUNCATE_CHARS")]
    truncate_chars: Option<usize>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// Max tokens in the summary.
    #[arg(long, env = "PDFSUM_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSUM_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDFSUM_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFSUM_PASSWORD")]
    password: Option<String>,

    /// Page separator in the extracted text: newline, blank, formfeed, or a custom string.
    #[arg(long, env = "PDFSUM_SEPARATOR", default_value = "newline")]
    separator: String,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSUM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Timeout for a single summarisation call, in seconds.
    #[arg(long, env = "PDFSUM_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDFSUM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSUM_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    Tesseract,
    Vision,
    None,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is not an error.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Cancellation ─────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Cancelling…", yellow("⏹"));
                cancel.cancel();
            }
        });
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn SummaryProgressCallback>);

    let config = build_config(&cli, progress_cb).await?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let acquired = extract_text(&cli.input, &config).await;
        if let Some(ref cb) = cli_progress {
            cb.finish();
        }
        let acquired = acquired.context("Text extraction failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&acquired).context("Failed to serialise output")?
            );
        } else {
            write_stdout(&acquired.text)?;
        }
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} {} pages  ({} embedded, {} OCR, {} skipped)  {} chars",
                green("✔"),
                acquired.pages.len(),
                acquired.count(TextSource::Embedded),
                acquired.count(TextSource::Ocr),
                acquired.count(TextSource::Skipped),
                acquired.char_count()
            );
        }
        return Ok(());
    }

    // ── Run summary ──────────────────────────────────────────────────────
    let result = match cli.output {
        Some(ref output_path) => summarize_to_file(&cli.input, output_path, &config, &cancel).await,
        None => summarize(&cli.input, &config, &cancel).await,
    };
    if let Some(ref cb) = cli_progress {
        cb.finish();
    }
    let output = result.context("Summarisation failed")?;

    match cli.output {
        Some(ref output_path) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            }
            if !cli.quiet {
                print_stats(&output);
                eprintln!("   →  {}", bold(&output_path.display().to_string()));
            }
        }
        None => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else {
                write_stdout(&output.summary)?;
                if !cli.quiet {
                    print_stats(&output);
                }
            }
        }
    }

    Ok(())
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_stats(output: &SummaryOutput) {
    let s = &output.stats;
    eprintln!(
        "{}  {} pages ({} embedded, {} OCR, {} skipped)  {} → {} chars  {} attempt(s)  {}ms",
        if s.skipped_pages == 0 && !s.truncated {
            green("✔")
        } else {
            yellow("⚠")
        },
        s.total_pages,
        s.embedded_pages,
        s.ocr_pages,
        s.skipped_pages,
        dim(&s.input_chars.to_string()),
        dim(&s.summary_chars.to_string()),
        s.attempts,
        s.total_duration_ms,
    );
    if s.truncated {
        eprintln!("   {}", yellow("input was truncated before summarising"));
    }
}

/// Map CLI args to `SummaryConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SummaryConfig> {
    let pages = parse_pages(&cli.pages)?;
    let separator = parse_separator(&cli.separator);

    let ocr = match cli.ocr {
        OcrArg::Tesseract => OcrBackend::Tesseract {
            language: cli.ocr_lang.clone(),
        },
        OcrArg::Vision => OcrBackend::Vision,
        OcrArg::None => OcrBackend::Disabled,
    };

    let mut builder = SummaryConfig::builder()
        .max_attempts(cli.max_attempts)
        .initial_delay(Duration::from_millis(cli.initial_delay_ms))
        .backoff_multiplier(cli.backoff_multiplier)
        .max_delay((cli.max_delay_ms > 0).then(|| Duration::from_millis(cli.max_delay_ms)))
        .ocr(ocr)
        .pages(pages)
        .page_separator(separator)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(chunk_chars) = cli.chunk_chars {
        builder = builder.chunking(ChunkStrategy::Chunked { chunk_chars });
    }
    if let Some(max_chars) = cli.truncate_chars {
        builder = builder.truncation(Truncation::MaxChars(max_chars));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "newline" | "nl" => PageSeparator::Newline,
        "blank" | "blankline" => PageSeparator::BlankLine,
        "formfeed" | "ff" => PageSeparator::FormFeed,
        _ => PageSeparator::Custom(s.replace("\\n", "\n")),
    }
}
