//! CLI binary for invoice-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, reads page images, and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use invoice_extract::{
    line_item_rows, process_document, summary_rows, ExtractionConfig, PageImage, ProviderKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a single-page invoice (human-readable output)
  invoice-extract scan-p1.png

  # Multi-page invoice, pages in order
  invoice-extract p1.png p2.png p3.png

  # Structured JSON envelope (success flag, data, warnings)
  invoice-extract --json invoice.png > result.json

  # CSV projections (summary rows, then line items)
  invoice-extract --csv invoice.png > invoice.csv

  # Use Gemini instead of Claude
  invoice-extract --provider gemini invoice.png

  # Pin a model and raise concurrency
  invoice-extract --provider claude --model claude-sonnet-4-6 -c 8 p*.png

ENVIRONMENT VARIABLES:
  AI_PROVIDER          Backend when --provider is not given (anthropic, gemini)
  ANTHROPIC_API_KEY    Anthropic API key
  GEMINI_API_KEY       Google Gemini API key
  CLAUDE_MODEL         Override the default Anthropic model
  GEMINI_MODEL         Override the default Gemini model

SETUP:
  1. Set an API key:   export ANTHROPIC_API_KEY=sk-ant-...
  2. Extract:          invoice-extract invoice.png
"#;

/// Extract structured invoice data from page images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract structured invoice data from page images using Vision LLMs",
    long_about = "Extract structured invoice data (vendor, client, totals, line items) from \
page images using Vision Language Models. Supports Anthropic Claude and Google Gemini. \
Per-page answers are merged, normalized, and arithmetically cross-checked into one record.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page image files (PNG or JPEG), in page order.
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "INVOICE_EXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Vision backend: anthropic (claude) or gemini (google).
    #[arg(long, env = "AI_PROVIDER")]
    provider: Option<ProviderKind>,

    /// Model ID (defaults per backend, e.g. claude-sonnet-4-6).
    #[arg(long, env = "INVOICE_EXTRACT_MODEL")]
    model: Option<String>,

    /// Number of concurrent per-page API calls.
    #[arg(short, long, env = "INVOICE_EXTRACT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max model output tokens per page.
    #[arg(long, env = "INVOICE_EXTRACT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-page API call timeout in seconds.
    #[arg(long, env = "INVOICE_EXTRACT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Relative tolerance for totals cross-checks.
    #[arg(long, env = "INVOICE_EXTRACT_TOLERANCE", default_value_t = 0.01)]
    tolerance: f64,

    /// Output the structured JSON envelope instead of text.
    #[arg(long, env = "INVOICE_EXTRACT_JSON")]
    json: bool,

    /// Output CSV projections (summary rows, then line items).
    #[arg(long, env = "INVOICE_EXTRACT_CSV", conflicts_with = "json")]
    csv: bool,

    /// Disable the spinner.
    #[arg(long, env = "INVOICE_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result itself.
    #[arg(short, long, env = "INVOICE_EXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Load page images ─────────────────────────────────────────────────
    let mut pages = Vec::with_capacity(cli.pages.len());
    for path in &cli.pages {
        pages.push(load_page(path)?);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ExtractionConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .totals_tolerance(cli.tolerance);
    if let Some(kind) = cli.provider {
        builder = builder.provider_kind(kind);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run extraction ───────────────────────────────────────────────────
    let spinner = if !cli.quiet && !cli.no_progress && !cli.json && !cli.csv {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Extracting {} page(s)…", pages.len()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let result = process_document(&pages, &config).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    // ── Render output ────────────────────────────────────────────────────
    let rendered = if cli.json {
        let mut json =
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        json.push('\n');
        json
    } else {
        let invoice = match result.data {
            Some(ref invoice) => invoice,
            None => bail!(
                "Extraction failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        };
        if cli.csv {
            render_csv(invoice)
        } else {
            render_text(invoice)
        }
    };

    match cli.output {
        Some(ref path) => std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => io::stdout()
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?,
    }

    // ── Summary to stderr ────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        for warning in &result.warnings {
            eprintln!("{} {}", yellow("⚠"), warning);
        }
        eprintln!(
            "{} {} page(s)  {}",
            green("✔"),
            bold(&result.pages_processed.to_string()),
            dim(&format!("{}ms", result.processing_time_ms))
        );
    }

    if cli.json && !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Read one page image, inferring the format from the file extension.
fn load_page(path: &Path) -> Result<PageImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(PageImage::png(bytes)),
        "jpg" | "jpeg" => Ok(PageImage::jpeg(bytes)),
        other => bail!(
            "{}: unsupported page image extension '{other}' (expected png, jpg, jpeg)",
            path.display()
        ),
    }
}

/// Human-readable field dump plus a line-item table.
fn render_text(invoice: &invoice_extract::CanonicalInvoice) -> String {
    let mut out = String::new();
    for (label, value) in summary_rows(invoice) {
        if !value.is_empty() {
            out.push_str(&format!("{label:<16} {value}\n"));
        }
    }

    let rows = line_item_rows(invoice);
    if rows.len() > 1 {
        out.push('\n');
        out.push_str(&format!(
            "{:<40} {:>8} {:>12} {:>12}\n",
            "Description", "Qty", "Unit Price", "Total"
        ));
        for row in rows {
            out.push_str(&format!(
                "{:<40} {:>8} {:>12} {:>12}\n",
                row.description, row.quantity, row.unit_price, row.total
            ));
        }
    }
    out
}

/// CSV: summary rows, blank line, line-item table with header.
fn render_csv(invoice: &invoice_extract::CanonicalInvoice) -> String {
    let mut out = String::new();
    for (label, value) in summary_rows(invoice) {
        out.push_str(&format!("{},{}\n", csv_cell(&label), csv_cell(&value)));
    }
    out.push('\n');
    out.push_str("Description,Quantity,Unit Price,Total\n");
    for row in line_item_rows(invoice) {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_cell(&row.description),
            row.quantity,
            row.unit_price,
            row.total
        ));
    }
    out
}

/// Quote a cell when it contains CSV metacharacters.
fn csv_cell(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
