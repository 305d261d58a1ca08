//! CLI binary for edgequake-pdf-rag.
//!
//! A thin shim over the library crate: `serve` runs the HTTP surface,
//! `ask` ingests a few PDFs into a fresh index and answers one question.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf_rag::{
    server, IngestDocument, IngestProgressCallback, ProgressCallback, RagConfig, RagService,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Terminal progress bar over all pages of the batch. The length grows as
/// each document is opened, since page counts are only known after rendering.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::new(0),
        })
    }

    /// The spinner only runs between batch start and completion or failure.
    fn start_spinner(&self) {
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        self.bar.set_style(spinner_style);
        self.bar.set_prefix("Preparing");
        self.bar.set_message("Opening PDF…");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Ingesting {documents} document(s)…"))
        ));
        self.start_spinner();
    }

    fn on_document_start(&self, filename: &str, pages: usize) {
        if self.bar.length().unwrap_or(0) == 0 {
            self.activate_bar();
        }
        self.bar.inc_length(pages as u64);
        self.bar.set_message(filename.to_string());
    }

    fn on_page_transcribed(&self, filename: &str, page_index: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} {} page {:>3}/{:<3}  {}",
            green("✓"),
            filename,
            page_index + 1,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, documents: usize, pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} page(s) from {} document(s) indexed",
            green("✔"),
            bold(&pages.to_string()),
            documents
        );
    }

    fn on_batch_failed(&self, error: &str) {
        self.bar.finish_and_clear();
        tracing::debug!("Batch abandoned: {}", error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on localhost:8005 (Ollama models)
  pdf-rag serve

  # Ask a one-off question about a resume
  pdf-rag ask --file resume.pdf "What is the candidate's name?"

  # Hosted models, JSON output
  pdf-rag --provider openai --vision-model gpt-4.1-mini --text-model gpt-4.1-mini \
      --embedding-model text-embedding-3-small --embedding-dim 1536 \
      ask --file resume.pdf --json "List the programming languages"

HTTP ENDPOINTS (serve):
  POST /upload   multipart, one or more "files" fields
  POST /query    {"query": "..."} → {"response": "...", "sources": [...]}
  GET  /static/latest_transcription.json
  GET  /health

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Provider (ollama, openai, anthropic, gemini, auto)
  OLLAMA_HOST             Ollama server URL (default http://localhost:11434)
  OPENAI_API_KEY          OpenAI API key
  PDFIUM_LIB_PATH         Path to libpdfium
  PDFRAG_*                Every flag, e.g. PDFRAG_TOP_K=5
"#;

/// Ask questions about PDF documents using vision-LLM transcription and embedding search.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-rag",
    version,
    about = "Ask questions about PDF documents using Vision LLMs",
    long_about = "Transcribes PDF pages with a vision model, indexes them by embedding, and \
answers questions grounded only in the retrieved pages. Works with Ollama out of the box and \
with any provider supported by edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    models: ModelArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, env = "PDFRAG_HOST", default_value = "localhost")]
        host: String,

        #[arg(long, env = "PDFRAG_PORT", default_value_t = 8005)]
        port: u16,

        /// Maximum upload size in MiB.
        #[arg(long, env = "PDFRAG_MAX_UPLOAD_MB", default_value_t = 64)]
        max_upload_mb: usize,
    },

    /// Ingest PDFs into a fresh index and answer one question.
    Ask {
        /// PDF to ingest (repeatable).
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// The question.
        question: String,

        /// Print `{"response", "sources"}` JSON instead of text.
        #[arg(long, env = "PDFRAG_JSON")]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "PDFRAG_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Provider for all three models: ollama, openai, anthropic, gemini, auto.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Vision model used to transcribe pages.
    #[arg(long, global = true, env = "PDFRAG_VISION_MODEL", default_value = "llama3.2-vision")]
    vision_model: String,

    /// Embedding model for pages and questions.
    #[arg(long, global = true, env = "PDFRAG_EMBEDDING_MODEL", default_value = "mxbai-embed-large")]
    embedding_model: String,

    /// Text model used to answer questions.
    #[arg(long, global = true, env = "PDFRAG_TEXT_MODEL", default_value = "llama3.2")]
    text_model: String,

    /// Embedding dimension of --embedding-model.
    #[arg(long, global = true, env = "PDFRAG_EMBEDDING_DIM", default_value_t = 1024)]
    embedding_dim: usize,

    /// Per-model-call timeout in seconds.
    #[arg(long, global = true, env = "PDFRAG_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Retries per model call.
    #[arg(long, global = true, env = "PDFRAG_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Pages of one document transcribed concurrently.
    #[arg(short, long, global = true, env = "PDFRAG_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Pages used as answer context.
    #[arg(long, global = true, env = "PDFRAG_TOP_K", default_value_t = 3)]
    top_k: usize,

    /// Directory for the snapshot and page images.
    #[arg(long, global = true, env = "PDFRAG_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Save every rendered page as PNG in --static-dir.
    #[arg(long, global = true, env = "PDFRAG_KEEP_PAGE_IMAGES")]
    keep_page_images: bool,

    /// Path to libpdfium (falls back to PDFIUM_LIB_PATH, then the system library).
    #[arg(long, global = true, env = "PDFRAG_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFRAG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFRAG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `ask`.
    let show_progress = match &cli.command {
        Command::Ask {
            json, no_progress, ..
        } => !cli.models.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.models.verbose {
        "debug"
    } else if cli.models.quiet || show_progress {
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli.models, progress_cb)?;
    let service = Arc::new(RagService::from_config(&config).context("Failed to set up models")?);

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload_mb,
        } => {
            let bind_addr = format!("{host}:{port}");
            server::serve(service, &bind_addr, max_upload_mb * 1024 * 1024)
                .await
                .with_context(|| format!("Server on {bind_addr} failed"))?;
        }
        Command::Ask {
            files,
            question,
            json,
            ..
        } => {
            let documents = read_documents(&files).await?;
            service.ingest(documents).await.context("Ingestion failed")?;

            let answer = service.query(&question).await.context("Query failed")?;

            if json {
                let out =
                    serde_json::to_string_pretty(&answer).context("Failed to serialise answer")?;
                println!("{out}");
            } else {
                println!("{}", answer.response.trim_end());
                if !cli.models.quiet {
                    eprintln!(
                        "\n{} {}",
                        dim("sources:"),
                        if answer.sources.is_empty() {
                            dim("(none)")
                        } else {
                            answer.sources.join(", ")
                        }
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `RagConfig`.
fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<RagConfig> {
    let mut builder = RagConfig::builder()
        .provider_name(&args.provider)
        .vision_model(&args.vision_model)
        .embedding_model(&args.embedding_model)
        .text_model(&args.text_model)
        .embedding_dimension(args.embedding_dim)
        .api_timeout_secs(args.api_timeout)
        .max_retries(args.max_retries)
        .page_concurrency(args.concurrency)
        .top_k(args.top_k)
        .static_dir(&args.static_dir)
        .persist_page_images(args.keep_page_images);

    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read each file; the file name (without directories) becomes the document name.
async fn read_documents(files: &[PathBuf]) -> Result<Vec<IngestDocument>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(IngestDocument::new(display_name(path), bytes));
    }
    Ok(documents)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
