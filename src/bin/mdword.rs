//! CLI binary for mdword.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service, the
//! other subcommands run a single conversion and print the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mdword::server;
use mdword::{
    markdown_file_to_word, word_file_to_markdown, ConversionConfig, ConversionService,
};
use std::io::{self, Write};
use std::net::SocketAddr;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default address (0.0.0.0:8000)
  mdword serve

  # Markdown to Word
  mdword md-to-word notes.md -o notes.docx

  # Word to Markdown (stdout), images inlined as data: URIs
  mdword word-to-md report.docx

  # Legacy .doc (needs LibreOffice), JSON with stats
  mdword word-to-md old.doc --json > old.json

HTTP ENDPOINTS:
  GET  /health        {"status": "ok", "version": "..."}
  POST /md-to-word    JSON {"content": "<markdown>"}  →  .docx attachment
  POST /word-to-md    multipart field "file"          →  {"content": "<markdown>"}

ENVIRONMENT VARIABLES:
  MDWORD_PANDOC           pandoc executable
  MDWORD_LIBREOFFICE      LibreOffice executable
  MDWORD_TOOL_TIMEOUT     Per-tool timeout in seconds (0 = none)
  MDWORD_WORKSPACE_DIR    Parent directory for request workspaces
  MDWORD_MAX_UPLOAD_MB    Request body limit in MiB
  MDWORD_BIND             Listen address for `serve`
  RUST_LOG                tracing filter, overrides -v / -q
"#;

/// Convert between Markdown and Word documents with pandoc.
#[derive(Parser, Debug)]
#[command(
    name = "mdword",
    version,
    about = "Convert between Markdown and Word documents with pandoc",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// pandoc executable (name on PATH or full path).
    #[arg(long, global = true, env = "MDWORD_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// LibreOffice executable, used for legacy .doc input.
    #[arg(long, global = true, env = "MDWORD_LIBREOFFICE", default_value = "libreoffice")]
    libreoffice: PathBuf,

    /// Per-invocation tool timeout in seconds; 0 disables it.
    #[arg(long, global = true, env = "MDWORD_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// Directory request workspaces are created in (default: system temp dir).
    #[arg(long, global = true, env = "MDWORD_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    /// Largest accepted request body, in MiB.
    #[arg(long, global = true, env = "MDWORD_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "MDWORD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MDWORD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MDWORD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP conversion service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "MDWORD_BIND", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },

    /// Convert a Markdown file to a .docx document.
    MdToWord {
        /// Markdown input file.
        input: PathBuf,

        /// Where to write the .docx.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a .docx or .doc file to Markdown with inlined images.
    WordToMd {
        /// Word input file (.docx or .doc).
        input: PathBuf,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print `{content, stats}` as JSON instead of Markdown.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // One-shot commands with a spinner keep library logs at error level;
    // the spinner and the summary line are the user-facing feedback.
    let one_shot = !matches!(cli.command, Command::Serve { .. });
    let show_progress = one_shot && !cli.quiet && !cli.no_progress;
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

    let config = build_config(&cli)?;
    let service = ConversionService::new(config);

    match cli.command {
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            server::serve(listener, Arc::new(service))
                .await
                .context("Server error")?;
        }

        Command::MdToWord {
            ref input,
            ref output,
        } => {
            let spinner = spinner(show_progress, input);
            let result = markdown_file_to_word(&service, input, output).await;
            spinner.finish_and_clear();
            let stats = result.context("Conversion failed")?;

            if !cli.quiet {
                eprintln!(
                    "{}  {} bytes  {}ms  →  {}",
                    green("✔"),
                    stats.output_bytes,
                    stats.total_duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }

        Command::WordToMd {
            ref input,
            ref output,
            json,
        } => {
            let spinner = spinner(show_progress, input);
            let result = word_file_to_markdown(&service, input, output.as_deref()).await;
            spinner.finish_and_clear();
            let doc = result.context("Conversion failed")?;

            if json {
                let json =
                    serde_json::to_string_pretty(&doc).context("Failed to serialise output")?;
                println!("{json}");
            } else if output.is_none() {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(doc.content.as_bytes())
                    .context("Failed to write to stdout")?;
                if !doc.content.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if !cli.quiet {
                let target = output
                    .as_ref()
                    .map(|p| bold(&p.display().to_string()))
                    .unwrap_or_else(|| "stdout".to_string());
                eprintln!(
                    "{}  {} image(s) inlined  {}ms  →  {}",
                    green("✔"),
                    doc.stats.media.images,
                    doc.stats.total_duration_ms,
                    target,
                );
                if doc.stats.legacy_normalized {
                    eprintln!("   {}", dim("legacy .doc normalised via LibreOffice"));
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .pandoc_path(&cli.pandoc)
        .libreoffice_path(&cli.libreoffice)
        .tool_timeout_secs(cli.tool_timeout)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(ref dir) = cli.workspace_dir {
        builder = builder.workspace_root(dir);
    }

    builder.build().context("Invalid configuration")
}

/// A steady-ticking spinner, hidden when progress output is off.
fn spinner(visible: bool, input: &Path) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Converting");
    bar.set_message(input.display().to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
