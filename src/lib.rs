//! # mdword
//!
//! Convert Markdown to Word and Word to Markdown by driving pandoc, with
//! LibreOffice as a pre-converter for legacy `.doc` files.
//!
//! Images embedded in a Word document come back inlined in the Markdown as
//! `data:image/<ext>;base64,...` URIs, so the returned text is
//! self-contained.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request
//!  │
//!  ├─ 1. Classify   .docx / .doc by filename (Word → Markdown only)
//!  ├─ 2. Workspace  private temp dir per request
//!  ├─ 3. Normalise  .doc → .docx via LibreOffice (legacy input only)
//!  ├─ 4. Convert    pandoc, with --extract-media for Word → Markdown
//!  ├─ 5. Inline     media/ files → base64 data: URIs
//!  └─ 6. Release    workspace deleted, result returned
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdword::{ConversionConfig, ConversionService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ConversionService::new(ConversionConfig::default());
//!     let docx = service.markdown_to_word("# Hello\n\nWorld").await?;
//!     std::fs::write("hello.docx", &docx.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router and `serve` (axum + tower-http) |
//! | `cli`    | on      | the `mdword` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{markdown_file_to_word, word_file_to_markdown, ConversionService};
pub use converter::{DocumentConverter, PandocConverter};
pub use error::ConvertError;
pub use format::InputFormat;
pub use output::{
    ConversionRequest, ConversionResult, ConversionStats, MarkdownDocument, WordDocument, WordUpload,
};
pub use pipeline::inline::InlineStats;
pub use workspace::Workspace;
