//! Request and result types.

use crate::pipeline::inline::InlineStats;
use serde::{Deserialize, Serialize};

/// MIME type of a Word package.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// An uploaded Word document.
#[derive(Debug, Clone)]
pub struct WordUpload {
    /// Filename as supplied by the client; only its extension is used.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One conversion request, in either direction.
#[derive(Debug, Clone)]
pub enum ConversionRequest {
    /// Markdown text to render as `.docx`.
    Markdown(String),
    /// A `.docx`/`.doc` upload to turn into Markdown.
    Word(WordUpload),
}

/// Outcome of a conversion, in the direction the request asked for.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    Word(WordDocument),
    Markdown(MarkdownDocument),
}

/// A rendered `.docx` package.
#[derive(Debug, Clone)]
pub struct WordDocument {
    pub bytes: Vec<u8>,
    pub stats: ConversionStats,
}

/// Markdown with every extracted image inlined as a `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownDocument {
    pub content: String,
    pub stats: ConversionStats,
}

/// Statistics for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Size of the request payload.
    pub input_bytes: u64,
    /// Size of the returned document or text.
    pub output_bytes: u64,
    /// `true` if a `.doc` upload went through LibreOffice first.
    pub legacy_normalized: bool,
    /// Media inlining counters (zero for Markdown → Word).
    pub media: InlineStats,
    /// Wall-clock time of the whole request, workspace setup to cleanup.
    pub total_duration_ms: u64,
}
