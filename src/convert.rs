//! Conversion entry points.
//!
//! [`ConversionService`] sequences one request end to end:
//!
//! ```text
//! Markdown → Word   acquire ─▶ write input.md ─▶ pandoc ─▶ read result.docx ─▶ release
//! Word → Markdown   classify ─▶ acquire ─▶ write input.doc[x] ─▶ [libreoffice]
//!                   ─▶ pandoc --extract-media ─▶ inline media ─▶ release
//! ```
//!
//! The workspace is released after every attempt, whatever its outcome, and
//! the result is returned only after release. Tool diagnostics have the
//! workspace path redacted before they leave this module.

use crate::config::ConversionConfig;
use crate::converter::{DocumentConverter, PandocConverter};
use crate::error::ConvertError;
use crate::format::InputFormat;
use crate::output::{
    ConversionRequest, ConversionResult, ConversionStats, MarkdownDocument, WordDocument, WordUpload,
};
use crate::pipeline::inline;
use crate::workspace::Workspace;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const MARKDOWN_INPUT: &str = "input.md";
const WORD_OUTPUT: &str = "result.docx";
const MARKDOWN_OUTPUT: &str = "output.md";

/// Runs conversions with an injected [`DocumentConverter`].
///
/// Holds only immutable state and is shared across requests behind `Arc`.
#[derive(Clone)]
pub struct ConversionService {
    converter: Arc<dyn DocumentConverter>,
    config: ConversionConfig,
}

impl std::fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionService")
            .field("converter", &"<dyn DocumentConverter>")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionService {
    /// Service backed by the pandoc/LibreOffice binaries named in `config`.
    pub fn new(config: ConversionConfig) -> Self {
        let converter = Arc::new(PandocConverter::new(&config));
        Self { converter, config }
    }

    /// Service backed by a caller-supplied converter.
    pub fn with_converter(config: ConversionConfig, converter: Arc<dyn DocumentConverter>) -> Self {
        Self { converter, config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Dispatch a [`ConversionRequest`] to the matching direction.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult, ConvertError> {
        match request {
            ConversionRequest::Markdown(content) => {
                self.markdown_to_word(&content).await.map(ConversionResult::Word)
            }
            ConversionRequest::Word(upload) => {
                self.word_to_markdown(&upload).await.map(ConversionResult::Markdown)
            }
        }
    }

    /// Render Markdown text as a `.docx` package.
    pub async fn markdown_to_word(&self, markdown: &str) -> Result<WordDocument, ConvertError> {
        let start = Instant::now();
        info!("Starting Markdown → Word conversion ({} bytes)", markdown.len());

        let workspace = self.acquire()?;
        let outcome = self.run_markdown_to_word(&workspace, markdown).await;
        let outcome = outcome.map_err(|e| e.map_diagnostic(|d| workspace.redact(d)));
        workspace.release().await;

        let bytes = outcome?;
        let stats = ConversionStats {
            input_bytes: markdown.len() as u64,
            output_bytes: bytes.len() as u64,
            total_duration_ms: start.elapsed().as_millis() as u64,
            ..ConversionStats::default()
        };
        info!(
            "Markdown → Word complete: {} bytes in {}ms",
            stats.output_bytes, stats.total_duration_ms
        );
        Ok(WordDocument { bytes, stats })
    }

    /// Convert an uploaded `.docx`/`.doc` to Markdown with inlined images.
    ///
    /// The filename is checked before anything touches the filesystem.
    pub async fn word_to_markdown(&self, upload: &WordUpload) -> Result<MarkdownDocument, ConvertError> {
        let format = InputFormat::from_filename(&upload.filename)?;
        let start = Instant::now();
        info!(
            "Starting Word → Markdown conversion of '{}' ({} bytes)",
            upload.filename,
            upload.bytes.len()
        );

        let workspace = self.acquire()?;
        let outcome = self.run_word_to_markdown(&workspace, format, &upload.bytes).await;
        let outcome = outcome.map_err(|e| e.map_diagnostic(|d| workspace.redact(d)));
        workspace.release().await;

        let (content, media) = outcome?;
        let stats = ConversionStats {
            input_bytes: upload.bytes.len() as u64,
            output_bytes: content.len() as u64,
            legacy_normalized: format.is_legacy(),
            media,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Word → Markdown complete: {} image(s), {} reference(s) inlined in {}ms",
            stats.media.images, stats.media.references, stats.total_duration_ms
        );
        Ok(MarkdownDocument { content, stats })
    }

    fn acquire(&self) -> Result<Workspace, ConvertError> {
        Workspace::acquire(self.config.workspace_root.as_deref())
    }

    async fn run_markdown_to_word(
        &self,
        workspace: &Workspace,
        markdown: &str,
    ) -> Result<Vec<u8>, ConvertError> {
        let input = workspace.write(MARKDOWN_INPUT, markdown.as_bytes()).await?;
        let output = workspace.file(WORD_OUTPUT);

        self.converter.to_target_format(&input, &output, workspace).await?;

        read_artifact(&output, "pandoc", "Word document").await
    }

    async fn run_word_to_markdown(
        &self,
        workspace: &Workspace,
        format: InputFormat,
        bytes: &[u8],
    ) -> Result<(String, inline::InlineStats), ConvertError> {
        let mut input = workspace.write(format.workspace_file_name(), bytes).await?;

        if format.is_legacy() {
            debug!("Normalising legacy .{} upload", format.extension());
            input = self.converter.normalize_legacy(&input, workspace).await?;
        }

        let output = workspace.file(MARKDOWN_OUTPUT);
        let media_dir = workspace.media_dir();
        self.converter
            .extract_media(&input, &output, &media_dir, workspace)
            .await?;

        let raw = read_artifact(&output, "pandoc", "Markdown output").await?;
        let markdown = String::from_utf8(raw).map_err(|e| {
            ConvertError::Internal(format!("pandoc produced invalid UTF-8: {}", e.utf8_error()))
        })?;

        inline::inline_media(&markdown, &media_dir).await
    }
}

/// Read a tool's output file; absence means the tool lied about success.
async fn read_artifact(path: &Path, tool: &str, artifact: &str) -> Result<Vec<u8>, ConvertError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConvertError::MissingOutput {
            tool: tool.to_string(),
            artifact: artifact.to_string(),
        }),
        Err(e) => Err(ConvertError::io(format!("read {artifact}"), e)),
    }
}

/// Convert a Markdown file and write the `.docx` to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn markdown_file_to_word(
    service: &ConversionService,
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<ConversionStats, ConvertError> {
    let input_path = input_path.as_ref();
    let markdown = tokio::fs::read_to_string(input_path)
        .await
        .map_err(|e| ConvertError::io(format!("read '{}'", input_path.display()), e))?;
    let doc = service.markdown_to_word(&markdown).await?;
    write_atomic(output_path.as_ref(), &doc.bytes, "docx.tmp").await?;
    Ok(doc.stats)
}

/// Convert a `.docx`/`.doc` file to Markdown.
///
/// Writes to `output_path` atomically when given; the document is returned
/// either way.
pub async fn word_file_to_markdown(
    service: &ConversionService,
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
) -> Result<MarkdownDocument, ConvertError> {
    let input_path = input_path.as_ref();
    let filename = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Reject before reading: a wrong extension never costs a full read.
    InputFormat::from_filename(&filename)?;

    let bytes = tokio::fs::read(input_path)
        .await
        .map_err(|e| ConvertError::io(format!("read '{}'", input_path.display()), e))?;
    let doc = service
        .word_to_markdown(&WordUpload { filename, bytes })
        .await?;

    if let Some(path) = output_path {
        write_atomic(path, doc.content.as_bytes(), "md.tmp").await?;
    }
    Ok(doc)
}

async fn write_atomic(path: &Path, bytes: &[u8], tmp_ext: &str) -> Result<(), ConvertError> {
    let fail = |e| ConvertError::io(format!("write output file '{}'", path.display()), e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp_path = path.with_extension(tmp_ext);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}
