//! Error types for the mdword library.
//!
//! Every failure of a conversion request is a [`ConvertError`]. The variants
//! fall into two groups:
//!
//! * **Client errors**: the request itself is unacceptable (wrong file
//!   extension, missing upload, unreadable body). These are detected before any workspace is
//!   created, so they have no filesystem side effects.
//!
//! * **Server errors**: the external converter failed, timed out, could not
//!   be started, or exited cleanly without producing its artifact.
//!
//! [`ConvertError::is_client_error`] is the only classification the HTTP
//! layer needs. Messages are user-facing: they carry the tool's diagnostic
//! text but never a workspace path (see [`crate::workspace::Workspace::redact`]).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mdword library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The uploaded file is not a `.docx` or `.doc` document.
    #[error("Only .docx or .doc files are supported (got '{filename}')")]
    UnsupportedInputFormat { filename: String },

    /// The multipart request carried no `file` field.
    #[error("No file provided; upload the document in the 'file' field")]
    MissingUpload,

    /// The request body could not be read (truncated, over the size limit,
    /// bad multipart, malformed JSON).
    #[error("Failed to read request body: {reason}")]
    InvalidUpload { reason: String },

    /// The request body exceeded the configured upload limit.
    #[error("Request body too large: {reason}")]
    UploadTooLarge { reason: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// The tool ran and exited with a non-zero status.
    #[error("{tool} conversion failed ({}): {diagnostic}", exit_label(.status))]
    ExternalToolFailure {
        tool: String,
        status: Option<i32>,
        diagnostic: String,
    },

    /// The tool did not finish within the configured timeout and was killed.
    #[error("{tool} did not finish within {limit_ms}ms and was stopped")]
    ToolTimeout { tool: String, limit_ms: u64 },

    /// The tool binary could not be started.
    #[error("Could not start {tool} ('{}'): {source}", .program.display())]
    ToolUnavailable {
        tool: String,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited successfully but the expected artifact is absent.
    #[error("{tool} finished but produced no {artifact}")]
    MissingOutput { tool: String, artifact: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The request workspace could not be created.
    #[error("Failed to prepare conversion workspace: {source}")]
    Workspace {
        #[source]
        source: std::io::Error,
    },

    /// A read or write inside the workspace failed.
    #[error("Failed to {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl ConvertError {
    /// `true` when the request was at fault rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::UnsupportedInputFormat { .. }
                | ConvertError::MissingUpload
                | ConvertError::InvalidUpload { .. }
                | ConvertError::UploadTooLarge { .. }
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConvertError::Io {
            context: context.into(),
            source,
        }
    }

    /// Rewrite tool diagnostics through `redact`, leaving other variants as-is.
    pub(crate) fn map_diagnostic(self, redact: impl Fn(&str) -> String) -> Self {
        match self {
            ConvertError::ExternalToolFailure {
                tool,
                status,
                diagnostic,
            } => ConvertError::ExternalToolFailure {
                tool,
                status,
                diagnostic: redact(&diagnostic),
            },
            other => other,
        }
    }
}
