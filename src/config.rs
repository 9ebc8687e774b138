//! Configuration for the conversion service.
//!
//! All service behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The only knobs are where the external
//! tools live, how long they may run, where request workspaces are created,
//! and how large an upload may be. Formats are fixed: Markdown in, `.docx`
//! out, and the reverse.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default upload ceiling: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Configuration for Markdown ⇄ Word conversions.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use mdword::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .pandoc_path("/usr/local/bin/pandoc")
///     .tool_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.tool_timeout().unwrap().as_secs(), 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Executable used for both conversion directions. Default: `pandoc` (looked up on `PATH`).
    pub pandoc_path: PathBuf,

    /// Executable used to normalise legacy `.doc` uploads to `.docx`. Default: `libreoffice`.
    pub libreoffice_path: PathBuf,

    /// Upper bound on a single tool invocation in seconds. Default: 120.
    ///
    /// `0` disables the limit; a hung tool then blocks its request forever.
    pub tool_timeout_secs: u64,

    /// Parent directory for request workspaces. Default: the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Largest accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            pandoc_path: PathBuf::from("pandoc"),
            libreoffice_path: PathBuf::from("libreoffice"),
            tool_timeout_secs: 120,
            workspace_root: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The tool timeout as a [`Duration`], or `None` when disabled.
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn libreoffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.libreoffice_path = path.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.pandoc_path.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "pandoc path must not be empty".into(),
            ));
        }
        if c.libreoffice_path.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "libreoffice path must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
