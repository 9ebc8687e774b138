//! The external converter capability.
//!
//! [`DocumentConverter`] is the seam between orchestration and the actual
//! format work. Production code uses [`PandocConverter`], which shells out to
//! pandoc (and LibreOffice for legacy `.doc` files); tests substitute fakes
//! that write canned artifacts into the workspace.
//!
//! ## Command lines
//!
//! ```text
//! Markdown → Word   pandoc <in.md>   -f markdown -t docx     -o <out.docx>
//! Word → Markdown   pandoc <in.docx> -f docx     -t markdown -o <out.md> --extract-media=media
//! .doc → .docx      libreoffice --headless -env:UserInstallation=file://<ws>/lo-profile
//!                               --convert-to docx <in.doc> --outdir <dir>
//! ```
//!
//! Tools run with the workspace as their working directory. The media
//! directory is passed relative to it, so image references in pandoc's
//! Markdown never contain the workspace root (which may hold spaces or
//! parentheses).

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::pipeline::invoke::{run_tool, ToolCommand};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PANDOC: &str = "pandoc";
const LIBREOFFICE: &str = "libreoffice";
const LO_PROFILE_DIR: &str = "lo-profile";
const LO_OUT_DIR: &str = "normalized";

/// Performs document format transformations inside a request workspace.
///
/// Implementations must only write inside `workspace`.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the Markdown file at `input` to a `.docx` package at `output`.
    async fn to_target_format(
        &self,
        input: &Path,
        output: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError>;

    /// Convert a legacy `.doc` file to `.docx`, returning the new file's path.
    async fn normalize_legacy(
        &self,
        input: &Path,
        workspace: &Workspace,
    ) -> Result<PathBuf, ConvertError>;

    /// Convert the `.docx` file at `input` to Markdown at `output`, writing
    /// embedded media under `media_dir` instead of inlining it.
    async fn extract_media(
        &self,
        input: &Path,
        output: &Path,
        media_dir: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError>;
}

/// [`DocumentConverter`] backed by the pandoc and LibreOffice binaries.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    pandoc: PathBuf,
    libreoffice: PathBuf,
    timeout: Option<Duration>,
}

impl PandocConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            pandoc: config.pandoc_path.clone(),
            libreoffice: config.libreoffice_path.clone(),
            timeout: config.tool_timeout(),
        }
    }

    fn markdown_to_docx_command(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(PANDOC, &self.pandoc)
            .arg(input)
            .arg("-f")
            .arg("markdown")
            .arg("-t")
            .arg("docx")
            .arg("-o")
            .arg(output)
    }

    fn docx_to_markdown_command(&self, input: &Path, output: &Path, media_dir: &Path) -> ToolCommand {
        let mut extract = OsString::from("--extract-media=");
        extract.push(media_dir);
        ToolCommand::new(PANDOC, &self.pandoc)
            .arg(input)
            .arg("-f")
            .arg("docx")
            .arg("-t")
            .arg("markdown")
            .arg("-o")
            .arg(output)
            .arg(extract)
    }

    fn legacy_command(&self, input: &Path, out_dir: &Path, profile_dir: &Path) -> ToolCommand {
        let mut profile = OsString::from("-env:UserInstallation=file://");
        profile.push(profile_dir);
        ToolCommand::new(LIBREOFFICE, &self.libreoffice)
            .arg("--headless")
            .arg(profile)
            .arg("--convert-to")
            .arg("docx")
            .arg(input)
            .arg("--outdir")
            .arg(out_dir)
    }
}

#[async_trait]
impl DocumentConverter for PandocConverter {
    async fn to_target_format(
        &self,
        input: &Path,
        output: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError> {
        let cmd = self.markdown_to_docx_command(input, output);
        run_tool(&cmd, workspace.path(), self.timeout).await?;
        Ok(())
    }

    async fn normalize_legacy(
        &self,
        input: &Path,
        workspace: &Workspace,
    ) -> Result<PathBuf, ConvertError> {
        let out_dir = workspace.file(LO_OUT_DIR);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| ConvertError::io("create normalisation directory", e))?;

        let cmd = self.legacy_command(input, &out_dir, &workspace.file(LO_PROFILE_DIR));
        run_tool(&cmd, workspace.path(), self.timeout).await?;

        // LibreOffice keeps the stem and swaps the extension.
        let stem = input.file_stem().unwrap_or_default();
        let produced = out_dir.join(stem).with_extension("docx");
        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            return Err(ConvertError::MissingOutput {
                tool: LIBREOFFICE.to_string(),
                artifact: ".docx file".to_string(),
            });
        }
        Ok(produced)
    }

    async fn extract_media(
        &self,
        input: &Path,
        output: &Path,
        media_dir: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError> {
        let media_arg = workspace_relative(media_dir, workspace.path());
        let cmd = self.docx_to_markdown_command(input, output, media_arg);
        run_tool(&cmd, workspace.path(), self.timeout).await?;
        Ok(())
    }
}

/// `path` relative to the workspace root, or unchanged if it lies outside.
fn workspace_relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> PandocConverter {
        PandocConverter::new(
            &ConversionConfig::builder()
                .pandoc_path("/opt/pandoc/bin/pandoc")
                .libreoffice_path("soffice")
                .tool_timeout_secs(5)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_markdown_to_docx_command_line() {
        let cmd = converter().markdown_to_docx_command(Path::new("/ws/input.md"), Path::new("/ws/result.docx"));
        assert_eq!(cmd.program, PathBuf::from("/opt/pandoc/bin/pandoc"));
        assert_eq!(
            cmd.args_lossy(),
            vec!["/ws/input.md", "-f", "markdown", "-t", "docx", "-o", "/ws/result.docx"]
        );
    }

    #[test]
    fn test_docx_to_markdown_command_line() {
        let cmd = converter().docx_to_markdown_command(
            Path::new("/ws/input.docx"),
            Path::new("/ws/output.md"),
            Path::new("media"),
        );
        assert_eq!(
            cmd.args_lossy(),
            vec![
                "/ws/input.docx",
                "-f",
                "docx",
                "-t",
                "markdown",
                "-o",
                "/ws/output.md",
                "--extract-media=media"
            ]
        );
    }

    #[test]
    fn test_legacy_command_line() {
        let cmd = converter().legacy_command(
            Path::new("/ws/input.doc"),
            Path::new("/ws/normalized"),
            Path::new("/ws/lo-profile"),
        );
        assert_eq!(cmd.tool, "libreoffice");
        assert_eq!(cmd.program, PathBuf::from("soffice"));
        assert_eq!(
            cmd.args_lossy(),
            vec![
                "--headless",
                "-env:UserInstallation=file:///ws/lo-profile",
                "--convert-to",
                "docx",
                "/ws/input.doc",
                "--outdir",
                "/ws/normalized"
            ]
        );
    }

    #[test]
    fn test_media_dir_is_passed_relative_to_workspace() {
        let root = Path::new("/srv/my data (1)/mdword-ab");
        assert_eq!(
            workspace_relative(&root.join("media"), root),
            Path::new("media")
        );
        assert_eq!(
            workspace_relative(Path::new("/elsewhere/media"), root),
            Path::new("/elsewhere/media")
        );
        assert_eq!(workspace_relative(root, root), root);
    }

    #[test]
    fn test_timeout_taken_from_config() {
        assert_eq!(converter().timeout, Some(Duration::from_secs(5)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_legacy_without_output_is_missing_output() {
        // `true` accepts any arguments and writes nothing.
        let config = ConversionConfig::builder()
            .libreoffice_path("true")
            .build()
            .unwrap();
        let ws = Workspace::acquire(None).unwrap();
        let input = ws.write("input.doc", b"\xD0\xCF\x11\xE0").await.unwrap();

        let err = PandocConverter::new(&config)
            .normalize_legacy(&input, &ws)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput { .. }), "got {err:?}");
    }
}
