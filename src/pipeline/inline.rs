//! Image inlining: replace extracted-media references with `data:` URIs.
//!
//! `pandoc --extract-media=media` writes every embedded image of a Word
//! document under the workspace's `media/` and references it from the
//! Markdown by path, e.g. `![](media/media/image1.png)`. The workspace holding those
//! files is deleted when the request ends, so each reference is rewritten to
//! a self-contained `data:image/<ext>;base64,<payload>` URI before the text
//! is returned.
//!
//! ## Matching
//!
//! A reference is a parenthesised target, `(...)` or `(<...>)`. An asset matches a
//! reference when the target *is* the asset's path relative to the media
//! directory, or ends with a path separator followed by it. The path is
//! inserted with [`regex::escape`], so names such as `img (1).png` match
//! literally, and the separator boundary keeps `a.png` from matching
//! `aa.png`.
//!
//! Assets are applied deepest path first and targets that are already
//! `data:` URIs are skipped, so `x.png` at the media root never captures a
//! reference to `sub/x.png`. When no reference carries an asset's relative
//! path, its bare file name is tried instead.

use crate::error::ConvertError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Number of media files read concurrently.
const READ_CONCURRENCY: usize = 8;

/// An image file found under the media directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    /// Path relative to the media directory, `/`-separated.
    pub relative_path: String,
    /// Final path component.
    pub file_name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl MediaAsset {
    /// Lower-cased extension used as the image MIME subtype; empty if none.
    pub fn subtype(&self) -> String {
        image_subtype(&self.file_name)
    }

    /// `data:image/<subtype>;base64,<payload>` for this asset.
    pub fn data_uri(&self) -> String {
        data_uri(&self.file_name, &self.bytes)
    }

    fn depth(&self) -> usize {
        self.relative_path.matches('/').count()
    }
}

/// Counters describing one inlining pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InlineStats {
    /// Media files found.
    pub images: usize,
    /// References rewritten across all files.
    pub references: usize,
    /// Raw bytes embedded (before base64).
    pub bytes: u64,
}

/// Image subtype for `file_name`: the extension, lower-cased.
///
/// Files without an extension yield an empty subtype, passed through as-is.
pub fn image_subtype(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Build `data:image/<subtype>;base64,<payload>` with padded, unwrapped base64.
pub fn data_uri(file_name: &str, bytes: &[u8]) -> String {
    format!(
        "data:image/{};base64,{}",
        image_subtype(file_name),
        STANDARD.encode(bytes)
    )
}

/// Inline every asset under `media_dir` into `markdown`.
///
/// A missing media directory is not an error: documents without images
/// produce none, and the text is returned unchanged.
pub async fn inline_media(
    markdown: &str,
    media_dir: &Path,
) -> Result<(String, InlineStats), ConvertError> {
    let assets = collect_media(media_dir).await?;
    if assets.is_empty() {
        return Ok((markdown.to_string(), InlineStats::default()));
    }
    Ok(inline_assets(markdown, &assets))
}

/// Read every regular file under `media_dir`, recursively.
///
/// Returns an empty list when the directory does not exist. The result is
/// sorted by relative path.
pub async fn collect_media(media_dir: &Path) -> Result<Vec<MediaAsset>, ConvertError> {
    if !tokio::fs::try_exists(media_dir)
        .await
        .map_err(|e| ConvertError::io("inspect media directory", e))?
    {
        debug!("No media directory; nothing to inline");
        return Ok(Vec::new());
    }

    let files = walk_files(media_dir).await?;

    let mut assets: Vec<MediaAsset> = stream::iter(files.into_iter().map(|path| async move {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ConvertError::io("read extracted media", e))?;
        Ok::<_, ConvertError>(MediaAsset {
            relative_path: relative_slash_path(media_dir, &path),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bytes,
        })
    }))
    .buffer_unordered(READ_CONCURRENCY)
    .try_collect()
    .await?;

    assets.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!("Collected {} media files", assets.len());
    Ok(assets)
}

/// Depth-first listing of regular files. Symlinks are not followed.
async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ConvertError::io("list media directory", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConvertError::io("list media directory", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ConvertError::io("inspect extracted media", e))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Rewrite references to `assets` in `markdown`. Pure; no I/O.
pub fn inline_assets(markdown: &str, assets: &[MediaAsset]) -> (String, InlineStats) {
    let mut ordered: Vec<&MediaAsset> = assets.iter().collect();
    ordered.sort_by(|a, b| {
        b.depth()
            .cmp(&a.depth())
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });

    let mut text = markdown.to_string();
    let mut stats = InlineStats {
        images: assets.len(),
        ..InlineStats::default()
    };

    for asset in ordered {
        let replacement = format!("({})", asset.data_uri());

        // Relative path first; the bare name only if nothing referenced the path.
        let mut keys = vec![asset.relative_path.as_str()];
        if asset.file_name != asset.relative_path {
            keys.push(asset.file_name.as_str());
        }

        for key in keys {
            let (rewritten, hits) = replace_references(&text, key, &replacement);
            if hits == 0 {
                continue;
            }
            debug!("{}: {} reference(s) inlined via '{}'", asset.relative_path, hits, key);
            text = rewritten;
            stats.references += hits;
            stats.bytes += asset.bytes.len() as u64;
            break;
        }
    }

    (text, stats)
}

fn replace_references(text: &str, key: &str, replacement: &str) -> (String, usize) {
    let mut hits = 0usize;
    let rewritten = reference_pattern(key).replace_all(text, |caps: &Captures<'_>| {
        let target = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        if target.starts_with("data:") {
            caps[0].to_string()
        } else {
            hits += 1;
            replacement.to_string()
        }
    });
    (rewritten.into_owned(), hits)
}

/// `(` + optional prefix ending in a separator + the literal path + `)`.
///
/// Two target shapes are accepted: `(<...>)`, which pandoc writes when the
/// target contains spaces, and a bare target whose prefix may hold balanced
/// `(...)` groups.
fn reference_pattern(relative_path: &str) -> Regex {
    let key = regex::escape(relative_path);
    let pattern = format!(
        r"\(<((?:[^<>\n]*[/\\])?{key})>\)|\(((?:(?:[^()]|\([^()]*\))*[/\\])?{key})\)"
    );
    Regex::new(&pattern).expect("escaped literal inside a fixed frame always compiles")
}
