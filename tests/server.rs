//! Router tests for the HTTP layer.
//!
//! The converter is replaced by a fake that writes canned artifacts, so no
//! pandoc or LibreOffice binary is needed.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use mdword::server::router;
use mdword::{ConversionConfig, ConversionService, ConvertError, DocumentConverter, Workspace};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "mdword-test-boundary";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n";

// ── Test helpers ─────────────────────────────────────────────────────────────

struct FakeConverter {
    fail: bool,
}

impl FakeConverter {
    fn failure(workspace: &Workspace) -> ConvertError {
        ConvertError::ExternalToolFailure {
            tool: "pandoc".into(),
            status: Some(64),
            diagnostic: format!("cannot parse {}/input.docx", workspace.path().display()),
        }
    }
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn to_target_format(
        &self,
        _input: &Path,
        output: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError> {
        if self.fail {
            return Err(Self::failure(workspace));
        }
        tokio::fs::write(output, b"PK\x03\x04docx").await.unwrap();
        Ok(())
    }

    async fn normalize_legacy(
        &self,
        input: &Path,
        _workspace: &Workspace,
    ) -> Result<PathBuf, ConvertError> {
        let out = input.with_extension("docx");
        tokio::fs::copy(input, &out).await.unwrap();
        Ok(out)
    }

    async fn extract_media(
        &self,
        _input: &Path,
        output: &Path,
        media_dir: &Path,
        workspace: &Workspace,
    ) -> Result<(), ConvertError> {
        if self.fail {
            return Err(Self::failure(workspace));
        }
        let nested = media_dir.join("media");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(nested.join("image1.png"), PNG_BYTES)
            .await
            .unwrap();
        let md = format!("Caption\n\n![]({}/image1.png)\n", nested.display());
        tokio::fs::write(output, md).await.unwrap();
        Ok(())
    }
}

fn app(root: &TempDir, fail: bool) -> Router {
    app_with_limit(root, fail, mdword::config::DEFAULT_MAX_UPLOAD_BYTES)
}

fn app_with_limit(root: &TempDir, fail: bool, max_upload_bytes: usize) -> Router {
    let config = ConversionConfig::builder()
        .workspace_root(root.path())
        .max_upload_bytes(max_upload_bytes)
        .build()
        .unwrap();
    let service = ConversionService::with_converter(config, Arc::new(FakeConverter { fail }));
    router(Arc::new(service))
}

fn multipart_request(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/word-to-md")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn is_empty(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_version() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn md_to_word_returns_docx_attachment() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(json_request("/md-to-word", r##"{"content": "# Hello\n\nWorld"}"##))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"result.docx\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
    assert!(is_empty(&root));
}

#[tokio::test]
async fn md_to_word_failure_is_500_with_detail() {
    let root = TempDir::new().unwrap();
    let response = app(&root, true)
        .oneshot(json_request("/md-to-word", r#"{"content": "text"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    let detail = json["detail"].as_str().unwrap();
    assert!(detail.contains("pandoc"), "got: {detail}");
    assert!(detail.contains("<workspace>"), "got: {detail}");
    assert!(
        !detail.contains(&root.path().display().to_string()),
        "workspace path leaked: {detail}"
    );
    assert!(is_empty(&root));
}

#[tokio::test]
async fn md_to_word_rejects_malformed_json() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(json_request("/md-to-word", r#"{"text": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn word_to_md_inlines_images() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(multipart_request("file", "report.docx", b"PK\x03\x04"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let content = json["content"].as_str().unwrap();
    assert!(content.contains("Caption"));
    assert_eq!(content.matches("data:image/png;base64,").count(), 1);
    assert!(content.contains("data:image/png;base64,iVBORw0KGgo="));
    assert!(!content.contains("image1.png"));
    assert!(is_empty(&root));
}

#[tokio::test]
async fn word_to_md_accepts_legacy_doc() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(multipart_request("file", "OLD.DOC", b"\xD0\xCF\x11\xE0"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_empty(&root));
}

#[tokio::test]
async fn word_to_md_rejects_unsupported_extension() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(multipart_request("file", "notes.txt", b"plain text"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains(".docx or .doc"));
    assert!(is_empty(&root), "a rejected upload must not write files");
}

#[tokio::test]
async fn word_to_md_without_file_field_is_400() {
    let root = TempDir::new().unwrap();
    let response = app(&root, false)
        .oneshot(multipart_request("document", "report.docx", b"PK"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("'file'"));
}

#[tokio::test]
async fn word_to_md_failure_is_500() {
    let root = TempDir::new().unwrap();
    let response = app(&root, true)
        .oneshot(multipart_request("file", "report.docx", b"PK"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.contains("exit status 64"), "got: {detail}");
    assert!(is_empty(&root));
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let root = TempDir::new().unwrap();
    let response = app_with_limit(&root, false, 1024)
        .oneshot(multipart_request("file", "big.docx", &vec![b'x'; 8 * 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_json(response).await["detail"].is_string());
    assert!(is_empty(&root));
}

#[tokio::test]
async fn oversized_markdown_is_413() {
    let root = TempDir::new().unwrap();
    let content = "a".repeat(8 * 1024);
    let response = app_with_limit(&root, false, 1024)
        .oneshot(json_request(
            "/md-to-word",
            &format!(r#"{{"content": "{content}"}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(is_empty(&root));
}
