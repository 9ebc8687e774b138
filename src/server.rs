//! HTTP surface over [`ConversionService`].
//!
//! | Route              | Request                              | Success |
//! |--------------------|--------------------------------------|---------|
//! | `GET /health`      |                                      | `{"status": "ok", "version": ...}` |
//! | `POST /md-to-word` | JSON `{"content": "<markdown>"}`     | `.docx` bytes as an attachment |
//! | `POST /word-to-md` | multipart, field `file` (.docx/.doc) | `{"content": "<markdown>"}` |
//!
//! Every failure is `{"detail": "<message>"}`: 400 for request errors, 413
//! for bodies over `max_upload_bytes`, 500 for conversion errors.

use crate::convert::ConversionService;
use crate::error::ConvertError;
use crate::format::InputFormat;
use crate::output::{WordUpload, DOCX_MIME};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the Word upload.
const UPLOAD_FIELD: &str = "file";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversionService>,
}

/// Body of `POST /md-to-word`, and of a successful `POST /word-to-md`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MarkdownBody {
    pub content: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConvertError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Conversion failed: {}", self);
        } else {
            info!("Rejected request: {}", self);
        }
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Build the router. The body limit comes from the service configuration.
pub fn router(service: Arc<ConversionService>) -> Router {
    let body_limit = service.config().max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/md-to-word", post(md_to_word))
        .route("/word-to-md", post(word_to_md))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Serve `router(service)` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, service: Arc<ConversionService>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("mdword listening on http://{}", addr);
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /md-to-word
async fn md_to_word(
    State(state): State<AppState>,
    body: Result<Json<MarkdownBody>, JsonRejection>,
) -> Result<Response, ConvertError> {
    let Json(body) =
        body.map_err(|rejection| body_error(rejection.status(), rejection.body_text()))?;

    let doc = state.service.markdown_to_word(&body.content).await?;
    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"result.docx\"",
            ),
        ],
        doc.bytes,
    )
        .into_response())
}

/// POST /word-to-md
async fn word_to_md(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MarkdownBody>, ConvertError> {
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let upload = read_upload(field).await?;
        let doc = state.service.word_to_markdown(&upload).await?;
        return Ok(Json(MarkdownBody {
            content: doc.content,
        }));
    }
    Err(ConvertError::MissingUpload)
}

/// Check the filename, then read the field body.
async fn read_upload(field: Field<'_>) -> Result<WordUpload, ConvertError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    InputFormat::from_filename(&filename)?;
    let bytes = field.bytes().await.map_err(invalid_upload)?;
    Ok(WordUpload {
        filename,
        bytes: bytes.to_vec(),
    })
}

fn invalid_upload(e: MultipartError) -> ConvertError {
    body_error(e.status(), e.body_text())
}

/// 413 from the body limit stays 413; every other rejection is a 400.
fn body_error(status: StatusCode, reason: String) -> ConvertError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::UploadTooLarge { reason }
    } else {
        ConvertError::InvalidUpload { reason }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
