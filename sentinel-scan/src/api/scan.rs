//! Scan session API handlers
//!
//! POST /api/scan, GET /api/session, GET /api/session/image,
//! POST /api/session/reset

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::{
    error::{ApiError, ApiResult},
    models::{is_image_content_type, ImageData, SessionSnapshot},
    services::AnalysisError,
    AppState,
};

/// Upper bound on a single upload (inline request data limit of the service)
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Longest a client may take to deliver the upload body
pub const UPLOAD_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Reasons an upload body could not be captured
#[derive(Debug, Error)]
enum UploadError {
    #[error("image exceeds {0} bytes")]
    TooLarge(usize),

    #[error("upload not received within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Read(String),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge(_) => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::TimedOut(_) => ApiError::RequestTimeout(err.to_string()),
            UploadError::Read(msg) => ApiError::BadRequest(msg),
        }
    }
}

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scan", post(start_scan))
        .route("/api/session", get(get_session))
        .route("/api/session/image", get(get_session_image))
        .route("/api/session/reset", post(reset_session))
}

/// POST /api/scan
///
/// Body is the raw image with an `image/*` content type. Returns 202 with the
/// ANALYZING snapshot; the outcome arrives over SSE or by polling the session.
pub async fn start_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !is_image_content_type(&content_type) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Expected an image/* upload, got '{}'",
            content_type
        )));
    }

    // 409 while another scan is underway or a result is still displayed.
    // Dropping `capture` before it is consumed moves the session to ERROR.
    let capture = state.controller.begin_capture().await?;

    let bytes = match read_upload(body).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let message = AnalysisError::Encoding(err.to_string()).to_string();
            capture.fail(&message).await?;
            return Err(err.into());
        }
    };

    let image = match ImageData::new(bytes, Some(&content_type)) {
        Ok(image) => image,
        Err(err) => {
            let message = AnalysisError::from(err).to_string();
            capture.fail(&message).await?;
            return Err(ApiError::BadRequest(message));
        }
    };

    let (snapshot, pending) = capture.submit(image).await?;

    let controller = state.controller.clone();
    tokio::spawn(async move {
        let settled = controller.run(pending).await;
        tracing::info!(phase = %settled.phase, "Background analysis task finished");
    });

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

/// GET /api/session/image
///
/// The held image bytes, for display next to the result.
pub async fn get_session_image(State(state): State<AppState>) -> ApiResult<Response> {
    let image = state
        .controller
        .image()
        .await
        .ok_or_else(|| ApiError::NotFound("No image held by session".to_string()))?;

    Ok((
        [(CONTENT_TYPE, image.media_type().to_string())],
        image.bytes().to_vec(),
    )
        .into_response())
}

/// POST /api/session/reset
pub async fn reset_session(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.controller.reset().await?))
}

async fn read_upload(body: Body) -> Result<Vec<u8>, UploadError> {
    tokio::time::timeout(UPLOAD_READ_TIMEOUT, collect_upload(body))
        .await
        .map_err(|_| UploadError::TimedOut(UPLOAD_READ_TIMEOUT))?
}

async fn collect_upload(body: Body) -> Result<Vec<u8>, UploadError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UploadError::Read(e.to_string()))?;
        if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge(MAX_UPLOAD_BYTES));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}
