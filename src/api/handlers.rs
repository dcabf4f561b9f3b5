//! HTTP request handlers
//!
//! Each handler validates its input, delegates to the library layer and
//! maps failures through [`ApiError`].

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use super::error::ApiError;
use super::ApiState;
use crate::acquire::{AcquireRequest, DEFAULT_QUALITY};
use crate::adapters::SearchResult;
use crate::error::LibraryError;
use crate::library::{ItemId, LibraryItem, MediaFormat};

const DEFAULT_MAX_RESULTS: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LocatorRequest {
    #[serde(default, alias = "url")]
    locator: Option<String>,
}

impl LocatorRequest {
    fn locator(&self) -> Result<&str, ApiError> {
        self.locator
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing locator"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    stream_url: String,
    title: String,
    thumbnail: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    id: Option<String>,
    title: String,
    thumbnail: Option<String>,
    stream_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcquireBody {
    #[serde(default, alias = "url")]
    locator: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default, alias = "video_id")]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireResponse {
    success: bool,
    download_url: String,
    item: LibraryItem,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, alias = "max_results")]
    max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    blob_store_ready: bool,
    record_store_ready: bool,
    resolver_ready: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /resolve - direct stream url for a locator
pub async fn resolve(
    State(state): State<ApiState>,
    payload: Result<Json<LocatorRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let Json(body) = payload?;
    let locator = body.locator()?;
    info!("Resolving stream for: {}", locator);

    let source = state
        .resolver
        .resolve(locator)
        .await
        .map_err(|e| LibraryError::Resolution(format!("{:#}", e)))?;

    let stream_url = source
        .direct_stream_url()
        .ok_or_else(|| LibraryError::NotFound("No stream URL found".to_string()))?
        .to_string();

    Ok(Json(ResolveResponse {
        stream_url,
        title: source.title.unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: source.thumbnail,
    }))
}

/// POST /info - descriptive metadata plus a playable stream url
pub async fn info(
    State(state): State<ApiState>,
    payload: Result<Json<LocatorRequest>, JsonRejection>,
) -> Result<Json<InfoResponse>, ApiError> {
    let Json(body) = payload?;
    let locator = body.locator()?;
    info!("Fetching source info for: {}", locator);

    let source = state
        .resolver
        .resolve(locator)
        .await
        .map_err(|e| LibraryError::Resolution(format!("{:#}", e)))?;

    let stream_url = source.playable_stream_url().map(str::to_string);

    Ok(Json(InfoResponse {
        id: source.id,
        title: source
            .title
            .unwrap_or_else(|| crate::library::UNKNOWN_TITLE.to_string()),
        thumbnail: source.thumbnail,
        stream_url,
        duration: source.duration,
        uploader: source.uploader,
    }))
}

/// POST /acquire - download a locator into the library
pub async fn acquire(
    State(state): State<ApiState>,
    payload: Result<Json<AcquireBody>, JsonRejection>,
) -> Result<Json<AcquireResponse>, ApiError> {
    let Json(body) = payload?;
    let locator = body
        .locator
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing locator"))?;

    let format = match body.format.as_deref() {
        Some(format) => format.parse::<MediaFormat>()?,
        None => MediaFormat::default(),
    };

    let mut request = AcquireRequest::new(locator)
        .with_format(format)
        .with_quality(body.quality.unwrap_or_else(|| DEFAULT_QUALITY.to_string()));
    if let Some(id) = body.id.as_deref() {
        request = request.with_id(ItemId::parse(id)?);
    }

    // Own task: a client disconnect must not cancel a running acquisition
    let acquirer = state.acquirer.clone();
    let item = tokio::spawn(async move { acquirer.acquire(request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Acquisition worker failed: {}", e)))??;

    Ok(Json(AcquireResponse {
        success: true,
        download_url: format!("/stream/{}", item.filename),
        item,
    }))
}

/// GET /items - reconciled catalog
pub async fn list_items(State(state): State<ApiState>) -> Result<Json<Vec<LibraryItem>>, ApiError> {
    Ok(Json(state.library.list().await?))
}

/// GET /items/:id
pub async fn get_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<LibraryItem>, ApiError> {
    let id = ItemId::parse(&id).map_err(|_| not_found(&id))?;
    Ok(Json(state.library.get(&id).await?))
}

/// DELETE /items/:id
pub async fn delete_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    // Ids that cannot be valid cannot exist either
    let id = ItemId::parse(&id).map_err(|_| not_found(&id))?;
    state.library.delete(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /stream/:filename - media bytes, range capable
pub async fn stream(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let media = state.playback.stream(&filename, range).await?;
    let body_length = media.body_length();

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, media.content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, body_length);

    builder = match media.range {
        Some(range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, range.content_range(media.total_length)),
        None => builder.status(StatusCode::OK),
    };

    // The file handle lives in the body stream and closes when it is dropped
    let body = Body::from_stream(ReaderStream::new(media.file.take(body_length)));

    builder.body(body).map_err(|e| {
        error!("Failed to build stream response for {}: {}", filename, e);
        ApiError::Internal(format!("Failed to build response: {}", e))
    })
}

/// POST /search - delegate to the external search capability
pub async fn search(
    State(state): State<ApiState>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = payload?;
    let query = body
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing query"))?;
    let max_results = body.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1);

    info!("Searching for: {}", query);
    let results = state
        .searcher
        .search(query, max_results)
        .await
        .map_err(|e| LibraryError::Resolution(format!("{:#}", e)))?;
    info!("Found {} results for: {}", results.len(), query);

    Ok(Json(SearchResponse { results }))
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        blob_store_ready: state.library.blobs().is_ready(),
        record_store_ready: state.library.records().is_ready(),
        resolver_ready: state.resolver.health_check().await.is_ok(),
    })
}

fn not_found(id: &str) -> ApiError {
    LibraryError::NotFound(format!("Item not found: {}", id)).into()
}
