//! HTTP API Integration Tests
//!
//! Exercises the router end to end with in-process fakes standing in for
//! yt-dlp.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::fs;
use tower::util::ServiceExt; // for `oneshot`

use mediastash::adapters::{
    Encoder, FetchOutput, FetchRequest, Resolver, SearchResult, Searcher, SourceInfo,
};
use mediastash::library::{BlobStore, Library, RecordStore};
use mediastash::playback::PlaybackServer;
use mediastash::{build_router, Acquirer, ApiState};

const BLOB: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

struct FakeSource;

#[async_trait]
impl Resolver for FakeSource {
    async fn resolve(&self, locator: &str) -> anyhow::Result<SourceInfo> {
        match locator {
            "src://ok" => Ok(SourceInfo {
                title: Some("Fake".to_string()),
                url: Some("https://cdn.example/fake.mp4".to_string()),
                ..Default::default()
            }),
            "src://nostream" => Ok(SourceInfo::default()),
            _ => bail!("unsupported locator"),
        }
    }
}

#[async_trait]
impl Encoder for FakeSource {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchOutput> {
        if request.locator == "src://broken" {
            bail!("download failed");
        }
        fs::write(request.target_path(), BLOB).await?;
        Ok(FetchOutput {
            title: Some("Fetched".to_string()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Searcher for FakeSource {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchResult>> {
        Ok((0..max_results.min(3))
            .map(|i| SearchResult {
                id: Some(format!("r{}", i)),
                title: format!("{} #{}", query, i),
                thumbnail: None,
                url: format!("https://example.com/watch?v=r{}", i),
                duration: None,
                uploader: None,
            })
            .collect())
    }
}

async fn setup() -> (TempDir, Library, Router) {
    let temp = TempDir::new().unwrap();
    let library = Library::new(
        RecordStore::new(temp.path().join("metadata")),
        BlobStore::new(temp.path().join("downloads")),
    );
    fs::create_dir_all(library.records().root()).await.unwrap();
    fs::create_dir_all(library.blobs().root()).await.unwrap();

    let fake = Arc::new(FakeSource);
    let state = ApiState {
        acquirer: Acquirer::new(&library, fake.clone()),
        playback: PlaybackServer::new(library.blobs().clone()),
        resolver: fake.clone(),
        searcher: fake,
        library: library.clone(),
    };

    (temp, library, build_router(state))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

/// Acquire `src://ok` and return the stored filename
async fn acquire(app: &Router, format: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/acquire",
            json!({ "locator": "src://ok", "format": format }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    body["item"]["filename"].as_str().unwrap().to_string()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_store_readiness() {
    let (_temp, _library, app) = setup().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["blobStoreReady"], true);
    assert_eq!(body["recordStoreReady"], true);
    assert_eq!(body["resolverReady"], true);
}

// =============================================================================
// Resolve / Search
// =============================================================================

#[tokio::test]
async fn test_resolve_status_codes() {
    let (_temp, _library, app) = setup().await;

    let ok = app
        .clone()
        .oneshot(post_json("/resolve", json!({ "locator": "src://ok" })))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body = extract_json(ok.into_body()).await;
    assert_eq!(body["streamUrl"], "https://cdn.example/fake.mp4");
    assert_eq!(body["title"], "Fake");

    let missing = app
        .clone()
        .oneshot(post_json("/resolve", json!({})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert!(extract_json(missing.into_body()).await["error"].is_string());

    let no_stream = app
        .clone()
        .oneshot(post_json("/resolve", json!({ "locator": "src://nostream" })))
        .await
        .unwrap();
    assert_eq!(no_stream.status(), StatusCode::NOT_FOUND);

    let failed = app
        .oneshot(post_json("/resolve", json!({ "url": "src://unknown" })))
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_search_defaults_and_limits() {
    let (_temp, _library, app) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json("/search", json!({ "query": "lofi", "maxResults": 2 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["title"], "lofi #0");

    let missing = app
        .oneshot(post_json("/search", json!({ "query": "  " })))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unusable_bodies_are_json_bad_requests() {
    let (_temp, library, app) = setup().await;

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/acquire")
        .body(Body::from(json!({ "locator": "src://ok" }).to_string()))
        .unwrap();
    let not_json = Request::builder()
        .method("POST")
        .uri("/acquire")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let mistyped = post_json("/search", json!({ "query": "lofi", "maxResults": "5" }));
    let mistyped_locator = post_json("/resolve", json!({ "locator": 7 }));

    for request in [no_content_type, not_json, mistyped, mistyped_locator] {
        let uri = request.uri().to_string();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body = extract_json(response.into_body()).await;
        assert!(body["error"].is_string(), "{}", uri);
    }

    assert!(library.list().await.unwrap().is_empty());
}

// =============================================================================
// Acquire / Items
// =============================================================================

#[tokio::test]
async fn test_acquire_then_list_and_delete() {
    let (_temp, library, app) = setup().await;

    let filename = acquire(&app, "mp3").await;
    assert!(filename.ends_with(".mp3"));
    assert!(library.blobs().exists(&filename).await);

    let response = app.clone().oneshot(get("/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let items = extract_json(response.into_body()).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["format"], "mp3");
    assert_eq!(items[0]["title"], "Fetched");

    let id = items[0]["id"].as_str().unwrap().to_string();
    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/items/{}", id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["success"], true);

    assert!(!library.blobs().exists(&filename).await);
    let response = app.oneshot(get(&format!("/items/{}", id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_acquire_rejects_bad_input() {
    let (_temp, library, app) = setup().await;

    for body in [
        json!({}),
        json!({ "locator": "src://ok", "format": "flac" }),
        json!({ "locator": "src://ok", "id": "../escape" }),
    ] {
        let response = app.clone().oneshot(post_json("/acquire", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(post_json("/acquire", json!({ "locator": "src://broken" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    assert!(library.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_item_is_not_found() {
    let (_temp, _library, app) = setup().await;

    for uri in ["/items/nope", "/items/not..valid"] {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_stream_full_blob() {
    let (_temp, _library, app) = setup().await;
    let filename = acquire(&app, "mp4").await;

    let response = app
        .oneshot(get(&format!("/stream/{}", filename)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        BLOB.len().to_string().as_str()
    );
    assert_eq!(extract_bytes(response.into_body()).await, BLOB);
}

#[tokio::test]
async fn test_range_responses_concatenate_to_blob() {
    let (_temp, _library, app) = setup().await;
    let filename = acquire(&app, "webm").await;
    let uri = format!("/stream/{}", filename);

    let total = BLOB.len();
    let chunk = 10;
    let mut assembled = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk - 1).min(total - 1);
        let response = app
            .clone()
            .oneshot(get_range(&uri, &format!("bytes={}-{}", start, end)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            format!("bytes {}-{}/{}", start, end, total).as_str()
        );

        let bytes = extract_bytes(response.into_body()).await;
        assert_eq!(bytes, &BLOB[start..=end]);
        assembled.extend_from_slice(&bytes);
        start = end + 1;
    }

    assert_eq!(assembled, BLOB);
}

#[tokio::test]
async fn test_stream_suffix_and_unsatisfiable_ranges() {
    let (_temp, _library, app) = setup().await;
    let filename = acquire(&app, "mp4").await;
    let uri = format!("/stream/{}", filename);

    let suffix = app.clone().oneshot(get_range(&uri, "bytes=-4")).await.unwrap();
    assert_eq!(suffix.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(extract_bytes(suffix.into_body()).await, b"wxyz");

    let beyond = app
        .clone()
        .oneshot(get_range(&uri, "bytes=1000-"))
        .await
        .unwrap();
    assert_eq!(beyond.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        beyond.headers()[header::CONTENT_RANGE],
        format!("bytes */{}", BLOB.len()).as_str()
    );

    // Multiple ranges fall back to the whole blob
    let multi = app.oneshot(get_range(&uri, "bytes=0-1,5-6")).await.unwrap();
    assert_eq!(multi.status(), StatusCode::OK);
    assert_eq!(extract_bytes(multi.into_body()).await, BLOB);
}

#[tokio::test]
async fn test_stream_missing_blob_is_not_found() {
    let (_temp, _library, app) = setup().await;

    for uri in ["/stream/nothing.mp4", "/stream/.staging", "/stream/..%2Fsecret"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}
