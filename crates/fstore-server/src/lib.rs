//! HTTP server for the file store.
//!
//! Exposes a [`FileStore`](fstore_store::FileStore) over a small REST API:
//! multipart uploads, downloads, existence probes, listings, and word
//! statistics.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ConfigSource, CorsConfig, HttpConfig, Overrides, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, FINGERPRINT, STORE_HEADER};
pub use router::build_router;
pub use server::{init_tracing, load_tls, shutdown_signal, StoreServer};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use fstore_store::FileStore;
    use fstore_types::{Digest, FileRecord, WordFrequency};
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "fstore-test-boundary";

    fn app() -> Router {
        build_router(AppState::new(Arc::new(FileStore::in_memory())), &ServerConfig::default())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn upload(method: Method, name: &str, payload: &[u8], sha: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(sha) = sha {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"SHA\"\r\n\r\n{sha}\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(method)
            .uri("/store")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    // ---- root ----

    #[tokio::test]
    async fn root_carries_fingerprint() {
        let response = send(&app(), get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[STORE_HEADER], FINGERPRINT);
        assert!(!body_bytes(response).await.is_empty());
    }

    // ---- add / get / remove ----

    #[tokio::test]
    async fn add_then_download() {
        let app = app();
        let response = send(&app, upload(Method::POST, "notes.txt", b"hello store", None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, get("/store?file=notes.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=notes.txt"
        );
        assert_eq!(body_bytes(response).await, b"hello store");
    }

    #[tokio::test]
    async fn add_existing_name_conflicts() {
        let app = app();
        send(&app, upload(Method::POST, "a", b"one", None)).await;
        let response = send(&app, upload(Method::POST, "a", b"two", None)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn add_by_digest_only() {
        let app = app();
        send(&app, upload(Method::POST, "a", b"shared", None)).await;
        let sha = Digest::of(b"shared").to_hex();

        let response = send(&app, upload(Method::POST, "b", b"", Some(&sha))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_bytes(send(&app, get("/store?file=b")).await).await, b"shared");
    }

    #[tokio::test]
    async fn add_by_unknown_digest_is_not_found() {
        let sha = Digest::of(b"nobody has this").to_hex();
        let response = send(&app(), upload(Method::POST, "x", b"", Some(&sha))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_with_malformed_digest_is_bad_request() {
        let response = send(&app(), upload(Method::POST, "x", b"", Some("not-hex"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn add_empty_upload_is_bad_request() {
        let response = send(&app(), upload(Method::POST, "x", b"", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_file_with_its_digest_round_trips() {
        let app = app();
        let sha = Digest::of(b"").to_hex();

        let response = send(&app, upload(Method::POST, "empty.txt", b"", Some(&sha))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = send(&app, get(&format!("/store/check/sha?sha={sha}"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, get("/store?file=empty.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn update_reports_created_then_updated() {
        let app = app();
        let response = send(&app, upload(Method::PUT, "doc", b"v1", None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, upload(Method::PUT, "doc", b"v2", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(send(&app, get("/store?file=doc")).await).await, b"v2");

        let old = Digest::of(b"v1").to_hex();
        let response = send(&app, get(&format!("/store/check/sha?sha={old}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_then_missing() {
        let app = app();
        send(&app, upload(Method::POST, "gone", b"bye", None)).await;

        assert_eq!(send(&app, delete("/store?file=gone")).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&app, delete("/store?file=gone")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(&app, get("/store?file=gone")).await.status(), StatusCode::NOT_FOUND);
    }

    // ---- probes ----

    #[tokio::test]
    async fn check_file_and_sha() {
        let app = app();
        send(&app, upload(Method::POST, "here", b"content", None)).await;
        let sha = Digest::of(b"content").to_hex();

        assert_eq!(send(&app, get("/store/check/file?file=here")).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get("/store/check/file?file=nope")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(&app, get(&format!("/store/check/sha?sha={sha}"))).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get("/store/check/sha?sha=zz")).await.status(), StatusCode::BAD_REQUEST);
    }

    // ---- listing and statistics ----

    #[tokio::test]
    async fn list_plain_and_detailed() {
        let app = app();
        send(&app, upload(Method::POST, "b.txt", b"b c", None)).await;
        send(&app, upload(Method::POST, "a.txt", b"a a b", None)).await;

        let names: Vec<String> =
            serde_json::from_slice(&body_bytes(send(&app, get("/store/list")).await).await).unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let records: Vec<FileRecord> =
            serde_json::from_slice(&body_bytes(send(&app, get("/store/list?details=true")).await).await).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a.txt");
        assert_eq!(records[0].size, 5);
        assert_eq!(records[0].word_count, 3);
    }

    #[tokio::test]
    async fn count_and_frequency() {
        let app = app();
        send(&app, upload(Method::POST, "one", b"a a b", None)).await;
        send(&app, upload(Method::POST, "two", b"b c", None)).await;

        let count = body_bytes(send(&app, get("/store/count")).await).await;
        assert_eq!(count, b"5");

        let top: Vec<WordFrequency> = serde_json::from_slice(
            &body_bytes(send(&app, get("/store/frequency?order=dsc&limit=2")).await).await,
        )
        .unwrap();
        assert_eq!(top, vec![WordFrequency::new("a", 2), WordFrequency::new("b", 2)]);

        let all: Vec<WordFrequency> = serde_json::from_slice(
            &body_bytes(send(&app, get("/store/frequency?order=asc&limit=lots")).await).await,
        )
        .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], WordFrequency::new("c", 1));
    }

    // ---- middleware ----

    #[tokio::test]
    async fn cors_mirrors_origin_with_credentials() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/store/list")
            .header(header::ORIGIN, "http://example.test")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = send(&app(), request).await;
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://example.test");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let mut config = ServerConfig::default();
        config.server.max_upload_mb = 0;
        let app = build_router(AppState::new(Arc::new(FileStore::in_memory())), &config);

        let response = send(&app, upload(Method::POST, "big", b"too much", None)).await;
        assert!(response.status().is_client_error());
    }
}
