//! Router assembly.
//!
//! Layers (outermost → innermost):
//! 1. HTTP tracing → 2. CORS (allow all) → 3. Body limit → Handler

use crate::api::handlers;
use crate::convert::ConversionService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the service router around `service`.
///
/// `max_body_bytes` bounds the request body; base64 PDFs are large, so this
/// is well above axum's 2 MiB default.
pub fn build_router(service: ConversionService, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/docs", get(handlers::docs))
        .route("/openapi.json", get(handlers::openapi))
        .route("/v1/health", get(handlers::health))
        .route("/v1/convert", post(handlers::convert))
        .with_state(service)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionOptions, ImageEncoding};
    use crate::engine::{DocumentEngine, EngineHandle, RawConversionResult};
    use crate::error::EngineError;
    use crate::pipeline::publish::{AssetPublisher, MockAssetStore};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    const LIMIT: usize = 1024 * 1024;

    /// Engine emitting `![fig](img_0)` with one image, or failing.
    struct ScriptedEngine {
        fail: bool,
    }

    impl DocumentEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        fn convert(&self, path: &Path, _options: &ConversionOptions) -> Result<RawConversionResult, EngineError> {
            if self.fail {
                return Err(EngineError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "FormatError".into(),
                });
            }
            let mut images = BTreeMap::new();
            images.insert(
                "img_0".to_string(),
                DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]))),
            );
            Ok(RawConversionResult {
                text: "Intro\n\n![fig](img_0)\n".into(),
                images,
                metadata: serde_json::Map::new(),
            })
        }
    }

    fn app_with(engine: EngineHandle, scratch: &Path) -> Router {
        let publisher = AssetPublisher::new(
            Arc::new(MockAssetStore::new("https://example.com/images")),
            ImageEncoding::Jpeg,
            2,
        );
        let service = ConversionService::new(engine, publisher).with_scratch_dir(scratch);
        build_router(service, LIMIT)
    }

    fn ready_app(fail: bool, scratch: &Path) -> Router {
        app_with(EngineHandle::ready(Arc::new(ScriptedEngine { fail })), scratch)
    }

    fn convert_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/convert")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn payload(pdf_base64: &str) -> String {
        serde_json::json!({ "pdf_base64": pdf_base64 }).to_string()
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_while_engine_loads() {
        let scratch = tempfile::tempdir().unwrap();
        let app = app_with(EngineHandle::new(), scratch.path());

        let req = Request::builder().uri("/v1/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json, serde_json::json!({"status": "healthy", "service": "PDF Parser API"}));
    }

    #[tokio::test]
    async fn convert_is_503_while_engine_loads() {
        let scratch = tempfile::tempdir().unwrap();
        let app = app_with(EngineHandle::new(), scratch.path());

        let response = app.oneshot(convert_request(payload(""))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Models not loaded");
    }

    #[tokio::test]
    async fn empty_payload_is_422() {
        let scratch = tempfile::tempdir().unwrap();
        let response = ready_app(false, scratch.path())
            .oneshot(convert_request(payload("")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("empty"));
        assert_eq!(json["detail"][0]["loc"], serde_json::json!(["body", "pdf_base64"]));
    }

    #[tokio::test]
    async fn invalid_base64_is_never_success() {
        let scratch = tempfile::tempdir().unwrap();
        let response = ready_app(false, scratch.path())
            .oneshot(convert_request(payload("not-base64!!")))
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn missing_field_is_422_on_the_field() {
        let scratch = tempfile::tempdir().unwrap();
        for body in [r#"{"pdf": "abcd"}"#, r#"{"pdf_base64": 42}"#] {
            let response = ready_app(false, scratch.path())
                .oneshot(convert_request(body.to_string()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "body {body:?}");
            let json = read_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["detail"][0]["loc"], serde_json::json!(["body", "pdf_base64"]));
        }
    }

    #[tokio::test]
    async fn unparseable_body_is_422_on_the_body() {
        let scratch = tempfile::tempdir().unwrap();
        for body in ["{not json", ""] {
            let response = ready_app(false, scratch.path())
                .oneshot(convert_request(body.to_string()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "body {body:?}");
            let json = read_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["detail"][0]["loc"], serde_json::json!(["body"]), "body {body:?}");
        }
    }

    #[tokio::test]
    async fn missing_content_type_is_422_on_the_body() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/convert")
            .body(Body::from(payload("JVBERi0xLjQK")))
            .unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = read_json(response).await;
        assert_eq!(json["detail"][0]["loc"], serde_json::json!(["body"]));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let scratch = tempfile::tempdir().unwrap();
        let big = STANDARD.encode(vec![0u8; LIMIT]);
        let response = ready_app(false, scratch.path())
            .oneshot(convert_request(payload(&big)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn successful_conversion_publishes_and_rewrites() {
        let scratch = tempfile::tempdir().unwrap();
        let response = ready_app(false, scratch.path())
            .oneshot(convert_request(payload(&STANDARD.encode(b"%PDF-1.4 stub"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["success"], true);

        let images = json["images"].as_object().unwrap();
        assert_eq!(images.len(), 1);
        let url = images["img_0"].as_str().unwrap();
        assert!(url.starts_with("https://example.com/images/"));

        let output = json["output"].as_str().unwrap();
        assert!(output.contains(url));
        assert!(!output.contains("(img_0)"));
        assert!(json["metadata"].is_object());
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn engine_failure_is_500_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let response = ready_app(true, scratch.path())
            .oneshot(convert_request(payload(&STANDARD.encode(b"not a pdf"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("FormatError"));
        assert!(json.get("output").is_none());
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn root_redirects_to_docs() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/docs");
    }

    #[tokio::test]
    async fn docs_page_is_html() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/docs").body(Body::empty()).unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains(r##"dom_id: "#swagger-ui""##));
        assert!(page.contains("/openapi.json"));
    }

    #[tokio::test]
    async fn openapi_lists_routes() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/openapi.json").body(Body::empty()).unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert!(json["paths"]["/v1/convert"]["post"].is_object());
        assert!(json["paths"]["/v1/health"]["get"].is_object());
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri("/v1/health")
            .header(header::ORIGIN, "https://somewhere.example")
            .body(Body::empty())
            .unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let scratch = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/v2/convert").body(Body::empty()).unwrap();
        let response = ready_app(false, scratch.path()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
