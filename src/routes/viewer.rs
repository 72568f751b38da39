//! PDF viewer API endpoints
//!
//! One POST action per viewer operation, named as the viewer client
//! expects them. Every body is a flat JSON object; responses are JSON
//! except Download, Unload, ImportAnnotations and the status lines,
//! which are plain text.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::dispatcher::OperationOutput;
use crate::error::Result;
use crate::operation::{Operation, OperationKind, Params};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/Load", post(load))
        .route("/Unload", post(unload))
        .route("/Download", post(download))
        .route("/PrintImages", post(print_images))
        .route("/Bookmarks", post(bookmarks))
        .route("/RenderPdfPages", post(render_pdf_pages))
        .route("/RenderPdfTexts", post(render_pdf_texts))
        .route("/RenderThumbnailImages", post(render_thumbnail_images))
        .route("/RenderAnnotationComments", post(render_annotation_comments))
        .route("/ExportAnnotations", post(export_annotations))
        .route("/ImportAnnotations", post(import_annotations))
        .route("/GetStatus", get(status))
        .route("/version", get(status))
}

async fn run(state: &AppState, kind: OperationKind, params: Params) -> Result<Response> {
    let operation = Operation::from_params(kind, &params)?;
    let output = state.dispatcher().dispatch(operation).await?;

    Ok(match output {
        OperationOutput::Json(value) => Json(value).into_response(),
        OperationOutput::Text(text) => text.into_response(),
    })
}

async fn load(State(state): State<AppState>, Json(params): Json<Params>) -> Result<Response> {
    run(&state, OperationKind::Load, params).await
}

async fn unload(State(state): State<AppState>, Json(params): Json<Params>) -> Result<Response> {
    run(&state, OperationKind::Unload, params).await
}

async fn download(State(state): State<AppState>, Json(params): Json<Params>) -> Result<Response> {
    run(&state, OperationKind::Download, params).await
}

async fn print_images(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::PrintImages, params).await
}

async fn bookmarks(State(state): State<AppState>, Json(params): Json<Params>) -> Result<Response> {
    run(&state, OperationKind::Bookmarks, params).await
}

async fn render_pdf_pages(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::RenderPages, params).await
}

async fn render_pdf_texts(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::RenderTexts, params).await
}

async fn render_thumbnail_images(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::RenderThumbnails, params).await
}

async fn render_annotation_comments(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::AnnotationComments, params).await
}

async fn export_annotations(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::ExportAnnotations, params).await
}

async fn import_annotations(
    State(state): State<AppState>,
    Json(params): Json<Params>,
) -> Result<Response> {
    run(&state, OperationKind::ImportAnnotations, params).await
}

async fn status(State(state): State<AppState>) -> String {
    state.dispatcher().status_message()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::dispatcher::tests::{dispatcher_with, document_root, SAMPLE};
    use crate::dispatcher::{Dispatcher, UNLOAD_MESSAGE};
    use crate::engine::mupdf::{fixture, MupdfEngine};
    use crate::resolver::DocumentResolver;
    use crate::routes::app;
    use crate::session::SessionCache;
    use crate::state::AppState;

    fn server_with(dispatcher: Dispatcher, config: Config) -> TestServer {
        TestServer::new(app(AppState::with_dispatcher(config, dispatcher))).unwrap()
    }

    fn fake_server() -> (TestServer, TempDir) {
        let root = document_root();
        let (dispatcher, _) = dispatcher_with(&root, Duration::from_secs(600));
        (server_with(dispatcher, Config::default()), root)
    }

    async fn load(server: &TestServer, bytes: &[u8]) -> String {
        let response = server
            .post("/api/pdfviewer/Load")
            .json(&json!({ "document": BASE64.encode(bytes), "isFileName": false }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["document"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_load_and_download() {
        let (server, _root) = fake_server();
        let token = load(&server, SAMPLE).await;

        let response = server
            .post("/api/pdfviewer/Download")
            .json(&json!({ "document": token }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), BASE64.encode(SAMPLE));
    }

    #[tokio::test]
    async fn test_unload_then_operations_are_404() {
        let (server, _root) = fake_server();
        let token = load(&server, SAMPLE).await;

        let response = server
            .post("/api/pdfviewer/Unload")
            .json(&json!({ "document": token }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), UNLOAD_MESSAGE);

        let response = server
            .post("/api/pdfviewer/Bookmarks")
            .json(&json!({ "document": token }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "document_not_found");
    }

    #[tokio::test]
    async fn test_unload_without_document_succeeds() {
        let (server, _root) = fake_server();

        let response = server.post("/api/pdfviewer/Unload").json(&json!({})).await;
        response.assert_status_ok();
        assert_eq!(response.text(), UNLOAD_MESSAGE);
    }

    #[tokio::test]
    async fn test_numeric_parameters_accept_strings_and_numbers() {
        let (server, _root) = fake_server();
        let token = load(&server, SAMPLE).await;

        for page_index in [json!(1), json!("1")] {
            let response = server
                .post("/api/pdfviewer/RenderPdfPages")
                .json(&json!({ "document": token, "pageIndex": page_index }))
                .await;
            response.assert_status_ok();

            let body = response.json::<Value>();
            assert_eq!(body["pageIndex"], 1);
            assert_eq!(body["zoomFactor"], 1.0);
        }
    }

    #[tokio::test]
    async fn test_render_pages_with_token_only() {
        let (server, _root) = fake_server();
        let token = load(&server, SAMPLE).await;

        let response = server
            .post("/api/pdfviewer/RenderPdfPages")
            .json(&json!({ "document": token }))
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["pageIndex"], 0);
        assert_eq!(body["zoomFactor"], 1.0);
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let (server, _root) = fake_server();

        let response = server
            .post("/api/pdfviewer/Bookmarks")
            .json(&json!({ "pageIndex": 0 }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "document_not_found");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_400() {
        let (server, _root) = fake_server();

        let response = server
            .post("/api/pdfviewer/Load")
            .json(&json!({ "document": "%%%" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_encoding");
    }

    #[tokio::test]
    async fn test_import_annotations() {
        let (server, _root) = fake_server();

        let response = server
            .post("/api/pdfviewer/ImportAnnotations")
            .json(&json!({ "fileName": "notes.json" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), r#"{"annotations":[]}"#);

        let response = server
            .post("/api/pdfviewer/ImportAnnotations")
            .json(&json!({ "fileName": "../etc/passwd" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_and_version() {
        let (server, _root) = fake_server();

        for path in ["/api/pdfviewer/GetStatus", "/api/pdfviewer/version"] {
            let response = server.get(path).await;
            response.assert_status_ok();
            assert_eq!(response.text(), "PDF Viewer API is running FakeEngine 1.0");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let root = document_root();
        let (dispatcher, _) = dispatcher_with(&root, Duration::from_secs(600));
        let mut config = Config::default();
        config.server.max_body_bytes = 1024;
        let server = server_with(dispatcher, config);

        let response = server
            .post("/api/pdfviewer/Load")
            .json(&json!({ "document": BASE64.encode(vec![b'%'; 4096]) }))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_mupdf_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("fixture.pdf"), fixture::sample_pdf()).unwrap();

        let mut config = Config::default();
        config.resolver.document_root = root.path().to_path_buf();
        let dispatcher = Dispatcher::new(
            SessionCache::new(config.session.ttl),
            DocumentResolver::new(&config.resolver).unwrap(),
            Arc::new(MupdfEngine::new(4)),
        );
        let server = server_with(dispatcher, config);

        let response = server
            .post("/api/pdfviewer/Load")
            .json(&json!({ "document": "fixture.pdf", "isFileName": true }))
            .await;
        response.assert_status_ok();
        let info = response.json::<Value>();
        assert_eq!(info["pageCount"], 2);
        assert_eq!(info["metadata"]["title"], "Viewer Fixture");
        let token = info["document"].as_str().unwrap().to_string();

        let response = server
            .post("/api/pdfviewer/RenderPdfPages")
            .json(&json!({ "document": token, "pageIndex": 0, "zoomFactor": 0.5 }))
            .await;
        response.assert_status_ok();
        let page = response.json::<Value>();
        assert!(page["image"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let response = server
            .post("/api/pdfviewer/RenderAnnotationComments")
            .json(&json!({ "document": token }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["stats"]["total"], 2);

        let response = server
            .post("/api/pdfviewer/RenderPdfPages")
            .json(&json!({ "document": token, "pageIndex": 7 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "engine_error");
    }
}
