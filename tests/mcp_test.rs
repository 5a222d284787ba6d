//! Integration tests for the MCP tool

#![cfg(unix)]

mod common;

use axum::body::Body;
use axum::http::{header, Request};
use axum::routing::get;
use axum::Router;
use common::{dir_entries, fake_extractor, spawn_server, test_config, CRASHING, ONE_FIGURE, PDF};
use pdf_figures_server::server::{ExtractFiguresParams, FigureServer};
use pdf_figures_server::{create_router, ExtractionService};
use std::path::Path;
use tower::ServiceExt;

fn service(root: &Path, script: &str) -> ExtractionService {
    let extractor = fake_extractor(root, script);
    ExtractionService::new(test_config(root, extractor)).unwrap()
}

async fn pdf_origin() -> String {
    spawn_server(Router::new().route("/papers/attention.pdf", get(|| async { PDF }))).await
}

#[tokio::test]
async fn test_tool_returns_figures_with_public_urls() {
    let origin = pdf_origin().await;
    let root = tempfile::tempdir().unwrap();
    let server = FigureServer::new(service(root.path(), ONE_FIGURE));

    let response = server
        .process_extract_figures(&ExtractFiguresParams {
            pdf_url: format!("{}/papers/attention.pdf", origin),
        })
        .await;
    let json = serde_json::to_value(&response).unwrap();

    assert!(json.get("error").is_none(), "unexpected error: {}", json);
    let figures = json["result"].as_array().unwrap();
    assert_eq!(figures.len(), 1);
    assert_eq!(figures[0]["caption"], "Figure 1: Overview.");
    let render_url = figures[0]["renderURL"].as_str().unwrap();
    assert!(render_url.starts_with("http://localhost:5001/resources/"));
    assert!(render_url.ends_with("/attention-Figure1-1.png"));

    assert!(dir_entries(&root.path().join("uploads")).is_empty());
    assert_eq!(dir_entries(&root.path().join("output")).len(), 1);
}

#[tokio::test]
async fn test_tool_reports_extractor_stderr() {
    let origin = pdf_origin().await;
    let root = tempfile::tempdir().unwrap();
    let server = FigureServer::new(service(root.path(), CRASHING));

    let response = server
        .process_extract_figures(&ExtractFiguresParams {
            pdf_url: format!("{}/papers/attention.pdf", origin),
        })
        .await;
    let json = serde_json::to_value(&response).unwrap();

    assert!(json.get("result").is_none());
    assert_eq!(json["error"], "Extractor exited with status 1");
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .contains("End-of-File, expected line"));
    assert!(dir_entries(&root.path().join("output")).is_empty());
}

#[tokio::test]
async fn test_mcp_endpoint_accepts_initialize() {
    let root = tempfile::tempdir().unwrap();
    let app = create_router(service(root.path(), ONE_FIGURE));

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "figures-test", "version": "0.1.0"}
        }
    });
    let request = Request::post("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        response.status().is_success(),
        "status: {}",
        response.status()
    );
}
