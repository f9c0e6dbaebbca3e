use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use prospect_cleaner::config::Config;
use prospect_cleaner::pipeline::ProspectCleaner;
use prospect_cleaner::server::{create_server, AppState};
use prospect_cleaner::validators::LlmBackend;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

fn app() -> axum::Router {
    let state = Arc::new(AppState {
        cleaner: ProspectCleaner::with_backend(&Config::default(), LlmBackend::Disabled),
        metrics: None,
    });
    create_server(state)
}

async fn send(request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app().oneshot(request).await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, body))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_reports_running() -> Result<()> {
    let (status, body) = send(Request::builder().uri("/").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Prospect Cleaner API is running.");
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (status, body) = send(Request::builder().uri("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_metrics_without_recorder() -> Result<()> {
    let (status, _) = send(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn test_missing_input_is_a_bad_request() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.csv");
    let (status, body) = send(post_json(
        "/clean_prospects",
        json!({
            "input_path": dir.path().join("absent.csv"),
            "output_path": output,
        }),
    ))
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("absent.csv"));
    assert!(!output.exists());
    Ok(())
}

#[tokio::test]
async fn test_clean_prospects_creates_output_directory() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.csv");
    let output = dir.path().join("nested").join("deeper").join("out.csv");
    std::fs::write(&input, "nom,prenom,raison_sociale,email\nDupont,Pierre,Acme,p@acme.ch\n")?;

    let (status, body) = send(post_json(
        "/clean_prospects/",
        json!({
            "input_path": input,
            "output_path": output,
        }),
    ))
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["processed_rows"], 1);
    assert!(output.exists());
    let written = std::fs::read_to_string(&output)?;
    assert!(written.contains("nom:no_llm;entreprise:no_llm"));
    Ok(())
}

#[tokio::test]
async fn test_column_overrides_in_request() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "last,first,societe\nDupont,Pierre,Acme\n")?;

    let (status, body) = send(post_json(
        "/clean_prospects",
        json!({
            "input_path": input,
            "output_path": output,
            "columns": { "last_name": "last", "first_name": "first", "company": "societe" }
        }),
    ))
    .await?;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let written = std::fs::read_to_string(&output)?;
    assert!(written.lines().next().unwrap().contains("societe_validee"));
    Ok(())
}
