//! Integration tests for the full pipeline against a local stand-in for the
//! Mistral and Gemini HTTP APIs.
//!
//! Each test starts its own axum server on an ephemeral port, points both
//! clients at it through the base-URL config, and inspects what the server
//! saw. No network access or real API keys are needed.
//!
//! Run with:
//!   cargo test --test pipeline

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use syllabus2csv::{
    convert_to_dir, Credentials, Pipeline, PipelineConfig, Stage, Syllabus2CsvError, UploadedFile,
};

// ── Mock server ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct Seen {
    hits: Vec<&'static str>,
    purpose: Option<String>,
    filename: Option<String>,
    upload_bytes: usize,
    upload_auth: Option<String>,
    url_auth: Option<String>,
    url_file_id: Option<String>,
    expiry: Option<String>,
    ocr_auth: Option<String>,
    ocr_request: Option<Value>,
    gemini_call: Option<String>,
    gemini_key: Option<String>,
    gemini_request: Option<Value>,
}

struct MockApi {
    upload_status: StatusCode,
    url_status: StatusCode,
    ocr_status: StatusCode,
    generate_status: StatusCode,
    pages: Vec<&'static str>,
    ocr_body: Option<Value>,
    generate_body: Value,
    seen: Mutex<Seen>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            upload_status: StatusCode::OK,
            url_status: StatusCode::OK,
            ocr_status: StatusCode::OK,
            generate_status: StatusCode::OK,
            pages: vec!["Due 01/15 HW1", "Due 01/22 HW2"],
            ocr_body: None,
            generate_body: gemini_text("```csv\nHeader\nRow\n```"),
            seen: Mutex::new(Seen::default()),
        }
    }
}

type Mock = Arc<MockApi>;

fn gemini_text(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 812, "candidatesTokenCount": 64}
    })
}

fn auth(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn failure(status: StatusCode) -> Response {
    (status, Json(json!({"message": "mock failure"}))).into_response()
}

async fn upload(State(mock): State<Mock>, headers: HeaderMap, mut form: Multipart) -> Response {
    let mut purpose = None;
    let mut filename = None;
    let mut upload_bytes = 0;
    while let Ok(Some(field)) = form.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "purpose" => purpose = field.text().await.ok(),
            "file" => {
                filename = field.file_name().map(str::to_string);
                upload_bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            _ => {}
        }
    }
    {
        let mut seen = mock.seen.lock().unwrap();
        seen.hits.push("upload");
        seen.upload_auth = auth(&headers);
        seen.purpose = purpose;
        seen.filename = filename;
        seen.upload_bytes = upload_bytes;
    }
    if !mock.upload_status.is_success() {
        return failure(mock.upload_status);
    }
    Json(json!({"id": "file-123", "object": "file", "purpose": "ocr"})).into_response()
}

async fn signed_url(
    State(mock): State<Mock>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    {
        let mut seen = mock.seen.lock().unwrap();
        seen.hits.push("url");
        seen.url_auth = auth(&headers);
        seen.url_file_id = Some(id.clone());
        seen.expiry = query.get("expiry").cloned();
    }
    if !mock.url_status.is_success() {
        return failure(mock.url_status);
    }
    Json(json!({"url": format!("https://signed.example/{id}?sig=abc")})).into_response()
}

async fn ocr(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    {
        let mut seen = mock.seen.lock().unwrap();
        seen.hits.push("ocr");
        seen.ocr_auth = auth(&headers);
        seen.ocr_request = Some(body);
    }
    if !mock.ocr_status.is_success() {
        return failure(mock.ocr_status);
    }
    let body = mock.ocr_body.clone().unwrap_or_else(|| {
        let pages: Vec<Value> = mock
            .pages
            .iter()
            .enumerate()
            .map(|(index, md)| json!({"index": index, "markdown": md, "images": []}))
            .collect();
        json!({"pages": pages, "model": "mistral-ocr-latest"})
    });
    Json(body).into_response()
}

async fn generate(
    State(mock): State<Mock>,
    Path(call): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    {
        let mut seen = mock.seen.lock().unwrap();
        seen.hits.push("generate");
        seen.gemini_call = Some(call);
        seen.gemini_key = query.get("key").cloned();
        seen.gemini_request = Some(body);
    }
    if !mock.generate_status.is_success() {
        return failure(mock.generate_status);
    }
    Json(mock.generate_body.clone()).into_response()
}

async fn document(Path(name): Path<String>) -> Response {
    if name == "syllabus.pdf" {
        b"%PDF-1.7\n%served syllabus".to_vec().into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serve `mock` on an ephemeral port and return its base URL.
async fn serve(mock: Mock) -> String {
    let app = Router::new()
        .route("/v1/files", post(upload))
        .route("/v1/files/:id/url", get(signed_url))
        .route("/v1/ocr", post(ocr))
        .route("/v1beta/models/:call", post(generate))
        .route("/docs/:name", get(document))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn credentials() -> Credentials {
    Credentials::new("test-mistral", "test-gemini")
}

fn config_for(base: &str) -> PipelineConfig {
    PipelineConfig::builder()
        .mistral_base_url(base)
        .gemini_base_url(base)
        .build()
        .expect("valid config")
}

async fn pipeline_for(mock: &Mock) -> Pipeline {
    let base = serve(Arc::clone(mock)).await;
    Pipeline::from_config(&credentials(), config_for(&base)).expect("clients build")
}

fn syllabus() -> UploadedFile {
    UploadedFile::new("syllabus.pdf", b"%PDF-1.7\n%fake syllabus".to_vec())
}

fn hits(mock: &Mock) -> Vec<&'static str> {
    mock.seen.lock().unwrap().hits.clone()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_writes_stripped_csv() {
    let mock: Mock = Arc::new(MockApi::default());
    let base = serve(Arc::clone(&mock)).await;

    let input_dir = tempfile::tempdir().unwrap();
    let pdf = input_dir.path().join("syllabus.pdf");
    std::fs::write(&pdf, b"%PDF-1.7\n%fake syllabus").unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let path = convert_to_dir(
        pdf.to_str().unwrap(),
        out_dir.path(),
        &credentials(),
        &config_for(&base),
    )
    .await
    .expect("pipeline should succeed");

    assert_eq!(path, out_dir.path().join("assignments.csv"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Header\nRow\n");
    assert_eq!(hits(&mock), vec!["upload", "url", "ocr", "generate"]);
}

#[tokio::test]
async fn requests_match_vendor_contracts() {
    let mock: Mock = Arc::new(MockApi::default());
    let pipeline = pipeline_for(&mock).await;

    let output = pipeline.run(&syllabus()).await.unwrap();
    assert_eq!(output.combined_text, "Due 01/15 HW1 Due 01/22 HW2 ");
    assert_eq!(output.page_count, 2);
    assert_eq!(output.stats.pages, 2);
    assert_eq!(output.stats.prompt_tokens, 812);
    assert_eq!(output.stats.completion_tokens, 64);

    let seen = mock.seen.lock().unwrap().clone();

    // Upload: multipart purpose + file, bearer auth.
    assert_eq!(seen.purpose.as_deref(), Some("ocr"));
    assert_eq!(seen.filename.as_deref(), Some("syllabus.pdf"));
    assert_eq!(seen.upload_bytes, syllabus().bytes.len());
    assert_eq!(seen.upload_auth.as_deref(), Some("Bearer test-mistral"));

    // Signed URL: id from the upload, 24 h expiry.
    assert_eq!(seen.url_file_id.as_deref(), Some("file-123"));
    assert_eq!(seen.expiry.as_deref(), Some("24"));
    assert_eq!(seen.url_auth.as_deref(), Some("Bearer test-mistral"));

    // OCR: signed URL passed through verbatim.
    assert_eq!(seen.ocr_auth.as_deref(), Some("Bearer test-mistral"));
    assert_eq!(
        seen.ocr_request,
        Some(json!({
            "model": "mistral-ocr-latest",
            "document": {
                "type": "document_url",
                "document_url": "https://signed.example/file-123?sig=abc"
            },
            "include_image_base64": true
        }))
    );

    // Gemini: key as query parameter, one text part ending with the OCR text.
    assert_eq!(seen.gemini_call.as_deref(), Some("gemini-2.0-flash:generateContent"));
    assert_eq!(seen.gemini_key.as_deref(), Some("test-gemini"));
    let request = seen.gemini_request.expect("gemini request recorded");
    let prompt = request["contents"][0]["parts"][0]["text"]
        .as_str()
        .expect("text part");
    assert!(prompt.contains("Due Date,Class,Assignment Name,Assignment Type,Checkbox"));
    assert!(prompt.ends_with("Due 01/15 HW1 Due 01/22 HW2 "));
}

#[tokio::test]
async fn url_input_is_downloaded_then_uploaded() {
    let mock: Mock = Arc::new(MockApi::default());
    let base = serve(Arc::clone(&mock)).await;

    let output = syllabus2csv::convert(
        format!("{base}/docs/syllabus.pdf"),
        &credentials(),
        &config_for(&base),
    )
    .await
    .unwrap();

    assert_eq!(output.artifact.content, "Header\nRow\n");
    let seen = mock.seen.lock().unwrap().clone();
    assert_eq!(seen.filename.as_deref(), Some("syllabus.pdf"));
    assert_eq!(seen.upload_bytes, b"%PDF-1.7\n%served syllabus".len());
}

#[tokio::test]
async fn failed_download_never_reaches_the_providers() {
    let mock: Mock = Arc::new(MockApi::default());
    let base = serve(Arc::clone(&mock)).await;

    let err = syllabus2csv::convert(
        format!("{base}/docs/missing.pdf"),
        &credentials(),
        &config_for(&base),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Syllabus2CsvError::DownloadFailed { .. }));
    assert!(hits(&mock).is_empty());
}

// ── HTTP failures, one per call ──────────────────────────────────────────────

#[tokio::test]
async fn upload_401_aborts_before_any_other_call() {
    let mock: Mock = Arc::new(MockApi {
        upload_status: StatusCode::UNAUTHORIZED,
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;
    let out_dir = tempfile::tempdir().unwrap();

    let err = pipeline.deliver(&syllabus(), out_dir.path()).await.unwrap_err();

    assert!(matches!(err, Syllabus2CsvError::UploadFailed { status: 401, .. }));
    assert!(err.to_string().contains("401 Unauthorized"), "got: {err}");
    assert_eq!(hits(&mock), vec!["upload"]);
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn url_resolution_failure_stops_before_ocr() {
    let mock: Mock = Arc::new(MockApi {
        url_status: StatusCode::NOT_FOUND,
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;

    let err = pipeline.run(&syllabus()).await.unwrap_err();

    assert!(matches!(err, Syllabus2CsvError::UrlResolutionFailed { status: 404, .. }));
    assert!(err.to_string().contains("404 Not Found"), "got: {err}");
    assert_eq!(err.stage(), Stage::ResolveUrl);
    assert_eq!(hits(&mock), vec!["upload", "url"]);
}

#[tokio::test]
async fn ocr_failure_stops_before_generation() {
    let mock: Mock = Arc::new(MockApi {
        ocr_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;

    let err = pipeline.run(&syllabus()).await.unwrap_err();

    assert!(matches!(err, Syllabus2CsvError::OcrFailed { status: 500, .. }));
    assert!(err.to_string().contains("500 Internal Server Error"), "got: {err}");
    assert_eq!(hits(&mock), vec!["upload", "url", "ocr"]);
}

#[tokio::test]
async fn generation_failure_writes_nothing() {
    let mock: Mock = Arc::new(MockApi {
        generate_status: StatusCode::TOO_MANY_REQUESTS,
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;
    let out_dir = tempfile::tempdir().unwrap();

    let err = pipeline.deliver(&syllabus(), out_dir.path()).await.unwrap_err();

    assert!(matches!(err, Syllabus2CsvError::GenerationFailed { status: 429, .. }));
    assert!(err.to_string().contains("429 Too Many Requests"), "got: {err}");
    assert_eq!(hits(&mock), vec!["upload", "url", "ocr", "generate"]);
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

// ── Malformed success bodies ─────────────────────────────────────────────────

#[tokio::test]
async fn malformed_generation_responses_are_invalid_response() {
    let bodies = [
        json!({}),
        json!({"candidates": []}),
        json!({"candidates": [{}]}),
        json!({"candidates": [{"content": {}}]}),
        json!({"candidates": [{"content": {"parts": []}}]}),
        json!({"candidates": [{"content": {"parts": [{}]}}]}),
    ];

    for body in bodies {
        let mock: Mock = Arc::new(MockApi {
            generate_body: body.clone(),
            ..Default::default()
        });
        let pipeline = pipeline_for(&mock).await;
        let out_dir = tempfile::tempdir().unwrap();

        let err = pipeline.deliver(&syllabus(), out_dir.path()).await.unwrap_err();
        assert!(
            matches!(
                err,
                Syllabus2CsvError::InvalidResponse {
                    stage: Stage::Generate,
                    ..
                }
            ),
            "body {body} gave {err:?}"
        );
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }
}

#[tokio::test]
async fn ocr_body_without_pages_is_invalid_response() {
    let mock: Mock = Arc::new(MockApi {
        ocr_body: Some(json!({"model": "mistral-ocr-latest"})),
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;

    let err = pipeline.run(&syllabus()).await.unwrap_err();
    assert!(matches!(
        err,
        Syllabus2CsvError::InvalidResponse {
            stage: Stage::Ocr,
            ..
        }
    ));
    assert_eq!(hits(&mock), vec!["upload", "url", "ocr"]);
}

#[tokio::test]
async fn unfenced_completion_is_kept() {
    let csv = "Due Date,Class,Assignment Name,Assignment Type,Checkbox\n\
               01/15/2025,CSE260,HW1,Homework,[ ]";
    let mock: Mock = Arc::new(MockApi {
        generate_body: gemini_text(csv),
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;

    let output = pipeline.run(&syllabus()).await.unwrap();
    assert_eq!(output.artifact.content, format!("{csv}\n"));
    assert!(output.stats.header_matches);
    assert_eq!(output.stats.csv_rows, 1);
}

#[tokio::test]
async fn chatter_around_fence_is_dropped() {
    let mock: Mock = Arc::new(MockApi {
        generate_body: gemini_text(
            "Here is the CSV:\n```csv\nHeader\nRow\n```\nLet me know if you need more.",
        ),
        ..Default::default()
    });
    let pipeline = pipeline_for(&mock).await;

    let output = pipeline.run(&syllabus()).await.unwrap();
    assert_eq!(output.artifact.content, "Header\nRow\n");
}

// ── Transport failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_provider_is_network_error_on_upload() {
    // Bind then drop to get a port nothing is listening on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let base = format!("http://127.0.0.1:{port}");
    let pipeline = Pipeline::from_config(&credentials(), config_for(&base)).unwrap();

    let err = pipeline.run(&syllabus()).await.unwrap_err();
    assert!(matches!(
        err,
        Syllabus2CsvError::Network {
            stage: Stage::Upload,
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_gemini_does_not_leak_api_key() {
    let mock: Mock = Arc::new(MockApi::default());
    let mistral = serve(Arc::clone(&mock)).await;
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let config = PipelineConfig::builder()
        .mistral_base_url(&mistral)
        .gemini_base_url(format!("http://127.0.0.1:{port}"))
        .build()
        .unwrap();
    let credentials = Credentials::new("test-mistral", "SUPERSECRETKEY");
    let pipeline = Pipeline::from_config(&credentials, config).unwrap();

    let err = pipeline.run(&syllabus()).await.unwrap_err();
    assert!(matches!(
        err,
        Syllabus2CsvError::Network {
            stage: Stage::Generate,
            ..
        }
    ));
    assert!(!err.to_string().contains("SUPERSECRETKEY"), "got: {err}");
    assert!(!format!("{err:?}").contains("SUPERSECRETKEY"), "got: {err:?}");
}
