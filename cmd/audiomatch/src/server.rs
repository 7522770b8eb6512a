//! HTTP front end.
//!
//! API endpoints:
//! - GET  /                     - Upload page
//! - POST /upload_long_term     - Register a reference clip (multipart `file`, optional `id`)
//! - POST /upload_short_term    - Match a query clip (multipart `file`)
//! - GET  /uploads              - Known filenames, JSON
//! - GET  /uploads/{filename}   - Stored upload bytes
//! - POST /reset                - Recreate all collections, JSON report

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use audiomatch_engine::{EngineContext, EngineError, IngestRequest, Tier};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

type AppState = Arc<EngineContext>;

/// Builds the application router. `max_upload` is the request body limit
/// in bytes.
pub fn router(engine: Arc<EngineContext>, max_upload: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload_long_term", post(upload_long_term))
        .route("/upload_short_term", post(upload_short_term))
        .route("/uploads", get(list_uploads))
        .route("/uploads/{filename}", get(fetch_upload))
        .route("/reset", post(reset))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serves until ctrl-c.
pub async fn serve(addr: &str, engine: Arc<EngineContext>, max_upload: usize) -> Result<()> {
    let addr = parse_addr(addr)?;
    let app = router(engine, max_upload);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "server: listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("server: shutting down");
        })
        .await?;
    Ok(())
}

/// Accepts "host:port" or ":port" (all interfaces).
fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

fn engine_status(e: &EngineError) -> StatusCode {
    if e.is_input_error() {
        return StatusCode::BAD_REQUEST;
    }
    match e {
        EngineError::DuplicateId(_) => StatusCode::CONFLICT,
        EngineError::CollectionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Engine(e) => {
                let status = engine_status(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, "server: request failed");
                }
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct Upload {
    audio: Vec<u8>,
    filename: Option<String>,
    id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());

    let mut audio = None;
    let mut filename = None;
    let mut id = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(str::to_string);
                audio = Some(field.bytes().await.map_err(bad)?.to_vec());
            }
            "id" => {
                let text = field.text().await.map_err(bad)?;
                if !text.trim().is_empty() {
                    id = Some(text);
                }
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| ApiError::BadRequest("no file part".into()))?;
    if filename.as_deref().is_some_and(|f| f.is_empty()) {
        return Err(ApiError::BadRequest("no selected file".into()));
    }
    Ok(Upload {
        audio,
        filename,
        id,
    })
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn upload_long_term(
    State(engine): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart).await?;
    let receipt = engine
        .ingest(IngestRequest {
            tier: Tier::LongTerm,
            audio: upload.audio,
            filename: upload.filename,
            id: upload.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn upload_short_term(
    State(engine): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart).await?;
    let outcome = engine
        .match_audio(&upload.audio, upload.filename.as_deref())
        .await?;
    Ok(Json(json!({
        "stage": outcome.stage().to_string(),
        "query_id": outcome.query_id,
        "match": outcome.best,
    })))
}

async fn list_uploads(State(engine): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(engine.list_filenames().await?))
}

async fn fetch_upload(
    State(engine): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    match engine.fetch_audio(&filename).await? {
        Some(data) => Ok(([(header::CONTENT_TYPE, "audio/wav")], data).into_response()),
        None => Err(ApiError::NotFound(format!("{filename} not found"))),
    }
}

async fn reset(State(engine): State<AppState>) -> impl IntoResponse {
    let report = engine.reset().await;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>audiomatch</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 40em; margin: 2em auto; }
form { border: 1px solid #ccc; padding: 1em; margin-bottom: 1em; }
pre { background: #f4f4f4; padding: 1em; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>audiomatch</h1>
<form id="long" action="/upload_long_term" method="post" enctype="multipart/form-data">
  <h2>Add reference</h2>
  <input type="file" name="file" accept="audio/wav">
  <input type="text" name="id" placeholder="id (optional)">
  <button type="submit">Upload</button>
</form>
<form id="short" action="/upload_short_term" method="post" enctype="multipart/form-data">
  <h2>Match clip</h2>
  <input type="file" name="file" accept="audio/wav">
  <button type="submit">Match</button>
</form>
<form id="reset" action="/reset" method="post">
  <button type="submit">Reset</button>
</form>
<pre id="out"></pre>
<script>
for (const form of document.querySelectorAll("form")) {
  form.addEventListener("submit", async (ev) => {
    ev.preventDefault();
    const resp = await fetch(form.action, { method: "POST", body: new FormData(form) });
    document.getElementById("out").textContent = JSON.stringify(await resp.json(), null, 2);
  });
}
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    use audiomatch_embed::{EmbedError, FbankEmbedder, wav};
    use audiomatch_engine::{EngineConfig, EngineParts, MemoryBlobStore};
    use audiomatch_kv::MemoryStore;
    use audiomatch_vecstore::VectorDb;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use reqwest::multipart::{Form, Part};
    use serde_json::Value;

    fn clip(tones: &[f64], seed: u64) -> Vec<u8> {
        let rate = 16000u32;
        let mut rng = StdRng::seed_from_u64(seed);
        let pcm: Vec<f32> = (0..rate as usize / 2)
            .map(|i| {
                let t = i as f64 / rate as f64;
                let s: f64 = tones.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f64>() * 0.2;
                (s + rng.random_range(-0.05..0.05)) as f32
            })
            .collect();
        wav::encode_pcm16(&pcm, rate)
    }

    async fn start() -> String {
        let engine = EngineContext::new(EngineParts {
            db: VectorDb::open(Arc::new(MemoryStore::new())),
            embedder: Arc::new(FbankEmbedder::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            config: EngineConfig::default(),
        })
        .unwrap();
        let app = router(Arc::new(engine), 1024 * 1024);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn form(audio: Vec<u8>, name: &str, id: Option<&str>) -> Form {
        let form = Form::new().part("file", Part::bytes(audio).file_name(name.to_string()));
        match id {
            Some(id) => form.text("id", id.to_string()),
            None => form,
        }
    }

    #[test]
    fn addr_forms() {
        assert_eq!(parse_addr(":8080").unwrap().to_string(), "0.0.0.0:8080");
        assert_eq!(parse_addr("127.0.0.1:5000").unwrap().port(), 5000);
        assert!(parse_addr("nope").is_err());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            engine_status(&EngineError::InvalidId("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(engine_status(&EngineError::DuplicateId(1)), StatusCode::CONFLICT);
        assert_eq!(
            engine_status(&EngineError::CollectionUnavailable("c".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            engine_status(&EngineError::Blob("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            engine_status(&EngineError::Embedding(EmbedError::InvalidAudio("riff".into()))),
            StatusCode::BAD_REQUEST
        );

        // Embedder and configuration faults are the server's, not the client's.
        assert_eq!(
            engine_status(&EngineError::Embedding(EmbedError::Api("timeout".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            engine_status(&EngineError::Embedding(EmbedError::Worker("panicked".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            engine_status(&EngineError::DimensionMismatch { got: 3, want: 4 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn upload_then_match() {
        let base = start().await;
        let http = reqwest::Client::new();
        let a = clip(&[440.0, 1320.0], 1);

        let resp = http
            .post(format!("{base}/upload_long_term"))
            .multipart(form(a.clone(), "a.wav", Some("7")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], 7);
        assert_eq!(body["filename"], "a.wav");

        let resp = http
            .post(format!("{base}/upload_short_term"))
            .multipart(form(a, "q.wav", None))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["stage"], "match_found");
        assert_eq!(body["query_id"], 0);
        assert_eq!(body["match"]["id"], 7);
        assert_eq!(body["match"]["filename"], "a.wav");
        assert!(body["match"]["distance"].as_f64().unwrap() < 1e-3);

        let names: Vec<String> = http
            .get(format!("{base}/uploads"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(names, vec!["a.wav", "q.wav"]);

        let resp = http.get(format!("{base}/uploads/a.wav")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.headers()[reqwest::header::CONTENT_TYPE], "audio/wav");

        let resp = http.get(format!("{base}/uploads/missing.wav")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_store_reports_no_match() {
        let base = start().await;
        let body: Value = reqwest::Client::new()
            .post(format!("{base}/upload_short_term"))
            .multipart(form(clip(&[600.0], 2), "q.wav", None))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["stage"], "no_match");
        assert!(body["match"].is_null());
    }

    #[tokio::test]
    async fn error_statuses() {
        let base = start().await;
        let http = reqwest::Client::new();
        let url = format!("{base}/upload_long_term");

        let resp = http
            .post(&url)
            .multipart(Form::new().text("id", "1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = http
            .post(&url)
            .multipart(form(b"not audio".to_vec(), "x.wav", None))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = http
            .post(&url)
            .multipart(form(clip(&[440.0], 3), "x.wav", Some("abc")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        for expected in [reqwest::StatusCode::CREATED, reqwest::StatusCode::CONFLICT] {
            let resp = http
                .post(&url)
                .multipart(form(clip(&[440.0], 3), "x.wav", Some("5")))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), expected);
        }
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let base = start().await;
        let http = reqwest::Client::new();
        http.post(format!("{base}/upload_long_term"))
            .multipart(form(clip(&[440.0], 4), "a.wav", None))
            .send()
            .await
            .unwrap();

        let resp = http.post(format!("{base}/reset")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let report: Value = resp.json().await.unwrap();
        assert_eq!(report["collections"].as_array().unwrap().len(), 3);

        let names: Vec<String> = http
            .get(format!("{base}/uploads"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(names.is_empty());
        let resp = http.get(format!("{base}/uploads/a.wav")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_page() {
        let base = start().await;
        let text = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(text.contains("/upload_long_term"));
    }
}
