//! End-to-end tests for the HTTP API.
//!
//! Each test starts a real server on a free port, backed by a temporary
//! SQLite database and blob directory, and drives it over HTTP.

use axum::{http::StatusCode, routing::post, Json, Router};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use sentiment_harness::config::{parse_config, Config};
use sentiment_harness::server::{run_server, IDENTITY_HEADER};
use serde_json::{json, Value};
use tempfile::TempDir;

const ANN: &str = "ann@example.com";
const BOB: &str = "bob@example.com";

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir, port: u16, classifier: &str) -> Config {
    let root = tmp.path().display();
    parse_config(&format!(
        r#"[db]
path = "{root}/data/senti.sqlite"

[storage]
root = "{root}/data/blobs"

[classifier]
{classifier}

[server]
bind = "127.0.0.1:{port}"
"#
    ))
    .unwrap()
}

/// Start a stand-in inference endpoint that labels texts containing "good"
/// as positive and everything else as negative.
async fn start_fake_classifier() -> u16 {
    async fn classify(Json(body): Json<Value>) -> Json<Value> {
        let preds: Vec<Value> = body["inputs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| {
                let label = if t.as_str().unwrap().contains("good") {
                    "POSITIVE"
                } else {
                    "NEGATIVE"
                };
                json!([{"label": label, "score": 0.9}, {"label": "NEUTRAL", "score": 0.1}])
            })
            .collect();
        Json(Value::Array(preds))
    }

    async fn reject() -> (StatusCode, &'static str) {
        (StatusCode::UNPROCESSABLE_ENTITY, "model not loaded")
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new()
        .route("/classify", post(classify))
        .route("/broken", post(reject));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestServer {
    async fn start(classifier: &str) -> Self {
        let port = find_free_port();
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp, port, classifier);

        let handle = tokio::spawn(async move {
            run_server(&cfg).await.unwrap();
        });
        wait_for_server(port).await;

        Self {
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            handle,
            _tmp: tmp,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn upload(&self, name: &str, body: &str, user: &str) -> Value {
        let resp = self
            .client
            .post(self.url(&format!("/uploads/{}", name)))
            .header(IDENTITY_HEADER, user)
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    async fn post(&self, path: &str, user: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(IDENTITY_HEADER, user)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, user: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(IDENTITY_HEADER, user)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const REVIEWS: &str = "id,comment\n1,Great product\n2,Terrible support\n3,\n";

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_identity_required() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;

    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = server
        .client
        .get(server.url("/analysis/results"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthenticated");
}

#[tokio::test]
async fn test_upload_list_and_delete() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;

    let file = server.upload("reviews.csv", REVIEWS, ANN).await;
    let id = file["id"].as_str().unwrap();
    assert_eq!(file["file_name"], "reviews.csv");
    assert_eq!(file["owner"], ANN);

    let body: Value = server.get("/uploads", ANN).await.json().await.unwrap();
    assert_eq!(body["files"].as_array().unwrap().len(), 1);

    let body: Value = server.get("/uploads", BOB).await.json().await.unwrap();
    assert!(body["files"].as_array().unwrap().is_empty());

    let resp = server.get(&format!("/uploads/{}", id), BOB).await;
    assert_eq!(resp.status(), 404);

    let resp = server
        .client
        .delete(server.url(&format!("/uploads/{}", id)))
        .header(IDENTITY_HEADER, ANN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], id);

    let resp = server.get(&format!("/uploads/{}", id), ANN).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;

    let resp = server
        .client
        .post(server.url("/uploads/deck.pptx"))
        .header(IDENTITY_HEADER, ANN)
        .body("binary")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_input");
}

#[tokio::test]
async fn test_per_unit_analysis_and_csv_download() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;
    let file = server.upload("reviews.csv", REVIEWS, ANN).await;
    let file_id = file["id"].as_str().unwrap();

    let resp = server
        .post(&format!("/analysis/per-unit/{}", file_id), ANN)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["overall"], "MIXED");
    assert_eq!(body["rows"][0]["text_column"], "comment");
    assert_eq!(body["rows"][1]["row"]["id"], "2");
    let result_id = body["result_id"].as_str().unwrap().to_string();

    let resp = server
        .get(&format!("/analysis/download/{}", result_id), ANN)
        .await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let disposition = resp.headers()[CONTENT_DISPOSITION].to_str().unwrap();
    assert_eq!(
        disposition,
        format!("attachment; filename=\"analysis_{}.csv\"", result_id)
    );
    let text = resp.text().await.unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let labels: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[4].to_string())
        .collect();
    assert_eq!(labels, vec!["POSITIVE", "NEGATIVE"]);

    let body: Value = server
        .get("/analysis/results", ANN)
        .await
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], result_id.as_str());
}

#[tokio::test]
async fn test_download_errors() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;
    let file = server
        .upload("note.txt", "Everything went great today", ANN)
        .await;
    let file_id = file["id"].as_str().unwrap();

    let body: Value = server
        .post(&format!("/analysis/whole-document/{}", file_id), ANN)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["overall_result"]["label"], "POSITIVE");
    let result_id = body["result_id"].as_str().unwrap();

    // Whole-document results have no rows to tabulate.
    let resp = server
        .get(&format!("/analysis/download/{}", result_id), ANN)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .get(&format!("/analysis/download/{}?format=xml", result_id), ANN)
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid format"));

    let resp = server
        .get(&format!("/analysis/download/{}?format=json", result_id), BOB)
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let resp = server
        .get(&format!("/analysis/download/{}?format=json", result_id), ANN)
        .await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let record: Value = resp.json().await.unwrap();
    assert_eq!(record["overall_result"]["label"], "POSITIVE");
}

#[tokio::test]
async fn test_analysis_of_missing_file_is_not_found() {
    let server = TestServer::start(r#"provider = "lexicon""#).await;

    let resp = server.post("/analysis/per-unit/does-not-exist", ANN).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_http_classifier_end_to_end() {
    let fake = start_fake_classifier().await;
    let server = TestServer::start(&format!(
        "provider = \"http\"\nurl = \"http://127.0.0.1:{}/classify\"\nbatch_size = 2\nmax_retries = 0",
        fake
    ))
    .await;

    let file = server
        .upload("lines.txt", "good start\nbad middle\ngood end\n", ANN)
        .await;
    let file_id = file["id"].as_str().unwrap();

    let body: Value = server
        .post(&format!("/analysis/per-unit/{}", file_id), ANN)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(body["summary"]["positive"], 2);
    assert_eq!(body["summary"]["negative"], 1);
    assert_eq!(body["summary"]["overall"], "POSITIVE");
    assert_eq!(body["rows"][1]["label"], "NEGATIVE");
}

#[tokio::test]
async fn test_classifier_failure_is_bad_gateway() {
    let fake = start_fake_classifier().await;
    let server = TestServer::start(&format!(
        "provider = \"http\"\nurl = \"http://127.0.0.1:{}/broken\"\nmax_retries = 0",
        fake
    ))
    .await;

    let file = server.upload("one.txt", "anything", ANN).await;
    let file_id = file["id"].as_str().unwrap();

    let resp = server
        .post(&format!("/analysis/whole-document/{}", file_id), ANN)
        .await;
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream");

    let body: Value = server
        .get("/analysis/results", ANN)
        .await
        .json()
        .await
        .unwrap();
    assert!(body["results"].as_array().unwrap().is_empty());
}
