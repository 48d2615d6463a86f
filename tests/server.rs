//! HTTP API tests: a real server on a free port, driven with reqwest.

mod common;

use common::Harness;
use filing_chat::config::ServerConfig;
use filing_chat::server::run_server_with_services;
use serde_json::{json, Value};

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

struct TestServer {
    base: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(harness: &Harness) -> Self {
        Self::start_with(harness, ServerConfig::default()).await
    }

    async fn start_with(harness: &Harness, server: ServerConfig) -> Self {
        let port = find_free_port();
        let server = ServerConfig {
            bind: format!("127.0.0.1:{}", port),
            ..server
        };
        let services = harness.services.clone();
        let handle = tokio::spawn(async move {
            run_server_with_services(&server, services).await.ok();
        });
        wait_for_server(port).await;
        Self {
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn open_session(&self) -> Value {
        let resp = self.client.post(self.url("/sessions")).send().await.unwrap();
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn session_id(view: &Value) -> String {
    view["id"].as_str().unwrap().to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_page() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;

    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sessions"], 0);

    let page = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Ask me a question!"));
}

#[tokio::test]
async fn test_catalog_endpoint() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;

    let body: Value = server
        .client
        .get(server.url("/catalog"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body,
        json!([
            {
                "year": "2023",
                "quarters": [
                    { "quarter": "Q1", "documents": ["doc1", "doc2"] },
                    { "quarter": "Q2", "documents": ["doc3"] }
                ]
            },
            {
                "year": "2024",
                "quarters": [{ "quarter": "Q1", "documents": ["doc4"] }]
            }
        ])
    );
}

#[tokio::test]
async fn test_new_session_has_default_selection() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;

    let view = server.open_session().await;
    assert_eq!(view["metadata"]["filename"], "doc1.pdf");
    assert_eq!(view["metadata"]["year"], "2023");
    assert_eq!(view["metadata"]["quarter"], "Q1");
    assert_eq!(view["ready"], true);
    assert_eq!(view["scale"], "faces");
    assert!(view["messages"].as_array().unwrap().is_empty());
    assert!(view["feedback_widget"].is_null());
}

#[tokio::test]
async fn test_selection_rebuilds_only_on_change() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;
    let id = session_id(&server.open_session().await);
    let url = server.url(&format!("/sessions/{}/selection", id));

    let body: Value = server
        .client
        .put(&url)
        .json(&json!({"year": "2023", "quarter": "Q2", "file": "doc3"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rebuilt"], true);
    assert_eq!(body["session"]["metadata"]["filename"], "doc3.pdf");

    let body: Value = server
        .client
        .put(&url)
        .json(&json!({"year": "2023", "quarter": "Q2", "file": "doc3"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rebuilt"], false);

    let resp = server
        .client
        .put(&url)
        .json(&json!({"year": "1999", "quarter": "Q1", "file": "doc1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_message_then_feedback() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;
    let id = session_id(&server.open_session().await);

    let resp = server
        .client
        .post(server.url(&format!("/sessions/{}/messages", id)))
        .json(&json!({"question": "What was revenue?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    let run_id = answer["run_id"].as_str().unwrap().to_string();
    assert!(answer["answer"].as_str().unwrap().contains("doc1.pdf"));

    let view: Value = server
        .client
        .get(server.url(&format!("/sessions/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(view["last_run_id"], run_id.as_str());
    assert_eq!(view["feedback_widget"]["run_id"], run_id.as_str());
    assert_eq!(
        view["feedback_widget"]["symbols"],
        json!(["😀", "🙂", "😐", "🙁", "😞"])
    );
    assert_eq!(
        view["feedback_widget"]["comment_label"],
        "[Optional] Please provide an explanation"
    );

    // Thumbs symbol while the faces scale is active.
    let resp = server
        .client
        .post(server.url(&format!("/sessions/{}/feedback", id)))
        .json(&json!({"symbol": "👍"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["warning"], "Invalid feedback score.");
    assert!(h.submitted().is_empty());

    let view: Value = server
        .client
        .put(server.url(&format!("/sessions/{}/scale", id)))
        .json(&json!({"scale": "thumbs"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["feedback_widget"]["symbols"], json!(["👍", "👎"]));

    let body: Value = server
        .client
        .post(server.url(&format!("/sessions/{}/feedback", id)))
        .json(&json!({"score": "👍", "text": "spot on"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "recorded");
    assert_eq!(body["score"], 1.0);
    assert_eq!(body["feedback_type"], "thumbs 👍");
    assert_eq!(body["run_id"], run_id.as_str());
    assert_eq!(body["feedback_id"], "fb-1");

    let submitted = h.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].comment.as_deref(), Some("spot on"));
}

#[tokio::test]
async fn test_broken_index_reports_errors() {
    let h = Harness::with_broken_index();
    let server = TestServer::start(&h).await;

    let view = server.open_session().await;
    assert_eq!(view["ready"], false);
    assert_eq!(view["metadata"]["filename"], "doc1.pdf");
    let id = session_id(&view);

    let resp = server
        .client
        .post(server.url(&format!("/sessions/{}/messages", id)))
        .json(&json!({"question": "What was revenue?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invocation");

    let resp = server
        .client
        .put(server.url(&format!("/sessions/{}/selection", id)))
        .json(&json!({"year": "2024", "quarter": "Q1", "file": "doc4"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "configuration");
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;

    let resp = server
        .client
        .get(server.url(&format!("/sessions/{}", uuid::Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let id = session_id(&server.open_session().await);
    let resp = server
        .client
        .delete(server.url(&format!("/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = server
        .client
        .get(server.url(&format!("/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

async fn session_count(server: &TestServer) -> u64 {
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["sessions"].as_u64().unwrap()
}

#[tokio::test]
async fn test_idle_sessions_are_evicted() {
    let h = Harness::new();
    let server = TestServer::start_with(
        &h,
        ServerConfig {
            session_idle_secs: 1,
            sweep_interval_secs: 1,
            ..ServerConfig::default()
        },
    )
    .await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(session_id(&server.open_session().await));
    }
    assert_eq!(session_count(&server).await, 5);

    let mut remaining = 5;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        remaining = session_count(&server).await;
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0, "idle sessions were never evicted");

    let resp = server
        .client
        .get(server.url(&format!("/sessions/{}", ids[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_active_sessions_survive_sweep() {
    let h = Harness::new();
    let server = TestServer::start_with(
        &h,
        ServerConfig {
            session_idle_secs: 3600,
            sweep_interval_secs: 1,
            ..ServerConfig::default()
        },
    )
    .await;

    let id = session_id(&server.open_session().await);
    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;

    let resp = server
        .client
        .get(server.url(&format!("/sessions/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_feedback_without_answer_is_bad_request() {
    let h = Harness::new();
    let server = TestServer::start(&h).await;
    let id = session_id(&server.open_session().await);

    let resp = server
        .client
        .post(server.url(&format!("/sessions/{}/feedback", id)))
        .json(&json!({"symbol": "😀"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
