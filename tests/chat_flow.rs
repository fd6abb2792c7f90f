//! End-to-end tests for the HTTP chat API.
//!
//! Spawns the `docbot serve` binary against mocked embedding and
//! completion upstreams (httpmock) and drives the API with a blocking
//! HTTP client.

use httpmock::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

// target/debug/deps/<test binary> -> target/debug/docbot
fn docbot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("docbot")
}

/// Kills the spawned server when the test ends, pass or fail.
struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TestServer {
    _tmp: TempDir,
    _guard: ServerGuard,
    base_url: String,
}

/// Write a config pointing both providers at `llm_url`/`embed`, spawn
/// `docbot serve` on `port`, and wait until `/health` responds.
fn start_server(port: u16, llm_url: &str, embedding: Option<&str>, with_docs: bool) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    if with_docs {
        let docs_dir = root.join("docs");
        fs::create_dir_all(&docs_dir).unwrap();
        fs::write(
            docs_dir.join("policy.txt"),
            "Vacation policy: twenty days of paid leave per year.\n\nExpense policy: all claims require an itemized receipt.",
        )
        .unwrap();
    }

    let embedding_section = match embedding {
        Some(url) => format!(
            r#"[embedding]
provider = "ollama"
model = "test-embed"
dims = 3
url = "{}"
timeout_secs = 5
"#,
            url
        ),
        None => String::new(),
    };

    let config_content = format!(
        r#"[db]
path = "{root}/data/docbot.sqlite"

[docs]
root = "{root}/docs"

[retrieval]
top_k = 3

{embedding_section}
[llm]
provider = "ollama"
model = "test-model"
url = "{llm_url}"
timeout_secs = 5

[server]
bind = "127.0.0.1:{port}"
"#,
        root = root.display(),
        embedding_section = embedding_section,
        llm_url = llm_url,
        port = port
    );

    let config_path = root.join("config").join("docbot.toml");
    fs::write(&config_path, config_content).unwrap();

    let child = Command::new(docbot_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn docbot serve");

    let base_url = format!("http://127.0.0.1:{}", port);
    let guard = ServerGuard(child);

    for attempt in 0..100 {
        if let Ok(resp) = reqwest::blocking::get(format!("{}/health", base_url)) {
            if resp.status().is_success() {
                return TestServer {
                    _tmp: tmp,
                    _guard: guard,
                    base_url,
                };
            }
        }
        if attempt == 99 {
            panic!("server did not become healthy on {}", base_url);
        }
        sleep(Duration::from_millis(100));
    }
    unreachable!()
}

fn post_chat(base_url: &str, session_id: &str, message: &str) -> reqwest::blocking::Response {
    reqwest::blocking::Client::new()
        .post(format!("{}/chat", base_url))
        .json(&serde_json::json!({ "session_id": session_id, "message": message }))
        .send()
        .unwrap()
}

fn get_history(base_url: &str, session_id: &str) -> serde_json::Value {
    reqwest::blocking::get(format!("{}/chat/history/{}", base_url, session_id))
        .unwrap()
        .json()
        .unwrap()
}

fn ollama_chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

#[test]
fn test_chat_empty_index_uses_sentinel_and_records_history() {
    let mock = MockServer::start();
    let chat_mock = mock.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_chat_reply("Canned reply."));
    });

    let server = start_server(7651, &mock.base_url(), None, false);

    let resp = post_chat(&server.base_url, "s1", "Hello there");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["reply"], "Canned reply.");
    assert_eq!(body["context_used"], "No relevant context found.");
    chat_mock.assert();

    let history = get_history(&server.base_url, "s1");
    assert_eq!(history["session_id"], "s1");
    let turns = history["history"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["content"], "Hello there");
    assert_eq!(turns[1]["role"], "assistant");
    assert_eq!(turns[1]["content"], "Canned reply.");

    // Clear, then read back empty
    let resp = reqwest::blocking::Client::new()
        .delete(format!("{}/chat/history/s1", server.base_url))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["message"], "Session s1 cleared.");

    let history = get_history(&server.base_url, "s1");
    assert!(history["history"].as_array().unwrap().is_empty());
}

#[test]
fn test_second_call_threads_history_to_model() {
    let mock = MockServer::start();

    let mut first = mock.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_chat_reply("Reply one."));
    });

    let server = start_server(7652, &mock.base_url(), None, false);

    let resp = post_chat(&server.base_url, "s1", "First question");
    assert_eq!(resp.status(), 200);
    first.assert();
    first.delete();

    // The second model call must carry the first exchange as history.
    let threaded = mock.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .body_includes("First question")
            .body_includes("Reply one.");
        then.status(200).json_body(ollama_chat_reply("Reply two."));
    });

    let resp = post_chat(&server.base_url, "s1", "Second question");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["reply"], "Reply two.");
    threaded.assert();

    let history = get_history(&server.base_url, "s1");
    let turns = history["history"].as_array().unwrap();
    let contents: Vec<&str> = turns.iter().map(|t| t["content"].as_str().unwrap()).collect();
    assert_eq!(
        contents,
        vec!["First question", "Reply one.", "Second question", "Reply two."]
    );
}

#[test]
fn test_chat_with_indexed_context() {
    let mock = MockServer::start();

    // One vector per paragraph at ingest time; the first vector doubles as
    // the query embedding (embed_query takes the first row).
    let _embed_mock = mock.mock(|when, then| {
        when.method(POST).path("/api/embed");
        then.status(200)
            .json_body(serde_json::json!({ "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] }));
    });
    let _chat_mock = mock.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_chat_reply("Twenty days."));
    });

    let server = start_server(7653, &mock.base_url(), Some(&mock.base_url()), true);

    let resp = post_chat(&server.base_url, "s1", "How many leave days?");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["reply"], "Twenty days.");

    let context = body["context_used"].as_str().unwrap();
    assert!(context.contains("[Source: policy.txt]"), "got: {}", context);
    assert!(context.contains("Vacation policy"), "got: {}", context);
    assert_ne!(context, "No relevant context found.");
}

#[test]
fn test_model_failure_maps_to_upstream_error() {
    // Point the LLM at a port nothing listens on.
    let server = start_server(7654, "http://127.0.0.1:1", None, false);

    let resp = post_chat(&server.base_url, "s1", "Hello?");
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");

    // The failed exchange must not be recorded.
    let history = get_history(&server.base_url, "s1");
    assert!(history["history"].as_array().unwrap().is_empty());
}

#[test]
fn test_chat_rejects_blank_message() {
    let mock = MockServer::start();
    let chat_mock = mock.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(ollama_chat_reply("unused"));
    });

    let server = start_server(7655, &mock.base_url(), None, false);

    let resp = post_chat(&server.base_url, "s1", "   ");
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(chat_mock.hits(), 0);

    let resp = post_chat(&server.base_url, "", "hi");
    assert_eq!(resp.status(), 400);
}
