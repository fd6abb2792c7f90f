//! Chat-completion provider clients.
//!
//! Thin, non-streaming clients for hosted language-model APIs:
//! - **openai** — any OpenAI-compatible `POST /v1/chat/completions`
//!   endpoint, key from `OPENAI_API_KEY`.
//! - **ollama** — a local or remote Ollama instance's `POST /api/chat`.
//!
//! Both providers receive the same message sequence: the system prompt,
//! the session's prior turns, and finally the augmented user message.
//! A failed call surfaces as a single error; there is no retry, backoff,
//! or partial-response handling.

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::Turn;

/// Fallback system prompt when no prompt file is configured or readable.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful company assistant.";

/// A provider-agnostic chat message on the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Load the system prompt from the configured file, falling back to
/// [`DEFAULT_SYSTEM_PROMPT`] when the path is unset or unreadable.
pub fn load_system_prompt(config: &LlmConfig) -> String {
    match &config.system_prompt_path {
        Some(path) => std::fs::read_to_string(path)
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    }
}

/// Assemble the wire message sequence: system prompt, prior turns in
/// order, then the augmented user message.
pub fn build_messages(system_prompt: &str, history: &[Turn], message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    for turn in history {
        messages.push(ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: message.to_string(),
    });
    messages
}

/// Send a completion request to the configured provider and return the
/// reply text verbatim.
pub async fn complete(
    config: &LlmConfig,
    system_prompt: &str,
    history: &[Turn],
    message: &str,
) -> Result<String> {
    let messages = build_messages(system_prompt, history, message);

    match config.provider.as_str() {
        "openai" => complete_openai(config, &messages).await,
        "ollama" => complete_ollama(config, &messages).await,
        other => bail!("Unknown llm provider: {}", other),
    }
}

async fn complete_openai(config: &LlmConfig, messages: &[ChatMessage]) -> Result<String> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let url = config.url.as_deref().unwrap_or("https://api.openai.com");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut body = serde_json::json!({
        "model": config.model,
        "messages": messages,
    });
    if let Some(t) = config.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    if let Some(m) = config.max_tokens {
        body["max_tokens"] = serde_json::json!(m);
    }

    let response = client
        .post(format!(
            "{}/v1/chat/completions",
            url.trim_end_matches('/')
        ))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("LLM API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    parse_openai_completion(&json)
}

/// Parse the reply text from an OpenAI chat-completions response.
fn parse_openai_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid LLM response: missing choices[0].message.content"))
}

async fn complete_ollama(config: &LlmConfig, messages: &[ChatMessage]) -> Result<String> {
    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut options = serde_json::Map::new();
    if let Some(t) = config.temperature {
        options.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(m) = config.max_tokens {
        options.insert("num_predict".to_string(), serde_json::json!(m));
    }

    let body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "stream": false,
        "options": options,
    });

    let response = client
        .post(format!("{}/api/chat", url.trim_end_matches('/')))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Ollama connection error (is Ollama running at {}?): {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Ollama API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    parse_ollama_completion(&json)
}

/// Parse the reply text from an Ollama `/api/chat` response.
fn parse_ollama_completion(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}
