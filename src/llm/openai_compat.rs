//! OpenAI-compatible HTTP client (LM Studio, llama.cpp server, hosted APIs).

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{ChatMessage, ModelClient};
use crate::log_debug;

#[derive(Debug, Clone)]
pub struct OpenAiCompatOptions {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for OpenAiCompatOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: None,
            model: "gpt-oss-20b".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            request_timeout: Duration::from_millis(60_000),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
    temperature: f32,
    max_output_tokens: u32,
}

pub struct OpenAiCompatClient {
    http: reqwest::blocking::Client,
    options: OpenAiCompatOptions,
}

impl OpenAiCompatClient {
    pub fn new(options: OpenAiCompatOptions) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, options })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), path)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.endpoint(path);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = self.options.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }
        response
            .json::<Value>()
            .with_context(|| format!("{url} returned invalid JSON"))
    }

    fn chat_completions(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.options.model,
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            stream: false,
        };
        let value = self.post_json("chat/completions", &body)?;
        extract_reply(&value).ok_or_else(|| anyhow!("chat/completions returned no content"))
    }

    fn responses(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ResponsesRequest {
            model: &self.options.model,
            input: flatten_messages(messages),
            temperature: self.options.temperature,
            max_output_tokens: self.options.max_tokens,
        };
        let value = self.post_json("responses", &body)?;
        extract_reply(&value).ok_or_else(|| anyhow!("responses returned no content"))
    }
}

impl ModelClient for OpenAiCompatClient {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self.chat_completions(messages) {
            Ok(reply) => Ok(reply),
            Err(err) => {
                log_debug(&format!("llm: chat/completions unusable ({err:#}); trying /responses"));
                self.responses(messages)
                    .map_err(|fallback| anyhow!("{err:#}; {fallback:#}"))
            }
        }
    }
}

/// `role: content` lines, one message per line.
pub(crate) fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pull reply text out of either the chat-completions or the responses shape.
pub(crate) fn extract_reply(value: &Value) -> Option<String> {
    let first_choice = value.get("choices").and_then(|c| c.get(0));
    if let Some(choice) = first_choice {
        if let Some(text) = non_empty(choice.get("message").and_then(|m| m.get("content"))) {
            return Some(text);
        }
        if let Some(text) = non_empty(choice.get("text")) {
            return Some(text);
        }
    }
    if let Some(text) = non_empty(value.get("output_text")) {
        return Some(text);
    }
    // responses API: output[].content[] items of type output_text
    let parts: Vec<String> = value
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| non_empty(part.get("text")))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
