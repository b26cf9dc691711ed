//! Chat-completion client with incremental token streaming.
//!
//! Builds the message list (system prompt, prior turns, then the composed
//! user message), posts it to an OpenAI-compatible `/chat/completions`
//! endpoint with `stream: true`, and exposes the response as an
//! [`AnswerStream`]: a lazy, finite, non-restartable sequence of text
//! fragments. Consuming it to exhaustion yields the full answer; dropping
//! it early closes the underlying connection, which is all the server
//! needs to know about a cancellation.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::history::Turn;
use crate::session::SessionSettings;

pub struct ChatClient {
    client: reqwest::Client,
    url: String,
    model: String,
    system_prompt: String,
    prompt_template: String,
    default_temperature: f64,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        // Connect fast or fail; leave generous room for slow generation.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/chat/completions",
                config.endpoint.trim_end_matches('/')
            ),
            model: config.chat_model.clone(),
            system_prompt: config.system_prompt.clone(),
            prompt_template: config.prompt_template.clone(),
            default_temperature: config.temperature,
        })
    }

    /// Send a question with its retrieved context and conversation history;
    /// returns the token stream of the answer.
    pub async fn ask(
        &self,
        history: &[Turn],
        rag_context: &str,
        question: &str,
        settings: &SessionSettings,
    ) -> Result<AnswerStream> {
        let messages = self.build_messages(history, rag_context, question);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": settings.temperature_or(self.default_temperature),
            "stream": true,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Connection error to LLM server at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM server returned {}: {}", status, detail);
        }

        Ok(AnswerStream {
            response,
            buf: String::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn build_messages(
        &self,
        history: &[Turn],
        rag_context: &str,
        question: &str,
    ) -> Vec<serde_json::Value> {
        let user_prompt = self
            .prompt_template
            .replace("{context}", rag_context)
            .replace("{question}", question);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": self.system_prompt,
        }));
        for turn in history {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": user_prompt,
        }));
        messages
    }
}

/// Incremental answer tokens from one chat-completion request.
///
/// Finite and non-restartable: once [`next_token`](Self::next_token)
/// returns `Ok(None)` the answer is complete. Dropping the stream aborts
/// the request and closes the connection.
pub struct AnswerStream {
    response: reqwest::Response,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

impl AnswerStream {
    /// Next text fragment, or `None` when the server sent its end marker
    /// (or closed the stream).
    pub async fn next_token(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            if self.done {
                return Ok(None);
            }

            let chunk = self
                .response
                .chunk()
                .await
                .context("LLM stream interrupted")?;

            let Some(bytes) = chunk else {
                self.done = true;
                continue;
            };
            self.buf.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = self.buf.find('\n') {
                let line: String = self.buf.drain(..=newline).collect();
                match parse_sse_line(line.trim_end()) {
                    SseEvent::Token(token) => self.pending.push_back(token),
                    SseEvent::Done => {
                        self.done = true;
                        break;
                    }
                    SseEvent::Ignore => {}
                }
            }
        }
    }
}

enum SseEvent {
    Token(String),
    Done,
    Ignore,
}

/// Decode one server-sent-events line from a streamed completion.
/// Anything that is not a well-formed `data:` payload is ignored rather
/// than aborting the stream.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let payload = payload.trim();

    if payload == "[DONE]" {
        return SseEvent::Done;
    }

    let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) else {
        return SseEvent::Ignore;
    };

    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| SseEvent::Token(s.to_string()))
        .unwrap_or(SseEvent::Ignore)
}
