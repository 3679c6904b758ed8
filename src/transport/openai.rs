// src/transport/openai.rs
// OpenAI-compatible chat completions client

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::sse::{SseStream, parse_sse_line};
use super::{ChatRequest, Completion, DeltaStream, Transport};
use crate::config::ApiKey;
use crate::error::{GishError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Non-streaming response body (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

pub struct OpenAiTransport {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenAiTransport {
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request_id: &str, body: &Value) -> Result<reqwest::Response> {
        debug!(request_id = %request_id, body = %body, "Chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(request_id = %request_id, status = %status, "Chat completion failed");
            return Err(GishError::Transport(format!("API error {}: {}", status, text)));
        }
        Ok(response)
    }
}

/// Request body: extra params plus `{model, messages, stream}`, which always win
pub(crate) fn build_body(request: &ChatRequest, stream: bool) -> Value {
    let mut body = request.extra_params.clone();
    body.insert("model".into(), json!(request.model));
    body.insert("messages".into(), json!(request.messages));
    body.insert("stream".into(), json!(stream));
    Value::Object(body)
}

fn parse_completion(body: &str) -> Result<Completion> {
    let response: ChatCompletionResponse = serde_json::from_str(body)?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GishError::Transport("response contained no choices".into()))?;
    Ok(Completion {
        text,
        usage: response.usage.map(|u| u.total_tokens),
    })
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let request_id = Uuid::new_v4().to_string();
        info!(request_id = %request_id, model = %request.model, messages = request.messages.len(), "Sending request");

        let body = build_body(request, false);
        let response = self.send(&request_id, &body).await?;
        let text = response.text().await?;
        let completion = parse_completion(&text)?;

        info!(request_id = %request_id, tokens = ?completion.usage, "Response received");
        Ok(completion)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let request_id = Uuid::new_v4().to_string();
        info!(request_id = %request_id, model = %request.model, messages = request.messages.len(), "Starting stream");

        let body = build_body(request, true);
        let response = self.send(&request_id, &body).await?;

        let mut lines = SseStream::new(Box::pin(response.bytes_stream()));
        let events = async_stream::stream! {
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        for event in parse_sse_line(&line) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "Stream interrupted");
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(events))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
