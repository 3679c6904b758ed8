// src/transport/mod.rs
// Transport boundary: conversation in, text+usage or a delta stream out

pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::config::ExtraParams;
use crate::error::Result;
use crate::message::Message;
use crate::stream::StreamEvent;

pub use openai::OpenAiTransport;

/// Boxed stream of response events
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// One call to the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub extra_params: ExtraParams,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            extra_params: ExtraParams::new(),
        }
    }

    pub fn with_extra(mut self, extra_params: ExtraParams) -> Self {
        self.extra_params = extra_params;
        self
    }

    /// All message contents joined, used for token estimates
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Full (non-streamed) response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub text: String,
    pub usage: Option<u64>,
}

/// Generation service client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Single request, single response
    async fn complete(&self, request: &ChatRequest) -> Result<Completion>;

    /// Single request, incremental response
    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
