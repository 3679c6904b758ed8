// tests/common/mod.rs
// Scripted in-memory transport and session setup for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use gish::directives::DirectiveExpander;
use gish::error::{GishError, Result};
use gish::history::HistoryStore;
use gish::session::Session;
use gish::stream::StreamEvent;
use gish::transport::{ChatRequest, Completion, DeltaStream, Transport};

/// One scripted response
pub enum Step {
    Complete { text: String, usage: Option<u64> },
    Stream(Vec<StreamStep>),
    /// The call itself fails (connection refused, HTTP 5xx)
    Fail(String),
}

/// One item of a scripted stream
#[derive(Clone)]
pub enum StreamStep {
    Event(StreamEvent),
    Fault(String),
}

impl Step {
    pub fn complete(text: &str, usage: Option<u64>) -> Self {
        Self::Complete {
            text: text.to_string(),
            usage,
        }
    }

    pub fn deltas(parts: &[&str], usage: Option<u64>) -> Self {
        let mut steps: Vec<StreamStep> = parts
            .iter()
            .map(|p| StreamStep::Event(StreamEvent::Delta(p.to_string())))
            .collect();
        steps.push(StreamStep::Event(StreamEvent::Done { usage }));
        Self::Stream(steps)
    }
}

/// Transport that replays a fixed script and records every request
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: &ChatRequest) -> Step {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Fail("script exhausted".into()))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        match self.next_step(request) {
            Step::Complete { text, usage } => Ok(Completion { text, usage }),
            Step::Fail(message) => Err(GishError::Transport(message)),
            Step::Stream(_) => panic!("stream step scripted for a direct call"),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        match self.next_step(request) {
            Step::Stream(steps) => {
                let items: Vec<Result<StreamEvent>> = steps
                    .into_iter()
                    .map(|step| match step {
                        StreamStep::Event(event) => Ok(event),
                        StreamStep::Fault(message) => Err(GishError::Transport(message)),
                    })
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Step::Fail(message) => Err(GishError::Transport(message)),
            Step::Complete { .. } => panic!("direct step scripted for a stream call"),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Session over a temp history file, resolving `~` to the temp dir
pub fn session(dir: &TempDir, transport: Arc<ScriptedTransport>) -> Session {
    Session::new(transport, HistoryStore::new(dir.path().join("history.json")))
        .with_expander(DirectiveExpander::with_home(dir.path()))
}

pub fn history(dir: &TempDir) -> HistoryStore {
    HistoryStore::new(dir.path().join("history.json"))
}
