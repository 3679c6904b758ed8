// src/session.rs
// Session orchestration: BUILD -> DISPATCH -> (STREAMING | DIRECT) -> FINALIZE

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RequestOptions;
use crate::directives::DirectiveExpander;
use crate::display::{self, WaitingIndicator};
use crate::error::{GishError, Result};
use crate::history::{Exchange, HistoryStore, RecentHistory};
use crate::message::{Message, Role};
use crate::pricing::{Cost, PriceTable, estimate_tokens};
use crate::reconcile::OutputReconciler;
use crate::stream::{NullSink, StdoutSink, consume_stream};
use crate::transport::{ChatRequest, Completion, Transport};
use crate::utils::expand_home;

/// Prefix marking a reply that stands in for a failed transport call
pub const ERROR_PREFIX: &str = "Error:";

/// How the request text was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// The text is the request
    Ask,
    /// The text names a file holding the request
    File,
}

/// Completed request cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Trimmed response text, or `Error: ...` when the transport failed
    pub text: String,
    pub tokens: u64,
    pub cost: Cost,
    /// Wall-clock seconds
    pub duration: f64,
    /// `#diff` paths from the request, in first-seen order
    pub diff_candidates: Vec<PathBuf>,
    pub is_error: bool,
}

impl Reply {
    /// `Tokens: N Cost: $C Elapsed: S Seconds`, tokens and cost omitted when zero
    pub fn metrics_line(&self) -> String {
        if self.tokens == 0 {
            return format!("Elapsed: {} Seconds", self.duration);
        }
        let cost = match self.cost {
            Cost::Dollars(_) => format!("${}", self.cost),
            Cost::Unavailable => self.cost.to_string(),
        };
        format!(
            "Tokens: {} Cost: {} Elapsed: {} Seconds",
            self.tokens, cost, self.duration
        )
    }
}

/// Result of [`Session::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `dry_run` was set: the assembled messages, nothing sent or recorded
    DryRun(Vec<Message>),
    Reply(Reply),
}

/// Runs request cycles against one transport and one history store
pub struct Session {
    transport: Arc<dyn Transport>,
    history: HistoryStore,
    expander: DirectiveExpander,
    prices: PriceTable,
    /// Print replies and the waiting indicator to the terminal
    echo: bool,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, history: HistoryStore) -> Self {
        Self {
            transport,
            history,
            expander: DirectiveExpander::new(),
            prices: PriceTable::new(),
            echo: false,
        }
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_expander(mut self, expander: DirectiveExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// History-query entry point
    pub fn recent(&self, n: usize) -> Result<RecentHistory> {
        self.history.get_recent_summaries(n)
    }

    /// Request-submission entry point.
    ///
    /// Directive and history-index errors abort before anything is sent. Transport
    /// faults do not: they become an `Error:` reply that is still recorded.
    pub async fn submit(&self, input: &str, mode: RequestMode, options: &RequestOptions) -> Result<Outcome> {
        // BUILD
        let raw = match mode {
            RequestMode::Ask => input.to_string(),
            RequestMode::File => {
                let path = expand_home(input);
                std::fs::read_to_string(&path).map_err(|e| {
                    GishError::Config(format!("cannot read input file {}: {}", path.display(), e))
                })?
            }
        };
        let expansion = self.expander.expand(&raw)?;
        let messages = self.build_messages(expansion.text, options)?;

        if options.dry_run {
            debug!(messages = messages.len(), "Dry run, not dispatching");
            return Ok(Outcome::DryRun(messages));
        }

        let request = ChatRequest::new(options.model.clone(), messages).with_extra(options.extra_params.clone());
        info!(
            model = %request.model,
            streaming = options.streaming,
            continuation = ?options.chat_continuation_index,
            "Dispatching request"
        );

        // DISPATCH
        let started = Instant::now();
        let result = if options.streaming {
            self.dispatch_streaming(&request).await
        } else {
            self.dispatch_direct(&request).await
        };

        // FINALIZE
        let (text, tokens, is_error) = match result {
            Ok(completion) => {
                let text = completion.text.trim().to_string();
                let tokens = match completion.usage {
                    Some(usage) => usage,
                    None if options.streaming => {
                        estimate_tokens(&request.prompt_text()) + estimate_tokens(&text)
                    }
                    None => 0,
                };
                (text, tokens, false)
            }
            Err(e) => {
                warn!(transport = self.transport.name(), error = %e, "Request failed");
                (format!("{} {}", ERROR_PREFIX, fault_message(&e)), 0, true)
            }
        };
        let duration = started.elapsed().as_millis() as f64 / 1000.0;
        let cost = self.prices.cost(&request.model, tokens);

        if self.echo && is_error {
            eprintln!("{}", display::error(&text));
        }

        let mut messages = request.messages;
        messages.push(Message::assistant(text.clone()));
        self.history.append(Exchange {
            messages,
            timestamp: Utc::now(),
            tokens,
            cost: cost.to_string(),
            duration,
        })?;

        info!(tokens, cost = %cost, duration, is_error, "Request finished");
        Ok(Outcome::Reply(Reply {
            text,
            tokens,
            cost,
            duration,
            diff_candidates: expansion.diff_candidates,
            is_error,
        }))
    }

    fn build_messages(&self, text: String, options: &RequestOptions) -> Result<Vec<Message>> {
        let mut messages = match options.chat_continuation_index {
            Some(index) => self.history.get_messages(index)?,
            None => Vec::new(),
        };

        if let Some(prompt_file) = &options.prompt_file {
            let has_system = messages.first().is_some_and(|m| m.role == Role::System);
            if !has_system {
                let prompt = read_prompt(prompt_file)?;
                messages.insert(0, Message::system(prompt));
            }
        }

        messages.push(Message::user(text));
        Ok(messages)
    }

    async fn dispatch_streaming(&self, request: &ChatRequest) -> Result<Completion> {
        let stream = self.transport.stream(request);

        let outcome = if self.echo {
            let indicator = WaitingIndicator::start("waiting for response");
            let stream = stream.await?;
            let mut sink = StdoutSink::new();
            consume_stream(stream, &mut sink, Some(indicator.dismisser())).await?
        } else {
            let stream = stream.await?;
            consume_stream(stream, &mut NullSink, None::<fn()>).await?
        };

        Ok(Completion {
            text: outcome.text,
            usage: outcome.usage,
        })
    }

    async fn dispatch_direct(&self, request: &ChatRequest) -> Result<Completion> {
        if !self.echo {
            return self.transport.complete(request).await;
        }

        let indicator = WaitingIndicator::start("waiting for response");
        let completion = self.transport.complete(request).await;
        indicator.dismiss();

        let completion = completion?;
        println!("{}", display::reply(completion.text.trim()));
        Ok(completion)
    }
}

fn read_prompt(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|p| p.trim().to_string())
        .map_err(|e| GishError::Config(format!("cannot read prompt file {}: {}", path.display(), e)))
}

fn fault_message(err: &GishError) -> String {
    match err {
        GishError::Transport(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Save/reconcile entry point.
///
/// Error replies are never saved. The diff target is `options.diff_target` when
/// set, otherwise the first `#diff` candidate.
pub fn save_reply(
    reconciler: &OutputReconciler,
    reply: &Reply,
    options: &RequestOptions,
) -> Result<Option<SavedReply>> {
    if reply.is_error {
        debug!("Not saving error reply");
        return Ok(None);
    }
    let diff_target = options
        .diff_target
        .clone()
        .or_else(|| reply.diff_candidates.first().cloned());

    let written = reconciler.save(
        &reply.text,
        diff_target.as_deref(),
        options.explicit_save_target.as_deref(),
    )?;
    Ok(Some(SavedReply { written, diff_target }))
}

/// Where a reply was written and what it reconciles against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReply {
    pub written: PathBuf,
    pub diff_target: Option<PathBuf>,
}
