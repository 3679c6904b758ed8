// src/cli.rs
// Command-line surface and the request runner shared with the REPL

use async_trait::async_trait;
use clap::Parser;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ApiKey, GishConfig, RequestOptions, parse_extra};
use crate::display;
use crate::error::{GishError, Result};
use crate::external::{self, EditOutcome};
use crate::history::HistoryStore;
use crate::pricing::PriceTable;
use crate::reconcile::OutputReconciler;
use crate::repl::Repl;
use crate::repl::commands::DEFAULT_HISTORY_COUNT;
use crate::session::{Outcome, Reply, RequestMode, Session, save_reply};
use crate::transport::{ChatRequest, Completion, DeltaStream, OpenAiTransport, Transport};
use crate::utils::temp_file_base;

#[derive(Parser, Debug, Default)]
#[command(name = "gish")]
#[command(version, about = "Send requests to a chat-completion service from the command line")]
pub struct Cli {
    /// Edit a request file in $EDITOR and send it (temp file when FILE is omitted)
    #[arg(short, long, value_name = "FILE")]
    pub edit: Option<Option<PathBuf>>,

    /// Read the request from a file; the reply is saved to disk
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Model id
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt file
    #[arg(short, long, value_name = "FILE")]
    pub prompt: Option<PathBuf>,

    /// Extra request fields, e.g. '"max_tokens":10,"temperature":0.5'
    #[arg(long, value_name = "JSON")]
    pub extra: Option<String>,

    /// Print the assembled messages without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Continue the conversation at this history index (-1 is the latest)
    #[arg(short, long, value_name = "INDEX", allow_negative_numbers = true)]
    pub chat: Option<i64>,

    /// Save the reply to this file
    #[arg(short, long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Run the diff tool on the #diff file and the saved reply
    #[arg(short, long)]
    pub diff: bool,

    /// Reconcile against this file instead of the first #diff candidate
    #[arg(long, value_name = "FILE")]
    pub diff_target: Option<PathBuf>,

    /// Show the last N requests (default 10)
    #[arg(long, value_name = "N")]
    pub history: Option<Option<usize>>,

    /// Write named code blocks from the reply into DIR
    #[arg(long, value_name = "DIR")]
    pub extract: Option<PathBuf>,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request text
    #[arg(trailing_var_arg = true)]
    pub request: Vec<String>,
}

impl Cli {
    /// Options record for this invocation: flags over config defaults
    pub fn request_options(&self, config: &GishConfig) -> Result<RequestOptions> {
        let mut options = RequestOptions::from_config(config);
        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        if let Some(prompt) = &self.prompt {
            options.prompt_file = Some(prompt.clone());
        }
        if let Some(extra) = &self.extra {
            options.extra_params = parse_extra(extra)?;
        }
        if self.no_stream {
            options.streaming = false;
        }
        options.dry_run = self.dry_run;
        options.chat_continuation_index = self.chat;
        options.explicit_save_target = self.save.clone();
        options.diff_target = self.diff_target.clone();
        Ok(options)
    }

    fn has_request_source(&self) -> bool {
        !self.request.is_empty() || self.input.is_some() || self.edit.is_some()
    }
}

/// Session plus everything needed to present and route its replies
pub struct App {
    session: Session,
    reconciler: OutputReconciler,
    diff_command: String,
    run_diff: bool,
    extract_dir: Option<PathBuf>,
}

impl App {
    pub fn new(config: &GishConfig, transport: Arc<dyn Transport>) -> Self {
        let session = Session::new(transport, HistoryStore::new(config.history_path()))
            .with_prices(PriceTable::with_overrides(config.pricing.clone()))
            .with_echo(true);
        Self {
            session,
            reconciler: OutputReconciler::from_config(config),
            diff_command: config.diff_command(),
            run_diff: false,
            extract_dir: None,
        }
    }

    pub fn with_diff(mut self, enabled: bool) -> Self {
        self.run_diff = enabled;
        self
    }

    pub fn with_extract_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.extract_dir = dir;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Submit, print metrics, then save, diff and extract as requested.
    ///
    /// Failures after the reply is shown are reported but not returned, since the
    /// reply is already on screen and in history.
    pub async fn run_request(&self, input: &str, mode: RequestMode, options: &RequestOptions) -> Result<()> {
        let reply = match self.session.submit(input, mode, options).await? {
            Outcome::DryRun(messages) => {
                println!("{}", serde_json::to_string_pretty(&messages)?);
                return Ok(());
            }
            Outcome::Reply(reply) => reply,
        };
        println!("{}", display::status(&reply.metrics_line()));

        if reply.is_error {
            return Ok(());
        }
        if mode == RequestMode::File || options.explicit_save_target.is_some() {
            self.save(&reply, options).await;
        }
        if let Some(dir) = &self.extract_dir {
            match self.reconciler.extract_files(&reply.text, dir) {
                Ok(paths) => {
                    for path in paths {
                        println!("{}", display::status(&format!("Extracted {}", path.display())));
                    }
                }
                Err(e) => eprintln!("{}", display::error(&e.to_string())),
            }
        }
        Ok(())
    }

    async fn save(&self, reply: &Reply, options: &RequestOptions) {
        let saved = match save_reply(&self.reconciler, reply, options) {
            Ok(Some(saved)) => saved,
            Ok(None) => return,
            Err(e) => {
                eprintln!("{}", display::error(&format!("Could not save reply: {}", e)));
                return;
            }
        };
        println!("{}", display::status(&format!("Saved to file {}", saved.written.display())));

        if !self.run_diff {
            return;
        }
        let Some(original) = saved.diff_target else {
            println!("{}", display::warning("No #diff file in the request, skipping diff"));
            return;
        };
        println!("running diff on: {} {}", original.display(), saved.written.display());
        match external::run_diff(&self.diff_command, &original, &saved.written).await {
            Ok(status) if !status.success() => debug!(status = %status, "Diff tool exited non-zero"),
            Ok(_) => {}
            Err(e) => eprintln!("{}", display::error(&e.to_string())),
        }
    }

    pub fn show_history(&self, n: usize) -> Result<()> {
        show_history(self.session.history(), n)
    }
}

/// Print the last `n` request summaries with their absolute indices
pub fn show_history(store: &HistoryStore, n: usize) -> Result<()> {
    let recent = store.get_recent_summaries(n)?;
    if recent.summaries.is_empty() {
        println!("{}", display::warning("No history yet"));
        return Ok(());
    }
    for summary in &recent.summaries {
        println!("{} {}", display::index(summary.index), summary.text);
    }
    println!(
        "{}",
        display::status(&format!("{} of {} exchanges shown", recent.summaries.len(), recent.total))
    );
    Ok(())
}

/// Read stdin when it is piped; a terminal yields nothing
fn piped_input() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(buffer.trim().to_string())
}

/// Stands in for the service on dry runs, where nothing is dispatched
struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn complete(&self, _request: &ChatRequest) -> Result<Completion> {
        Err(GishError::Transport("dry run: nothing is sent".into()))
    }

    async fn stream(&self, _request: &ChatRequest) -> Result<DeltaStream> {
        Err(GishError::Transport("dry run: nothing is sent".into()))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

/// Service client for this invocation. Dry runs never dispatch, so they skip
/// API-key resolution.
fn transport_for(cli: &Cli, config: &GishConfig, options: &RequestOptions) -> Result<Arc<dyn Transport>> {
    if options.dry_run {
        debug!("Dry run, using offline transport");
        return Ok(Arc::new(OfflineTransport));
    }
    let api_key = ApiKey::resolve(cli.api_key.as_deref())?;
    Ok(Arc::new(OpenAiTransport::new(config.api.base_url.clone(), api_key)))
}

/// Entry point behind `main`
pub async fn run(cli: Cli) -> Result<()> {
    let config = GishConfig::load();

    if let Some(n) = cli.history {
        return show_history(&HistoryStore::new(config.history_path()), n.unwrap_or(DEFAULT_HISTORY_COUNT));
    }

    let options = cli.request_options(&config)?;
    let piped = if cli.has_request_source() {
        String::new()
    } else {
        piped_input()?
    };

    let transport = transport_for(&cli, &config, &options)?;
    let app = App::new(&config, transport)
        .with_diff(cli.diff)
        .with_extract_dir(cli.extract.clone());

    if let Some(input) = &cli.input {
        return app
            .run_request(&input.to_string_lossy(), RequestMode::File, &options)
            .await;
    }

    if let Some(edit) = &cli.edit {
        let path = edit
            .clone()
            .unwrap_or_else(|| temp_file_base(&std::env::temp_dir()).with_extension("txt"));
        return match external::edit_request(&config.editor(), &path).await? {
            EditOutcome::Ready(path) => {
                app.run_request(&path.to_string_lossy(), RequestMode::File, &options)
                    .await
            }
            EditOutcome::NotSent(reason) => {
                println!("Not sending: {}", reason);
                Ok(())
            }
        };
    }

    if !cli.request.is_empty() {
        return app
            .run_request(&cli.request.join(" "), RequestMode::Ask, &options)
            .await;
    }

    if !piped.is_empty() {
        return app.run_request(&piped, RequestMode::Ask, &options).await;
    }

    if std::io::stdin().is_terminal() {
        let mut repl = Repl::new(app, options, config.input_history_path())?;
        return repl.run().await;
    }

    warn!("Empty request on stdin");
    Err(GishError::Config("Need request to send".into()))
}
