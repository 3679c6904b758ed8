//! Interactive mode
//!
//! Line editing with persistent input history, command completion, and a chat
//! mode where every request continues the latest exchange.

pub mod commands;
pub mod helper;

use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::cli::App;
use crate::config::RequestOptions;
use crate::display;
use crate::error::{GishError, Result};
use crate::session::RequestMode;

use commands::{HELP, ReplCommand};
use helper::{CHAT_PROMPT, GishHelper, PROMPT};

pub const BANNER: &str = "Type help for help. Control-D to exit, control-c to abort the current line.";

/// What the loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    editor: Editor<GishHelper, DefaultHistory>,
    app: App,
    options: RequestOptions,
    chat_mode: bool,
    history_path: PathBuf,
}

impl Repl {
    pub fn new(app: App, options: RequestOptions, history_path: PathBuf) -> Result<Self> {
        let mut editor = Editor::new().map_err(|e| GishError::Config(format!("cannot start line editor: {}", e)))?;
        editor.set_helper(Some(GishHelper::new()));

        Ok(Self {
            editor,
            app,
            options,
            chat_mode: false,
            history_path,
        })
    }

    fn load_history(&mut self) {
        if self.history_path.exists() {
            if let Err(e) = self.editor.load_history(&self.history_path) {
                warn!(path = %self.history_path.display(), error = %e, "Failed to load input history");
            }
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            warn!(path = %self.history_path.display(), error = %e, "Failed to save input history");
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.load_history();
        println!("{}", BANNER);

        loop {
            let prompt = if self.chat_mode { CHAT_PROMPT } else { PROMPT };
            let line = match self.editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("{}", display::error(&format!("Input error: {}", e)));
                    break;
                }
            };

            let command = ReplCommand::parse(&line);
            if command == ReplCommand::Empty {
                continue;
            }
            let _ = self.editor.add_history_entry(line.trim());

            if self.handle(command).await == Flow::Quit {
                break;
            }
        }

        println!("Goodbye!");
        self.save_history();
        Ok(())
    }

    async fn handle(&mut self, command: ReplCommand) -> Flow {
        debug!(command = ?command, chat_mode = self.chat_mode, "REPL command");
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Exit if self.chat_mode => self.chat_mode = false,
            ReplCommand::Exit => return Flow::Quit,
            ReplCommand::Chat(first) => {
                self.chat_mode = true;
                if let Some(text) = first {
                    self.submit(&text, RequestMode::Ask).await;
                }
            }
            ReplCommand::History(n) => {
                if let Err(e) = self.app.show_history(n) {
                    eprintln!("{}", display::error(&e.to_string()));
                }
            }
            ReplCommand::Input(file) => self.submit(&file, RequestMode::File).await,
            ReplCommand::Ask(text) => self.submit(&text, RequestMode::Ask).await,
            ReplCommand::Usage(message) => eprintln!("{}", display::error(&message)),
        }
        Flow::Continue
    }

    /// Options for the next request; chat mode continues the latest exchange
    /// once there is one.
    fn next_options(&self) -> Result<RequestOptions> {
        if self.chat_mode && !self.app.session().history().is_empty()? {
            Ok(self.options.continuing(-1))
        } else {
            Ok(self.options.clone())
        }
    }

    async fn submit(&mut self, input: &str, mode: RequestMode) {
        let result = match self.next_options() {
            Ok(options) => self.app.run_request(input, mode, &options).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            eprintln!("{}", display::error(&e.to_string()));
        }
    }
}
