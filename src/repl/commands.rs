//! Interactive command parsing

/// Summaries shown by `history` without an argument
pub const DEFAULT_HISTORY_COUNT: usize = 10;

pub const HELP: &str = "Available commands: help, chat, exit, history, input.
  help           show this help
  chat [text]    start a chat session: each request carries the previous exchange
  exit           in chat mode, leave chat mode; otherwise exit the program
  history [N]    show the last N requests (default 10)
  input <file>   send the contents of a file
Anything else is sent as a request. Control-D exits.";

/// One parsed interactive line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Help,
    /// Enter chat mode, optionally sending a first request
    Chat(Option<String>),
    Exit,
    History(usize),
    Input(String),
    Ask(String),
    /// Recognized command used wrongly
    Usage(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match command.to_lowercase().as_str() {
            "help" => Self::Help,
            "exit" => Self::Exit,
            "chat" if rest.is_empty() => Self::Chat(None),
            "chat" => Self::Chat(Some(rest.to_string())),
            "history" if rest.is_empty() => Self::History(DEFAULT_HISTORY_COUNT),
            "history" => match rest.parse() {
                Ok(n) => Self::History(n),
                Err(_) => Self::Usage(format!("history expects a number, got '{}'", rest)),
            },
            "input" if rest.is_empty() => Self::Usage("Need input file name in input command".into()),
            "input" => Self::Input(rest.to_string()),
            _ => Self::Ask(trimmed.to_string()),
        }
    }
}
