// src/lib.rs
// gish - conversational client for chat-completion services

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod directives;
pub mod display;
pub mod error;
pub mod external;
pub mod history;
pub mod message;
pub mod pricing;
pub mod reconcile;
pub mod repl;
pub mod session;
pub mod stream;
pub mod transport;
pub mod utils;

pub use error::{GishError, Result};
