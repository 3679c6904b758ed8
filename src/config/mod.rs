// src/config/mod.rs
// Configuration: config file, credentials, per-request options

pub mod env;
pub mod file;
pub mod options;

pub use env::{ApiKey, KeySource, API_KEY_ENV};
pub use file::GishConfig;
pub use options::{parse_extra, ExtraParams, RequestOptions};
