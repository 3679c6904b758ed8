// src/main.rs
// gish binary: environment, logging, then the CLI runner

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use gish::cli::{self, Cli};
use gish::config::GishConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env from ~/.gish/.env, then the current dir
    let env_path = GishConfig::config_dir().join(".env");
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only replies
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    cli::run(args).await?;
    Ok(())
}
