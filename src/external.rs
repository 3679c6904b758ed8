// src/external.rs
// Launching the user's editor and diff tool

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{GishError, Result};

/// What happened after the editor closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The file is saved and non-empty; send it as a file-mode request
    Ready(PathBuf),
    /// Nothing will be sent, with the reason
    NotSent(String),
}

/// Split `"code --wait"` into program and leading arguments
fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| GishError::Config("empty external command".into()))?;
    Ok((program, parts.collect()))
}

async fn run_inherited(command: &str, files: &[&Path]) -> Result<ExitStatus> {
    let (program, mut args) = split_command(command)?;
    args.extend(files.iter().map(|f| f.to_string_lossy().to_string()));
    debug!(program = %program, args = ?args, "Spawning external command");

    let status = Command::new(&program)
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| GishError::Config(format!("failed to run {}: {}", program, e)))?;
    Ok(status)
}

/// Open `path` in `editor` and decide whether its contents should be sent
pub async fn edit_request(editor: &str, path: &Path) -> Result<EditOutcome> {
    let status = run_inherited(editor, &[path]).await?;
    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".into());
        return Ok(EditOutcome::NotSent(format!("Non zero exit code: {}", code)));
    }

    match tokio::fs::read_to_string(path).await {
        Ok(contents) if contents.is_empty() => Ok(EditOutcome::NotSent("File is empty".into())),
        Ok(_) => Ok(EditOutcome::Ready(path.to_path_buf())),
        Err(_) => Ok(EditOutcome::NotSent("File not saved".into())),
    }
}

/// Run the diff tool on the candidate and the freshly written file
pub async fn run_diff(diff_command: &str, original: &Path, generated: &Path) -> Result<ExitStatus> {
    info!(original = %original.display(), generated = %generated.display(), "Running diff");
    run_inherited(diff_command, &[original, generated]).await
}
