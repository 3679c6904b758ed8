// src/reconcile.rs
// Output reconciliation: pick a destination name, never overwrite, write once

use regex::Regex;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::GishConfig;
use crate::error::{GishError, Result};
use crate::utils::temp_file_base;

/// Numbered variants probed after the selected name (`name-1` .. `name-5`)
pub const MAX_SUFFIX: usize = 5;

/// Lines scanned for a `file:` hint at the top of generated content
const HINT_SCAN_LINES: usize = 5;

#[allow(clippy::expect_used)]
static NAME_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?://|#|--|/\*|<!--)\s*file(?:name)?\s*:\s*([^\s*>]+?)(?:-->|\*/|\s|$)")
        .expect("name hint regex is valid")
});

/// Where a save name came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Explicit,
    DiffExtension,
    Hint,
    Generated,
}

/// Writes generated content to disk without clobbering existing files
#[derive(Debug, Clone)]
pub struct OutputReconciler {
    output_dir: PathBuf,
    default_extension: String,
    infer_names: bool,
}

impl OutputReconciler {
    pub fn new(output_dir: impl Into<PathBuf>, default_extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            default_extension: default_extension.into(),
            infer_names: false,
        }
    }

    pub fn from_config(config: &GishConfig) -> Self {
        Self::new(config.output_dir(), config.files.default_extension.clone())
            .with_name_inference(config.defaults.infer_names)
    }

    pub fn with_name_inference(mut self, enabled: bool) -> Self {
        self.infer_names = enabled;
        self
    }

    /// Select the destination name.
    ///
    /// Precedence: explicit target, then the diff target's extension on a fresh temp
    /// base, then an in-content hint (when inference is on), then the default
    /// extension on a fresh temp base.
    pub fn choose_name(
        &self,
        content: &str,
        diff_target: Option<&Path>,
        explicit_target: Option<&Path>,
    ) -> (PathBuf, NameSource) {
        if let Some(target) = explicit_target {
            return (target.to_path_buf(), NameSource::Explicit);
        }
        if let Some(diff) = diff_target {
            let ext = diff.extension().map(|e| e.to_string_lossy().to_string());
            return (self.generated_name(ext.as_deref()), NameSource::DiffExtension);
        }
        if self.infer_names {
            if let Some(hint) = infer_file_name(content) {
                return (self.output_dir.join(hint), NameSource::Hint);
            }
        }
        let ext = Some(self.default_extension.as_str()).filter(|e| !e.is_empty());
        (self.generated_name(ext), NameSource::Generated)
    }

    fn generated_name(&self, extension: Option<&str>) -> PathBuf {
        let base = temp_file_base(&self.output_dir);
        match extension {
            Some(ext) => base.with_extension(ext.trim_start_matches('.')),
            None => base,
        }
    }

    /// Save content under a collision-free name and return the path written
    pub fn save(
        &self,
        content: &str,
        diff_target: Option<&Path>,
        explicit_target: Option<&Path>,
    ) -> Result<PathBuf> {
        let (name, source) = self.choose_name(content, diff_target, explicit_target);
        debug!(path = %name.display(), source = ?source, "Selected output name");

        if source != NameSource::Explicit && !self.output_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.output_dir)?;
        }

        let written = write_unique(&name, content)?;
        info!(path = %written.display(), "Saved response");
        Ok(written)
    }

    /// Write each fenced block whose info string is a file name into `dir`.
    ///
    /// Blocks with an empty info string are skipped. Returns the written paths in
    /// block order.
    pub fn extract_files(&self, content: &str, dir: &Path) -> Result<Vec<PathBuf>> {
        let blocks = code_blocks(content);
        for block in &blocks {
            validate_file_name(&block.name)?;
        }

        let mut written = Vec::with_capacity(blocks.len());
        if blocks.is_empty() {
            return Ok(written);
        }
        std::fs::create_dir_all(dir)?;
        for block in blocks {
            let path = write_unique(&dir.join(&block.name), block.body.trim())?;
            written.push(path);
        }
        info!(dir = %dir.display(), count = written.len(), "Extracted code blocks");
        Ok(written)
    }
}

/// `name.ext` -> `name-N.ext`, extension preserved
fn numbered_variant(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}-{}", stem, n),
    };
    path.with_file_name(file_name)
}

/// Write `content` plus one trailing newline to the first free variant of `path`.
///
/// Files are opened with `create_new`, so an existing file is never truncated even
/// if it appears between the probe and the write.
pub fn write_unique(path: &Path, content: &str) -> Result<PathBuf> {
    let candidates =
        std::iter::once(path.to_path_buf()).chain((1..=MAX_SUFFIX).map(|n| numbered_variant(path, n)));

    for candidate in candidates {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())?;
                file.write_all(b"\n")?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "Name taken, trying next suffix");
            }
            Err(e) => return Err(e.into()),
        }
    }

    warn!(path = %path.display(), "All numbered variants are taken");
    Err(GishError::CollisionExhausted {
        path: path.to_path_buf(),
        attempts: MAX_SUFFIX + 1,
    })
}

/// Look for a `file:` / `filename:` comment in the first lines of content
pub fn infer_file_name(content: &str) -> Option<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(HINT_SCAN_LINES)
        .find_map(|line| {
            let caps = NAME_HINT_RE.captures(line)?;
            let raw = caps.get(1)?.as_str();
            let name = Path::new(raw).file_name()?.to_string_lossy().to_string();
            validate_file_name(&name).ok()?;
            Some(name)
        })
}

/// Accepts plain file names: letters, digits, space, `.`, `_`, `-`; no path
/// separators, no leading or trailing space, not `.` or `..`, at most 254 chars.
pub fn validate_file_name(name: &str) -> Result<()> {
    let invalid = || GishError::InvalidFileName(name.to_string());

    let len = name.chars().count();
    if len == 0 || len > 254 || name == "." || name == ".." {
        return Err(invalid());
    }
    if name.starts_with(' ') || name.ends_with(' ') || name.contains("  ") {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
    {
        return Err(invalid());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeBlock {
    name: String,
    body: String,
}

/// Fenced blocks with a non-empty info string; an unterminated block is ignored
fn code_blocks(content: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    current = Some((info.trim().to_string(), Vec::new()));
                }
            }
            Some((name, mut body)) => {
                if trimmed == "```" {
                    if !name.is_empty() {
                        blocks.push(CodeBlock {
                            name,
                            body: body.join("\n"),
                        });
                    }
                } else {
                    body.push(line);
                    current = Some((name, body));
                }
            }
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reconciler(dir: &TempDir) -> OutputReconciler {
        OutputReconciler::new(dir.path(), "txt")
    }

    // ============================================================================
    // Name selection
    // ============================================================================

    #[test]
    fn test_explicit_target_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("out.md");
        let (name, source) = reconciler(&dir).choose_name(
            "x",
            Some(Path::new("src/main.rs")),
            Some(explicit.as_path()),
        );
        assert_eq!(name, explicit);
        assert_eq!(source, NameSource::Explicit);
    }

    #[test]
    fn test_diff_target_extension_on_temp_base() {
        let dir = TempDir::new().unwrap();
        let (name, source) = reconciler(&dir).choose_name("x", Some(Path::new("lib/app.rs")), None);
        assert_eq!(source, NameSource::DiffExtension);
        assert_eq!(name.extension().unwrap(), "rs");
        assert!(name.file_name().unwrap().to_string_lossy().starts_with("gish-"));
        assert_eq!(name.parent().unwrap(), dir.path());
    }

    #[test]
    fn test_default_extension_on_temp_base() {
        let dir = TempDir::new().unwrap();
        let (name, source) = reconciler(&dir).choose_name("x", None, None);
        assert_eq!(source, NameSource::Generated);
        assert_eq!(name.extension().unwrap(), "txt");
    }

    #[test]
    fn test_hint_used_only_when_enabled() {
        let dir = TempDir::new().unwrap();
        let content = "// file: parser.rs\nfn main() {}";

        let (_, source) = reconciler(&dir).choose_name(content, None, None);
        assert_eq!(source, NameSource::Generated);

        let (name, source) = reconciler(&dir)
            .with_name_inference(true)
            .choose_name(content, None, None);
        assert_eq!(source, NameSource::Hint);
        assert_eq!(name, dir.path().join("parser.rs"));
    }

    #[test]
    fn test_diff_target_beats_hint() {
        let dir = TempDir::new().unwrap();
        let (_, source) = reconciler(&dir)
            .with_name_inference(true)
            .choose_name("# filename: a.py", Some(Path::new("b.rs")), None);
        assert_eq!(source, NameSource::DiffExtension);
    }

    #[test]
    fn test_infer_file_name_variants() {
        assert_eq!(infer_file_name("// file: x.rs\n"), Some("x.rs".into()));
        assert_eq!(infer_file_name("\n# filename: tool.py"), Some("tool.py".into()));
        assert_eq!(infer_file_name("<!-- file: index.html -->"), Some("index.html".into()));
        assert_eq!(infer_file_name("// File: ../../etc/passwd"), Some("passwd".into()));
        assert_eq!(infer_file_name("no hint here"), None);
    }

    #[test]
    fn test_infer_file_name_compact_comments() {
        assert_eq!(
            infer_file_name("<!--file:index.html-->\n<p>x</p>"),
            Some("index.html".into())
        );
        assert_eq!(infer_file_name("/*file:style.css*/"), Some("style.css".into()));
        assert_eq!(infer_file_name("--filename:query.sql"), Some("query.sql".into()));
    }

    #[test]
    fn test_hint_past_scan_window_ignored() {
        let content = "a\nb\nc\nd\ne\n// file: late.rs";
        assert_eq!(infer_file_name(content), None);
    }

    // ============================================================================
    // Collision handling
    // ============================================================================

    #[test]
    fn test_save_appends_single_newline() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("name.txt");
        let written = reconciler(&dir).save("hello", None, Some(target.as_path())).unwrap();
        assert_eq!(written, target);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello\n");
    }

    #[test]
    fn test_existing_file_gets_numbered_variant() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("name.txt");
        std::fs::write(&target, "original").unwrap();

        let written = reconciler(&dir).save("new", None, Some(target.as_path())).unwrap();
        assert_eq!(written, dir.path().join("name-1.txt"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "original");
    }

    #[test]
    fn test_next_free_variant_is_used() {
        let dir = TempDir::new().unwrap();
        for name in ["name.txt", "name-1.txt", "name-2.txt"] {
            std::fs::write(dir.path().join(name), "taken").unwrap();
        }
        let written = reconciler(&dir)
            .save("new", None, Some(dir.path().join("name.txt").as_path()))
            .unwrap();
        assert_eq!(written, dir.path().join("name-3.txt"));
    }

    #[test]
    fn test_collision_bound_exhausted_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("name.txt");
        std::fs::write(&target, "taken").unwrap();
        for n in 1..=MAX_SUFFIX {
            std::fs::write(dir.path().join(format!("name-{n}.txt")), "taken").unwrap();
        }
        let before = std::fs::read_dir(dir.path()).unwrap().count();

        let err = reconciler(&dir).save("new", None, Some(target.as_path())).unwrap_err();
        assert!(matches!(err, GishError::CollisionExhausted { attempts: 6, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before);
        assert!(!dir.path().join("name-6.txt").exists());
    }

    #[test]
    fn test_numbered_variant_without_extension() {
        assert_eq!(numbered_variant(Path::new("/tmp/Makefile"), 2), PathBuf::from("/tmp/Makefile-2"));
        assert_eq!(numbered_variant(Path::new("a.tar.gz"), 1), PathBuf::from("a.tar-1.gz"));
    }

    #[test]
    fn test_generated_name_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("gen");
        let written = OutputReconciler::new(&out, "md").save("x", None, None).unwrap();
        assert!(written.starts_with(&out));
        assert_eq!(written.extension().unwrap(), "md");
    }

    // ============================================================================
    // Code-block extraction
    // ============================================================================

    #[test]
    fn test_extract_named_blocks() {
        let dir = TempDir::new().unwrap();
        let content = "Here you go:\n```index.html\n<h1>Hi</h1>\n```\ntext\n```app.js\nconsole.log(1);\n```\n";
        let out = dir.path().join("site");

        let written = reconciler(&dir).extract_files(content, &out).unwrap();
        assert_eq!(written, vec![out.join("index.html"), out.join("app.js")]);
        assert_eq!(std::fs::read_to_string(out.join("index.html")).unwrap(), "<h1>Hi</h1>\n");
    }

    #[test]
    fn test_extract_skips_unnamed_blocks() {
        let dir = TempDir::new().unwrap();
        let written = reconciler(&dir)
            .extract_files("```\nplain\n```", dir.path())
            .unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_extract_invalid_name_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let content = "```ok.txt\na\n```\n```../escape.txt\nb\n```";
        let err = reconciler(&dir).extract_files(content, &out).unwrap_err();
        assert!(matches!(err, GishError::InvalidFileName(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("README.md").is_ok());
        assert!(validate_file_name("my file.txt").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name(" lead.txt").is_err());
        assert!(validate_file_name("a/b.txt").is_err());
        assert!(validate_file_name(&"a".repeat(255)).is_err());
    }
}
