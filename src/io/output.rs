use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SlideFormat;
use crate::error::RenderError;
use crate::text::{slugify, today_iso, DEFAULT_SLUG_LEN};

/// Default directory for generated decks
pub const DEFAULT_OUTPUT_DIR: &str = "slides";

/// Extensions treated as generated artifacts when pruning
pub const ARTIFACT_EXTENSIONS: [&str; 4] = ["md", "pdf", "png", "html"];

const MARP_TIMEOUT: Duration = Duration::from_secs(120);

/// Where a deck was written and whether rendering succeeded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub markdown_path: PathBuf,
    pub rendered_path: Option<PathBuf>,
    pub format: SlideFormat,
    /// Why rendering was skipped or failed; the markdown is kept regardless
    pub warning: Option<String>,
}

/// Output settings as reported by `check`
#[derive(Debug, Clone, Serialize)]
pub struct OutputInfo {
    pub output_dir: PathBuf,
    pub output_dir_exists: bool,
    pub slide_format: SlideFormat,
    pub marp_cli_path: Option<PathBuf>,
}

/// Writes slide markdown and renders it with the Marp CLI
#[derive(Debug, Clone)]
pub struct SlideRenderer {
    output_dir: PathBuf,
    format: SlideFormat,
    marp: Option<PathBuf>,
    timeout: Duration,
}

impl SlideRenderer {
    /// Create a renderer, locating `marp` on the PATH
    pub fn new(output_dir: impl Into<PathBuf>, format: SlideFormat) -> Self {
        let marp = which::which("marp").ok();
        match &marp {
            Some(path) => info!("Marp CLI found at: {:?}", path),
            None => warn!("Marp CLI not found - rendering to non-markdown formats will be unavailable"),
        }

        Self {
            output_dir: output_dir.into(),
            format,
            marp,
            timeout: MARP_TIMEOUT,
        }
    }

    /// Use a specific Marp executable (or none)
    pub fn with_marp(mut self, marp: Option<PathBuf>) -> Self {
        self.marp = marp;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_info(&self) -> OutputInfo {
        OutputInfo {
            output_dir: self.output_dir.clone(),
            output_dir_exists: self.output_dir.is_dir(),
            slide_format: self.format,
            marp_cli_path: self.marp.clone(),
        }
    }

    /// `<output_dir>/<date>_<slug>.md`
    pub fn markdown_path(&self, title: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.md", today_iso(), slugify(title, DEFAULT_SLUG_LEN)))
    }

    /// Write the markdown, creating the output directory if needed
    pub fn save_markdown(&self, content: &str, title: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {:?}", self.output_dir)
        })?;

        let path = self.markdown_path(title);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write markdown: {:?}", path))?;

        info!("Markdown saved to: {:?}", path);
        Ok(path)
    }

    /// Run `marp <md> --<format> -o <sibling>` and return the rendered file
    pub async fn render_with_marp(
        &self,
        md_path: &Path,
        format: SlideFormat,
    ) -> Result<PathBuf, RenderError> {
        let marp = self.marp.as_ref().ok_or(RenderError::MarpNotFound)?;
        let ext = format
            .extension()
            .ok_or_else(|| RenderError::UnsupportedFormat("markdown".to_string()))?;

        let output_path = md_path.with_extension(ext);
        info!("Rendering {:?} to {}", md_path, ext);

        let mut command = Command::new(marp);
        command
            .arg(md_path)
            .arg(format!("--{}", ext))
            .arg("-o")
            .arg(&output_path)
            .kill_on_drop(true);
        debug!("Marp command: {:?}", command);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| RenderError::Io {
                path: marp.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            };
            return Err(RenderError::Failed(message));
        }

        if !output_path.exists() {
            return Err(RenderError::Failed(
                "marp completed but output file not found".to_string(),
            ));
        }

        info!("Successfully rendered to: {:?}", output_path);
        Ok(output_path)
    }

    /// Save the markdown and render it in the configured format.
    ///
    /// Only a failure to write the markdown is an error; renderer problems are
    /// reported in [`RenderOutcome::warning`].
    pub async fn save_and_render(&self, content: &str, title: &str) -> Result<RenderOutcome> {
        let markdown_path = self.save_markdown(content, title)?;

        let mut outcome = RenderOutcome {
            markdown_path,
            rendered_path: None,
            format: self.format,
            warning: None,
        };

        if self.format == SlideFormat::Markdown {
            info!("No additional rendering requested");
            return Ok(outcome);
        }

        match self.render_with_marp(&outcome.markdown_path, self.format).await {
            Ok(path) => outcome.rendered_path = Some(path),
            Err(e) => {
                warn!("Rendering failed, markdown kept: {}", e);
                outcome.warning = Some(e.to_string());
            }
        }

        Ok(outcome)
    }
}

/// Problems found in a slide document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkdownValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl MarkdownValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a slide document for common problems before saving
pub fn validate_slide_markdown(content: &str) -> MarkdownValidation {
    static FRONT_MATTER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^---[\s\S]*?---\s*").expect("valid regex"));

    let mut result = MarkdownValidation::default();

    if content.trim().is_empty() {
        result.errors.push("Content is empty".to_string());
        return result;
    }

    if !content.starts_with("---\nmarp: true") {
        result.warnings.push("Missing Marp header".to_string());
    }
    if !content.contains("# ") {
        result.warnings.push("No main title found".to_string());
    }

    let body = FRONT_MATTER_RE.replace(content, "");
    if !body.contains("---") {
        result.warnings.push("No slide separators found".to_string());
    }

    let len = content.chars().count();
    if len < 100 {
        result.warnings.push("Content seems very short".to_string());
    } else if len > 50_000 {
        result
            .warnings
            .push("Content is very long, may cause rendering issues".to_string());
    }

    result
}

/// Delete all but the `keep` most recently modified artifacts in `dir`.
/// Returns the number of files removed.
pub fn prune_old_outputs(dir: &Path, keep: usize) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let path = entry?.path();
        let is_artifact = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ARTIFACT_EXTENSIONS.contains(&e));
        if !is_artifact || !path.is_file() {
            continue;
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {:?}", path))?;
        artifacts.push((modified, path));
    }

    if artifacts.len() <= keep {
        return Ok(0);
    }

    // Newest first
    artifacts.sort_by(|a, b| b.0.cmp(&a.0));

    let mut deleted = 0;
    for (_, path) in artifacts.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted old file: {:?}", path);
                deleted += 1;
            }
            Err(e) => warn!("Failed to delete {:?}: {}", path, e),
        }
    }

    if deleted > 0 {
        info!("Cleaned up {} old report files", deleted);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    const DECK: &str = "---\nmarp: true\npaginate: true\ntheme: default\ntitle: T\n---\n\n# Deck\n---\n## One\n- point\n";

    #[test]
    fn test_save_markdown_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SlideRenderer::new(dir.path().join("nested/slides"), SlideFormat::Markdown);

        let path = renderer.save_markdown(DECK, "2026-01-02_Daily_Security_Briefing").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_2026-01-02-daily-security-briefing.md"));
        assert!(name.starts_with(&today_iso()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DECK);
    }

    #[tokio::test]
    async fn test_markdown_only_skips_marp() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SlideRenderer::new(dir.path(), SlideFormat::Markdown).with_marp(None);

        let outcome = renderer.save_and_render(DECK, "Deck").await.unwrap();

        assert!(outcome.markdown_path.exists());
        assert!(outcome.rendered_path.is_none());
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn test_missing_marp_keeps_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SlideRenderer::new(dir.path(), SlideFormat::Pdf).with_marp(None);

        let outcome = renderer.save_and_render(DECK, "Deck").await.unwrap();

        assert!(outcome.markdown_path.exists());
        assert!(outcome.rendered_path.is_none());
        assert!(outcome.warning.unwrap().contains("marp CLI not found"));
    }

    #[cfg(unix)]
    fn fake_marp(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("marp");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_writes_sibling_file() {
        let dir = tempfile::tempdir().unwrap();
        // Arguments: <md> --<format> -o <output>
        let marp = fake_marp(dir.path(), "#!/bin/sh\n[ \"$2\" = \"--html\" ] || exit 2\necho rendered > \"$4\"\n");
        let renderer = SlideRenderer::new(dir.path().join("out"), SlideFormat::Html).with_marp(Some(marp));

        let outcome = renderer.save_and_render(DECK, "Deck").await.unwrap();

        let rendered = outcome.rendered_path.unwrap();
        assert_eq!(rendered, outcome.markdown_path.with_extension("html"));
        assert!(rendered.exists());
        assert!(outcome.warning.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let marp = fake_marp(dir.path(), "#!/bin/sh\necho 'chromium missing' >&2\nexit 1\n");
        let renderer = SlideRenderer::new(dir.path().join("out"), SlideFormat::Pdf).with_marp(Some(marp));

        let outcome = renderer.save_and_render(DECK, "Deck").await.unwrap();

        assert!(outcome.markdown_path.exists());
        assert!(outcome.rendered_path.is_none());
        assert_eq!(outcome.warning.as_deref(), Some("marp rendering failed: chromium missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_render_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let marp = fake_marp(dir.path(), "#!/bin/sh\nsleep 5\n");
        let renderer = SlideRenderer::new(dir.path().join("out"), SlideFormat::Png)
            .with_marp(Some(marp))
            .with_timeout(Duration::from_millis(100));
        let md = renderer.save_markdown(DECK, "Deck").unwrap();

        let err = renderer.render_with_marp(&md, SlideFormat::Png).await.unwrap_err();

        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[test]
    fn test_validate_slide_markdown() {
        assert!(!validate_slide_markdown("  ").is_valid());

        let short = validate_slide_markdown("plain text");
        assert!(short.is_valid());
        assert!(short.warnings.contains(&"Missing Marp header".to_string()));
        assert!(short.warnings.contains(&"No main title found".to_string()));
        assert!(short.warnings.contains(&"No slide separators found".to_string()));
        assert!(short.warnings.contains(&"Content seems very short".to_string()));

        let deck = format!("{}{}", DECK, "- detail line\n".repeat(10));
        assert!(validate_slide_markdown(&deck).warnings.is_empty());
    }

    #[test]
    fn test_prune_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        for (i, name) in ["a.md", "b.pdf", "c.md", "d.html"].iter().enumerate() {
            let path = dir.path().join(name);
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i as u64 * 60)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let deleted = prune_old_outputs(dir.path(), 2).unwrap();

        assert_eq!(deleted, 2);
        assert!(!dir.path().join("a.md").exists());
        assert!(!dir.path().join("b.pdf").exists());
        assert!(dir.path().join("c.md").exists());
        assert!(dir.path().join("d.html").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(prune_old_outputs(&dir.path().join("missing"), 1).unwrap(), 0);
    }
}
