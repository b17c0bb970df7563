use crate::config::Config;
use crate::error::AppError;
use crate::models::RawVideoInfo;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::{wrappers::LinesStream, StreamExt};
use walkdir::WalkDir;

static PROGRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[download\]\s+(?P<progress>[\d\.]+)%\s+of\s+~?\s*(?P<size>[\d\.\w/]+)(?:\s+at\s+(?P<speed>[\d\.\w/]+))?\s+ETA\s+(?P<eta>[\d:]+)").unwrap()
});

/// The per-request slice of `Config` the extraction tool consumes.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    pub cookie_file: Option<String>,
    pub include_hls_manifest: bool,
    pub include_dash_manifest: bool,
    pub format_sort: Vec<String>,
}

impl ExtractionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cookie_file: config.cookie_file.clone(),
            include_hls_manifest: config.include_hls_manifest,
            include_dash_manifest: config.include_dash_manifest,
            format_sort: config.format_sort.clone(),
        }
    }
}

/// The external extraction tool, seen through the three operations this
/// service needs. The subprocess-backed implementation is `YtDlp`; tests
/// substitute their own.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Full metadata extraction, no download.
    async fn extract(&self, url: &str, opts: &ExtractionOptions) -> Result<RawVideoInfo, AppError>;

    /// Resolves a direct media URL for a combined format selector.
    /// `Ok(None)` means the selector produced nothing usable, which is a
    /// not-found condition rather than a fault.
    async fn resolve_format_url(
        &self,
        url: &str,
        selector: &str,
        opts: &ExtractionOptions,
    ) -> Result<Option<String>, AppError>;

    /// Downloads the chosen format into `dest` and returns the file the
    /// tool produced there.
    async fn download(
        &self,
        url: &str,
        format_id: &str,
        dest: &Path,
        opts: &ExtractionOptions,
    ) -> Result<PathBuf, AppError>;
}

/// Production extractor: shells out to the `yt-dlp` binary.
pub struct YtDlp {
    binary: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn extract(&self, url: &str, opts: &ExtractionOptions) -> Result<RawVideoInfo, AppError> {
        let output = Command::new(&self.binary)
            .args(dump_json_args(url, opts))
            .output()
            .await?;

        if !output.status.success() {
            let error_message = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::error!("yt-dlp extraction failed: {}", error_message);
            return Err(AppError::Extractor(error_message));
        }

        let info: RawVideoInfo = serde_json::from_slice(&output.stdout)?;
        tracing::info!(
            "Extracted {} raw formats for '{}'",
            info.formats.len(),
            info.title.as_deref().unwrap_or("video")
        );
        Ok(info)
    }

    async fn resolve_format_url(
        &self,
        url: &str,
        selector: &str,
        opts: &ExtractionOptions,
    ) -> Result<Option<String>, AppError> {
        let output = Command::new(&self.binary)
            .args(resolve_args(url, selector, opts))
            .output()
            .await?;

        if !output.status.success() {
            tracing::warn!(
                "Format selector '{}' resolved nothing: {}",
                selector,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let direct_url = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Ok(direct_url)
    }

    async fn download(
        &self,
        url: &str,
        format_id: &str,
        dest: &Path,
        opts: &ExtractionOptions,
    ) -> Result<PathBuf, AppError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(download_args(url, format_id, dest, opts))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout).lines();
            let mut lines = LinesStream::new(reader);
            while let Some(Ok(line)) = lines.next().await {
                if let Some(caps) = PROGRESS_REGEX.captures(&line) {
                    tracing::debug!(
                        "download progress {}% of {} ETA {}",
                        caps.name("progress").map_or("?", |m| m.as_str()),
                        caps.name("size").map_or("?", |m| m.as_str()),
                        caps.name("eta").map_or("?", |m| m.as_str()),
                    );
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let error_message = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::error!("yt-dlp download failed: {}", error_message);
            return Err(AppError::Extractor(error_message));
        }

        find_output_file(dest).ok_or_else(|| {
            AppError::Extractor("Download finished but produced no output file".to_string())
        })
    }
}

// === Argument assembly ===
// Pure functions so the option passthrough is testable without spawning.

fn base_args(opts: &ExtractionOptions) -> Vec<String> {
    let mut args = vec!["--no-warnings".to_string()];

    if let Some(cookies) = &opts.cookie_file {
        args.push("--cookies".to_string());
        args.push(cookies.clone());
    }

    if !opts.format_sort.is_empty() {
        args.push("--format-sort".to_string());
        args.push(opts.format_sort.join(","));
    }

    let mut skipped = Vec::new();
    if !opts.include_dash_manifest {
        skipped.push("dash");
    }
    if !opts.include_hls_manifest {
        skipped.push("hls");
    }
    if !skipped.is_empty() {
        args.push("--extractor-args".to_string());
        args.push(format!("youtube:skip={}", skipped.join(",")));
    }

    args
}

pub fn dump_json_args(url: &str, opts: &ExtractionOptions) -> Vec<String> {
    let mut args = base_args(opts);
    args.push("--dump-single-json".to_string());
    args.push(url.to_string());
    args
}

pub fn resolve_args(url: &str, selector: &str, opts: &ExtractionOptions) -> Vec<String> {
    let mut args = base_args(opts);
    args.push("--format".to_string());
    args.push(selector.to_string());
    args.push("--print".to_string());
    args.push("urls".to_string());
    args.push("--simulate".to_string());
    args.push(url.to_string());
    args
}

pub fn download_args(url: &str, format_id: &str, dest: &Path, opts: &ExtractionOptions) -> Vec<String> {
    let mut args = base_args(opts);
    args.push("--format".to_string());
    args.push(format_id.to_string());
    args.push("--newline".to_string());
    args.push("--output".to_string());
    args.push(dest.join("%(title)s.%(ext)s").to_string_lossy().to_string());
    args.push(url.to_string());
    args
}

/// Locates the file yt-dlp wrote into the scratch directory. When the tool
/// leaves more than one entry behind, the largest is the media file.
fn find_output_file(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .max_by_key(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .map(|e| e.into_path())
}
