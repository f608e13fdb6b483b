//! yt-dlp subprocess backend for the download orchestrator.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::strategy::{ArtifactContract, DownloadStrategy};
use super::{DownloadError, MediaDownloader};

/// Download backend that shells out to yt-dlp.
pub struct YtDlpDownloader {
    binary: String,
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn build_args(
        url: &str,
        strategy: &DownloadStrategy,
        cookie_jar: Option<&Path>,
        artifact_prefix: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--output".to_string(),
            format!("{}.%(ext)s", artifact_prefix.display()),
            "--format".to_string(),
            strategy.format_selector.to_string(),
        ];

        for (name, value) in &strategy.headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if strategy.retries > 0 {
            args.push("--retries".to_string());
            args.push(strategy.retries.to_string());
        }

        if strategy.sleep_interval > 0 {
            args.push("--sleep-interval".to_string());
            args.push(strategy.sleep_interval.to_string());
        }

        if let Some(jar) = cookie_jar {
            args.push("--cookies".to_string());
            args.push(jar.display().to_string());
        }

        match strategy.contract {
            // Extract-audio pins an audio container; anything else is remuxed
            // into the declared video container.
            ArtifactContract::Fixed("m4a") => {
                args.extend([
                    "--extract-audio".to_string(),
                    "--audio-format".to_string(),
                    "m4a".to_string(),
                ]);
            }
            ArtifactContract::Fixed(ext) => {
                args.extend(["--remux-video".to_string(), ext.to_string()]);
            }
            ArtifactContract::Reported => {
                args.extend([
                    "--no-simulate".to_string(),
                    "--print".to_string(),
                    "after_move:filepath".to_string(),
                ]);
            }
        }

        args.extend(strategy.extra_args.iter().map(|arg| arg.to_string()));
        args.push(url.to_string());
        args
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn fetch<'a>(
        &self,
        url: &str,
        strategy: &DownloadStrategy,
        cookie_jar: Option<&'a Path>,
        artifact_prefix: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let args = Self::build_args(url, strategy, cookie_jar, artifact_prefix);
        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::Upstream(stderr.trim().to_string()));
        }

        match strategy.contract {
            ArtifactContract::Fixed(ext) => Ok(artifact_prefix.with_extension(ext)),
            ArtifactContract::Reported => {
                // yt-dlp prints the post-move path as the last stdout line
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(PathBuf::from)
                    .ok_or(DownloadError::MissingArtifact)
            }
        }
    }
}
