use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::cookies::CookieJar;

pub mod classifier;
pub mod strategy;
pub mod ytdlp;

use classifier::{classify, FailureKind};
use strategy::{strategy_ladder, ArtifactContract, DownloadStrategy};

/// Error surfaced by a download backend for a single strategy attempt.
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    /// The downloader ran and reported an error; the message is classified
    /// into permanent vs transient by the orchestrator.
    #[error("downloader error: {0}")]
    Upstream(String),

    #[error("failed to run downloader: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("downloader reported success but did not name an artifact")]
    MissingArtifact,
}

/// A fetched artifact plus the contract of the strategy that produced it.
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub strategy_label: &'static str,
    pub contract: ArtifactContract,
}

/// Result of running the full strategy ladder against one URL.
#[derive(Debug)]
pub enum DownloadOutcome {
    Success(DownloadedArtifact),
    TransientFailure(String),
    PermanentFailure(String),
}

/// One download attempt with one strategy. `artifact_prefix` is the
/// per-request path stem inside the scratch directory; the returned path
/// honors the strategy's artifact contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn fetch<'a>(
        &self,
        url: &str,
        strategy: &DownloadStrategy,
        cookie_jar: Option<&'a Path>,
        artifact_prefix: &Path,
    ) -> Result<PathBuf, DownloadError>;
}

/// Tries an ordered list of downloader configurations against a single URL,
/// short-circuiting on permanent failure and returning the first usable
/// artifact.
pub struct FallbackDownloadOrchestrator<'a> {
    downloader: &'a dyn MediaDownloader,
}

impl<'a> FallbackDownloadOrchestrator<'a> {
    pub fn new(downloader: &'a dyn MediaDownloader) -> Self {
        Self { downloader }
    }

    /// Walk the strategy ladder in order until one yields a non-empty
    /// artifact. A permanent upstream error stops the walk immediately:
    /// retrying a video that is private, removed, or copyright-struck only
    /// burns quota and invites further throttling.
    ///
    /// The cookie jar, when present, is deleted before this returns, no
    /// matter which exit path is taken. There is no overall wall-clock
    /// ceiling across strategies; each strategy's retry and sleep budget is
    /// the only bound on the download phase.
    pub async fn download(
        &self,
        url: &str,
        cookie_jar: Option<CookieJar>,
        user_agent: &str,
        artifact_prefix: &Path,
    ) -> DownloadOutcome {
        let ladder = strategy_ladder(user_agent, cookie_jar.is_some());
        let total = ladder.len();

        let mut outcome =
            DownloadOutcome::TransientFailure("all download strategies failed".to_string());

        for (index, strategy) in ladder.iter().enumerate() {
            tracing::info!(
                "Attempting download with '{}' (attempt {}/{})",
                strategy.label,
                index + 1,
                total
            );

            let jar_path = if strategy.uses_cookies {
                cookie_jar.as_ref().map(|jar| jar.path())
            } else {
                None
            };

            match self
                .downloader
                .fetch(url, strategy, jar_path, artifact_prefix)
                .await
            {
                Ok(path) => match fs_err::metadata(&path) {
                    Ok(meta) if meta.len() > 0 => {
                        tracing::info!(
                            "Download successful with '{}': {}",
                            strategy.label,
                            crate::utils::format_file_size(meta.len())
                        );
                        outcome = DownloadOutcome::Success(DownloadedArtifact {
                            path,
                            strategy_label: strategy.label,
                            contract: strategy.contract,
                        });
                        break;
                    }
                    _ => {
                        tracing::warn!(
                            "'{}' reported success but artifact is missing or empty: {}",
                            strategy.label,
                            path.display()
                        );
                    }
                },
                Err(DownloadError::Upstream(message)) => match classify(&message) {
                    FailureKind::Permanent => {
                        tracing::error!("Permanent error detected: {}", message);
                        outcome = DownloadOutcome::PermanentFailure(message);
                        break;
                    }
                    FailureKind::Transient => {
                        tracing::warn!("'{}' failed: {}", strategy.label, message);
                    }
                },
                Err(err) => {
                    tracing::warn!("'{}' exception: {}", strategy.label, err);
                }
            }
        }

        if let Some(jar) = cookie_jar {
            jar.discard();
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{self, CookieData, CredentialBundle};
    use mockall::predicate::always;
    use mockall::Sequence;
    use tempfile::TempDir;

    const URL: &str = "https://youtube.com/watch?v=X";

    fn test_bundle() -> CredentialBundle {
        CredentialBundle {
            cookies: CookieData::Raw("a=1; b=2".to_string()),
            user_agent: None,
            browser: None,
            profile: None,
            extracted_at: None,
            cookie_count: None,
        }
    }

    fn write_artifact(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs_err::write(&path, b"media bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_permanent_error_stops_after_first_strategy() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_fetch()
            .times(1)
            .returning(|_, _, _, _| {
                Err(DownloadError::Upstream(
                    "ERROR: [youtube] X: Video unavailable".to_string(),
                ))
            });

        let scratch = TempDir::new().unwrap();
        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, None, "UA", &scratch.path().join("x_source"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::PermanentFailure(_)));
    }

    #[tokio::test]
    async fn test_transient_failures_fall_through_to_success() {
        let scratch = TempDir::new().unwrap();
        let artifact = write_artifact(&scratch, "x_source.m4a");

        let mut seq = Sequence::new();
        let mut downloader = MockMediaDownloader::new();
        for _ in 0..2 {
            downloader
                .expect_fetch()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _, _| {
                    Err(DownloadError::Upstream(
                        "HTTP Error 429: Too Many Requests".to_string(),
                    ))
                });
        }
        let artifact_clone = artifact.clone();
        downloader
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _, _| Ok(artifact_clone.clone()));

        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, None, "UA", &scratch.path().join("x_source"))
            .await;

        match outcome {
            DownloadOutcome::Success(downloaded) => {
                assert_eq!(downloaded.path, artifact);
                assert_eq!(downloaded.strategy_label, "last-resort");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_ladder_is_transient() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_fetch()
            .times(3)
            .returning(|_, _, _, _| {
                Err(DownloadError::Upstream("timed out".to_string()))
            });

        let scratch = TempDir::new().unwrap();
        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, None, "UA", &scratch.path().join("x_source"))
            .await;

        match outcome {
            DownloadOutcome::TransientFailure(reason) => {
                assert_eq!(reason, "all download strategies failed");
            }
            other => panic!("expected transient failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_artifact_counts_as_failure() {
        let scratch = TempDir::new().unwrap();
        let empty = scratch.path().join("x_source.mp4");
        fs_err::write(&empty, b"").unwrap();

        let mut downloader = MockMediaDownloader::new();
        let empty_clone = empty.clone();
        downloader
            .expect_fetch()
            .times(3)
            .returning(move |_, _, _, _| Ok(empty_clone.clone()));

        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, None, "UA", &scratch.path().join("x_source"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::TransientFailure(_)));
    }

    #[tokio::test]
    async fn test_cookie_jar_removed_after_success() {
        let scratch = TempDir::new().unwrap();
        let artifact = write_artifact(&scratch, "x_source.mp4");
        let bundle = test_bundle();
        let jar = cookies::materialize(Some(&bundle), scratch.path())
            .unwrap()
            .unwrap();
        let jar_file = jar.path().to_path_buf();

        let mut downloader = MockMediaDownloader::new();
        let artifact_clone = artifact.clone();
        downloader
            .expect_fetch()
            .with(always(), always(), always(), always())
            .times(1)
            .returning(move |_, _, _, _| Ok(artifact_clone.clone()));

        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, Some(jar), "UA", &scratch.path().join("x_source"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::Success(_)));
        assert!(!jar_file.exists());
    }

    #[tokio::test]
    async fn test_cookie_jar_removed_after_exhaustion() {
        let scratch = TempDir::new().unwrap();
        let bundle = test_bundle();
        let jar = cookies::materialize(Some(&bundle), scratch.path())
            .unwrap()
            .unwrap();
        let jar_file = jar.path().to_path_buf();

        let mut downloader = MockMediaDownloader::new();
        // Four strategies this time: the jar enables the cookie strategy
        downloader
            .expect_fetch()
            .times(4)
            .returning(|_, _, _, _| {
                Err(DownloadError::Upstream("network unreachable".to_string()))
            });

        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, Some(jar), "UA", &scratch.path().join("x_source"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::TransientFailure(_)));
        assert!(!jar_file.exists());
    }

    #[tokio::test]
    async fn test_spawn_errors_are_treated_as_transient() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_fetch()
            .times(3)
            .returning(|_, _, _, _| {
                Err(DownloadError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "yt-dlp not found",
                )))
            });

        let scratch = TempDir::new().unwrap();
        let orchestrator = FallbackDownloadOrchestrator::new(&downloader);
        let outcome = orchestrator
            .download(URL, None, "UA", &scratch.path().join("x_source"))
            .await;

        assert!(matches!(outcome, DownloadOutcome::TransientFailure(_)));
    }
}
