//! The ordered ladder of download strategies. Earlier strategies prefer
//! fidelity (authenticated, higher quality); each later one trades quality
//! for a better chance of getting past throttling.

use std::path::{Path, PathBuf};

const WINDOWS_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// How a strategy's artifact location is known after a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactContract {
    /// Postprocessing pins the container, so the artifact lands at the
    /// per-request path stem with this extension.
    Fixed(&'static str),
    /// No postprocessing at all; the downloader reports the final path on
    /// stdout. Used by the last-resort strategy, which skips postprocessing
    /// to minimize its chance of failure.
    Reported,
}

/// One fully parameterized download attempt configuration.
#[derive(Debug, Clone)]
pub struct DownloadStrategy {
    pub label: &'static str,
    pub format_selector: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub uses_cookies: bool,
    pub retries: u32,
    pub sleep_interval: u32,
    pub extra_args: Vec<&'static str>,
    pub contract: ArtifactContract,
}

impl DownloadStrategy {
    fn with_cookies(user_agent: &str) -> Self {
        Self {
            label: "with-cookies",
            format_selector: "best[height<=720]/best",
            headers: vec![
                ("User-Agent", user_agent.to_string()),
                (
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language", "en-us,en;q=0.5".to_string()),
            ],
            uses_cookies: true,
            retries: 3,
            sleep_interval: 2,
            extra_args: vec![],
            contract: ArtifactContract::Fixed("mp4"),
        }
    }

    fn degraded() -> Self {
        Self {
            label: "degraded",
            format_selector: "best[height<=480]/best",
            headers: vec![
                ("User-Agent", WINDOWS_USER_AGENT.to_string()),
                ("Referer", "https://www.youtube.com/".to_string()),
            ],
            uses_cookies: false,
            retries: 5,
            sleep_interval: 3,
            extra_args: vec![],
            contract: ArtifactContract::Fixed("mp4"),
        }
    }

    fn audio_only() -> Self {
        Self {
            label: "audio-only",
            format_selector: "bestaudio[ext=m4a]/bestaudio",
            headers: vec![
                ("User-Agent", WINDOWS_USER_AGENT.to_string()),
                ("Referer", "https://www.youtube.com/".to_string()),
            ],
            uses_cookies: false,
            retries: 5,
            sleep_interval: 4,
            extra_args: vec![],
            contract: ArtifactContract::Fixed("m4a"),
        }
    }

    fn last_resort() -> Self {
        Self {
            label: "last-resort",
            format_selector: "worst",
            headers: vec![],
            uses_cookies: false,
            retries: 0,
            sleep_interval: 0,
            extra_args: vec!["--ignore-errors"],
            contract: ArtifactContract::Reported,
        }
    }

    /// Where this strategy's artifact lands when the contract pins the
    /// container. `None` for reported-path strategies.
    pub fn fixed_artifact_path(&self, artifact_prefix: &Path) -> Option<PathBuf> {
        match self.contract {
            ArtifactContract::Fixed(ext) => Some(artifact_prefix.with_extension(ext)),
            ArtifactContract::Reported => None,
        }
    }
}

/// Build the ordered strategy ladder for one request. The cookie strategy is
/// present only when a jar actually materialized.
pub fn strategy_ladder(user_agent: &str, have_cookie_jar: bool) -> Vec<DownloadStrategy> {
    let mut ladder = Vec::with_capacity(4);
    if have_cookie_jar {
        ladder.push(DownloadStrategy::with_cookies(user_agent));
    }
    ladder.push(DownloadStrategy::degraded());
    ladder.push(DownloadStrategy::audio_only());
    ladder.push(DownloadStrategy::last_resort());
    ladder
}
