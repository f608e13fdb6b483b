use anyhow::{Context, Result};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::artifact;
use crate::config::Config;
use crate::cookies::{self, CredentialBundle, DEFAULT_USER_AGENT};
use crate::download::ytdlp::YtDlpDownloader;
use crate::download::{DownloadOutcome, FallbackDownloadOrchestrator, MediaDownloader};
use crate::extract::SegmentExtractor;
use crate::request::MediaRequest;
use crate::storage;
use crate::ConverterError;

pub mod response;

/// Receipt for one successfully delivered conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReceipt {
    pub request_id: String,
    pub s3_bucket: String,
    pub s3_key: String,
    pub filename: String,
    pub duration_seconds: i64,
    pub download_expires_in: String,
}

/// Generate a fresh request id.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn id_prefix(request_id: &str) -> &str {
    &request_id[..8.min(request_id.len())]
}

/// Filename for the delivered MP3, keyed by the request id prefix.
pub fn mp3_filename(request_id: &str) -> String {
    format!("preek_{}.mp3", id_prefix(request_id))
}

/// Storage object key for a delivered MP3.
pub fn storage_key(filename: &str) -> String {
    format!("mp3/{}", filename)
}

/// End-to-end conversion pipeline: cookies, fallback download, segment
/// extraction, S3 delivery, and scratch cleanup.
pub struct ConversionPipeline {
    config: Config,
    s3_client: S3Client,
    secrets_client: SecretsClient,
    downloader: Box<dyn MediaDownloader>,
    extractor: SegmentExtractor,
    temp_dir: TempDir,
}

impl ConversionPipeline {
    /// Create a new conversion pipeline
    pub async fn new(config: Config) -> Result<Self> {
        // Load AWS configuration
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.aws_region())
            .load()
            .await;

        let s3_client = S3Client::new(&aws_config);
        let secrets_client = SecretsClient::new(&aws_config);

        // Create scratch directory
        let temp_dir = match &config.app.temp_dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                TempDir::new_in(dir)
            }
            None => TempDir::new(),
        }
        .context("Failed to create scratch directory")?;

        Ok(Self {
            config,
            s3_client,
            secrets_client,
            downloader: Box::new(YtDlpDownloader::new()),
            extractor: SegmentExtractor::new(),
            temp_dir,
        })
    }

    /// Run one conversion end to end. Local artifacts are removed on every
    /// exit path (unless keep_artifacts is set); cleanup failures are logged
    /// and never override the primary outcome.
    pub async fn convert(
        &self,
        request: &MediaRequest,
        request_id: &str,
        cookie_override: Option<CredentialBundle>,
    ) -> Result<ConversionReceipt> {
        let filename = mp3_filename(request_id);
        let artifact_prefix = self
            .temp_dir
            .path()
            .join(format!("{}_source", id_prefix(request_id)));
        let mp3_path = self.temp_dir.path().join(&filename);

        tracing::info!(
            "Processing request {}: {} ({}s-{}s) -> {}",
            request_id,
            request.source_url,
            request.start_seconds,
            request.end_seconds,
            filename
        );

        let mut scratch_files: Vec<PathBuf> = Vec::new();
        let result = self
            .run(
                request,
                request_id,
                &filename,
                &artifact_prefix,
                &mp3_path,
                cookie_override,
                &mut scratch_files,
            )
            .await;

        if self.config.app.keep_artifacts {
            for path in &scratch_files {
                tracing::info!("Keeping artifact: {}", path.display());
            }
        } else {
            artifact::cleanup_files(&scratch_files);
        }

        if result.is_ok() {
            tracing::info!("Request {} completed successfully", request_id);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        request: &MediaRequest,
        request_id: &str,
        filename: &str,
        artifact_prefix: &Path,
        mp3_path: &Path,
        cookie_override: Option<CredentialBundle>,
        scratch_files: &mut Vec<PathBuf>,
    ) -> Result<ConversionReceipt> {
        // Credential material: explicit export file wins over Secrets Manager
        let bundle = match cookie_override {
            Some(bundle) => Some(bundle),
            None => {
                storage::fetch_cookie_bundle(
                    &self.secrets_client,
                    &self.config.aws.cookies_secret_name,
                )
                .await
            }
        };
        let user_agent = bundle
            .as_ref()
            .map(|b| b.user_agent().to_string())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        // The orchestrator takes ownership of the jar and deletes it
        let cookie_jar = cookies::materialize(bundle.as_ref(), self.temp_dir.path())?;

        if let Some(domain) = crate::utils::extract_domain(&request.source_url) {
            tracing::info!("Fetching media from {}", domain);
        }

        let orchestrator = FallbackDownloadOrchestrator::new(self.downloader.as_ref());
        let downloaded = match orchestrator
            .download(&request.source_url, cookie_jar, &user_agent, artifact_prefix)
            .await
        {
            DownloadOutcome::Success(artifact) => artifact,
            DownloadOutcome::PermanentFailure(reason) => {
                return Err(ConverterError::PermanentUpstream(reason).into())
            }
            DownloadOutcome::TransientFailure(reason) => {
                return Err(ConverterError::TransientUpstream(reason).into())
            }
        };
        scratch_files.push(downloaded.path.clone());

        let resolved = artifact::resolve(&downloaded)?;

        scratch_files.push(mp3_path.to_path_buf());
        let output = self
            .extractor
            .extract(
                &resolved,
                mp3_path,
                request.start_seconds,
                request.end_seconds,
                request.bitrate,
            )
            .await?;

        let s3_key = storage_key(filename);
        storage::upload_mp3(
            &self.s3_client,
            &self.config.aws.s3_bucket,
            &s3_key,
            &output.path,
            Self::object_metadata(request, request_id),
        )
        .await
        .map_err(|err| ConverterError::Storage(format!("{:#}", err)))?;

        Ok(ConversionReceipt {
            request_id: request_id.to_string(),
            s3_bucket: self.config.aws.s3_bucket.clone(),
            s3_key,
            filename: filename.to_string(),
            duration_seconds: request.duration_seconds(),
            download_expires_in: "24 hours".to_string(),
        })
    }

    fn object_metadata(request: &MediaRequest, request_id: &str) -> HashMap<String, String> {
        HashMap::from([
            ("youtube-url".to_string(), request.source_url.clone()),
            ("start-time".to_string(), request.start_seconds.to_string()),
            ("end-time".to_string(), request.end_seconds.to_string()),
            (
                "duration".to_string(),
                request.duration_seconds().to_string(),
            ),
            ("bitrate".to_string(), request.bitrate.to_string()),
            ("request-id".to_string(), request_id.to_string()),
            ("created-at".to_string(), chrono::Utc::now().to_rfc3339()),
            ("converter".to_string(), "mp3maker".to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Bitrate;

    #[test]
    fn test_mp3_filename_uses_request_id_prefix() {
        let request_id = new_request_id();
        let filename = mp3_filename(&request_id);

        assert!(filename.starts_with("preek_"));
        assert!(filename.ends_with(".mp3"));

        let prefix = &filename["preek_".len()..filename.len() - ".mp3".len()];
        assert_eq!(prefix.len(), 8);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_storage_key_convention() {
        assert_eq!(storage_key("preek_ab12cd34.mp3"), "mp3/preek_ab12cd34.mp3");
    }

    #[test]
    fn test_object_metadata_keys_are_hyphenated() {
        let request = MediaRequest::from_parts(
            "https://youtube.com/watch?v=X",
            "0:10",
            "0:30",
            Bitrate::Kbps96,
        )
        .unwrap();

        let metadata = ConversionPipeline::object_metadata(&request, "req-123");
        assert_eq!(metadata.get("duration"), Some(&"20".to_string()));
        assert_eq!(metadata.get("bitrate"), Some(&"96k".to_string()));
        assert_eq!(metadata.get("request-id"), Some(&"req-123".to_string()));
        assert!(metadata.keys().all(|k| !k.contains('_')));
    }
}
