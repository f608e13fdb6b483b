//! Segment extraction: slice a time window out of a media artifact and
//! encode it to MP3 with ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::artifact::{ResolvedArtifact, StreamHint};
use crate::request::Bitrate;
use crate::ConverterError;

/// Hard wall-clock cap on a single ffmpeg run (5 minutes).
pub const EXTRACTION_TIMEOUT_SECS: u64 = 300;

/// The final MP3 product of one request.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub byte_size: u64,
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: Bitrate,
}

/// Invokes ffmpeg to slice a fixed time window out of a media artifact and
/// encode it to mono 44.1 kHz MP3 at the requested bitrate.
pub struct SegmentExtractor {
    ffmpeg: String,
    ffprobe: String,
}

impl SegmentExtractor {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Probe whether the input carries a video stream. A failed probe counts
    /// as "has video" so `-vn` still gets applied; applying it to an
    /// audio-only container is harmless, the probe just gives clearer
    /// diagnostics when it works.
    async fn probe_has_video(&self, input: &Path) -> bool {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "csv=p=0",
            ])
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let has_video = !String::from_utf8_lossy(&out.stdout).trim().is_empty();
                tracing::debug!("Probe of {}: video={}", input.display(), has_video);
                has_video
            }
            _ => {
                tracing::debug!(
                    "ffprobe failed for {}, assuming a video stream is present",
                    input.display()
                );
                true
            }
        }
    }

    fn build_args(
        input: &Path,
        output: &Path,
        start_seconds: i64,
        duration: i64,
        bitrate: Bitrate,
        disable_video: bool,
    ) -> Vec<String> {
        // -ss ahead of -i for fast seek; -t bounds the read afterwards
        let mut args: Vec<String> = vec![
            "-ss".to_string(),
            start_seconds.to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-t".to_string(),
            duration.to_string(),
        ];
        if disable_video {
            args.push("-vn".to_string());
        }
        args.extend([
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-ab".to_string(),
            bitrate.as_str().to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "44100".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-y".to_string(),
            output.display().to_string(),
        ]);
        args
    }

    /// Slice `[start_seconds, end_seconds)` out of the artifact into an MP3
    /// at `output_path`. A clean subprocess exit without a non-empty output
    /// file is a failure, not a silent success.
    pub async fn extract(
        &self,
        artifact: &ResolvedArtifact,
        output_path: &Path,
        start_seconds: i64,
        end_seconds: i64,
        bitrate: Bitrate,
    ) -> Result<OutputArtifact, ConverterError> {
        let duration = end_seconds - start_seconds;

        let disable_video = match artifact.stream_hint {
            StreamHint::AudioOnly => false,
            StreamHint::MaybeVideo => self.probe_has_video(&artifact.path).await,
        };

        let args = Self::build_args(
            &artifact.path,
            output_path,
            start_seconds,
            duration,
            bitrate,
            disable_video,
        );

        tracing::info!(
            "Extracting audio: {}s to {}s ({}s) at {}",
            start_seconds,
            end_seconds,
            duration,
            bitrate
        );
        tracing::debug!("Running: {} {}", self.ffmpeg, args.join(" "));

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| ConverterError::ExtractionFailed {
            exit_code: None,
            diagnostic: format!("failed to spawn ffmpeg: {}", err),
        })?;

        // Dropping the future on timeout kills the child (kill_on_drop)
        let output = match timeout(
            Duration::from_secs(EXTRACTION_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(ConverterError::ExtractionFailed {
                    exit_code: None,
                    diagnostic: format!("failed to collect ffmpeg output: {}", err),
                })
            }
            Err(_) => return Err(ConverterError::ExtractionTimeout(EXTRACTION_TIMEOUT_SECS)),
        };

        if !output.status.success() {
            return Err(ConverterError::ExtractionFailed {
                exit_code: output.status.code(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let byte_size = match fs_err::metadata(output_path) {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                return Err(ConverterError::ExtractionFailed {
                    exit_code: output.status.code(),
                    diagnostic: "ffmpeg exited cleanly but produced no output file".to_string(),
                })
            }
        };

        tracing::info!(
            "Audio extraction successful: {}",
            crate::utils::format_file_size(byte_size)
        );

        Ok(OutputArtifact {
            path: output_path.to_path_buf(),
            byte_size,
            sample_rate: 44100,
            channels: 1,
            bitrate,
        })
    }
}

impl Default for SegmentExtractor {
    fn default() -> Self {
        Self::new()
    }
}
