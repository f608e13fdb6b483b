//! Artifact normalization and scratch-space hygiene.
//!
//! Every download strategy declares where its artifact lands (see
//! `download::strategy::ArtifactContract`), so resolution is a contract check
//! rather than a directory scan.

use anyhow::bail;
use std::path::PathBuf;

use crate::download::strategy::ArtifactContract;
use crate::download::DownloadedArtifact;
use crate::Result;

/// Whether the artifact is known to be audio-only or may still carry a
/// video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamHint {
    AudioOnly,
    MaybeVideo,
}

/// A downloaded artifact checked against its strategy's contract and ready
/// for segment extraction.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub stream_hint: StreamHint,
    pub byte_size: u64,
}

/// Validate a downloaded artifact against its declared contract and derive
/// the stream hint the extractor uses to decide on video-stream handling.
pub fn resolve(artifact: &DownloadedArtifact) -> Result<ResolvedArtifact> {
    let meta = fs_err::metadata(&artifact.path)?;
    if meta.len() == 0 {
        bail!(
            "Artifact from '{}' is empty: {}",
            artifact.strategy_label,
            artifact.path.display()
        );
    }

    let stream_hint = match artifact.contract {
        // Audio extraction strips any video stream during postprocessing
        ArtifactContract::Fixed("m4a") => StreamHint::AudioOnly,
        // Pinned video containers and raw last-resort downloads may carry one
        ArtifactContract::Fixed(_) | ArtifactContract::Reported => StreamHint::MaybeVideo,
    };

    tracing::debug!(
        "Resolved artifact from '{}': {} ({:?})",
        artifact.strategy_label,
        artifact.path.display(),
        stream_hint
    );

    Ok(ResolvedArtifact {
        path: artifact.path.clone(),
        stream_hint,
        byte_size: meta.len(),
    })
}

/// Best-effort deletion of per-request scratch files. Failures are logged
/// and swallowed; cleanup must never mask the request's primary outcome.
pub fn cleanup_files(paths: &[PathBuf]) {
    for path in paths {
        if !path.exists() {
            continue;
        }
        match fs_err::remove_file(path) {
            Ok(()) => tracing::info!("Cleaned up temporary file: {}", path.display()),
            Err(err) => tracing::warn!("Could not clean up {}: {}", path.display(), err),
        }
    }
}
