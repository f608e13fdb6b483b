//! Mp3maker - A Rust CLI tool for clipping MP3 segments out of YouTube videos
//!
//! This library downloads a YouTube video through an ordered ladder of yt-dlp
//! strategies, slices a time-bounded segment out of it with ffmpeg, encodes the
//! slice to MP3, and delivers the result to S3.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod download;
pub mod extract;
pub mod pipeline;
pub mod request;
pub mod storage;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{ConversionPipeline, ConversionReceipt};
pub use request::{Bitrate, MediaRequest};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the converter
#[derive(thiserror::Error, Debug)]
pub enum ConverterError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Source media permanently unavailable: {0}")]
    PermanentUpstream(String),

    #[error("Download failed: {0}")]
    TransientUpstream(String),

    #[error("Audio extraction failed (exit code {exit_code:?}): {diagnostic}")]
    ExtractionFailed {
        exit_code: Option<i32>,
        diagnostic: String,
    },

    #[error("Audio extraction timed out after {0} seconds")]
    ExtractionTimeout(u64),

    #[error("Storage upload failed: {0}")]
    Storage(String),
}
