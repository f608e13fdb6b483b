use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::request::Bitrate;

#[derive(Parser)]
#[command(
    name = "mp3maker",
    about = "Mp3maker - Clip a time-bounded MP3 segment out of a YouTube video and deliver it to S3",
    version,
    long_about = "Downloads a YouTube video through an ordered ladder of yt-dlp strategies (cookie-authenticated first, last-resort quality last), slices the requested time window out of it with ffmpeg, encodes the slice to mono MP3, and uploads the result to S3."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a YouTube segment to MP3 and upload it
    Convert {
        /// YouTube URL (youtube.com or youtu.be)
        #[arg(value_name = "URL")]
        url: String,

        /// Segment start (seconds, MM:SS, or HH:MM:SS)
        #[arg(value_name = "START")]
        start: String,

        /// Segment end (seconds, MM:SS, or HH:MM:SS)
        #[arg(value_name = "END")]
        end: String,

        /// MP3 bitrate
        #[arg(short, long, value_enum, default_value = "96k")]
        bitrate: Bitrate,

        /// Cookie export JSON file (bypasses Secrets Manager)
        #[arg(long, value_name = "FILE")]
        cookies_file: Option<PathBuf>,
    },

    /// Handle a JSON invocation event and print the JSON response envelope
    Invoke {
        /// Event file (reads stdin if omitted)
        #[arg(value_name = "FILE")]
        event: Option<PathBuf>,

        /// Cookie export JSON file (bypasses Secrets Manager)
        #[arg(long, value_name = "FILE")]
        cookies_file: Option<PathBuf>,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
