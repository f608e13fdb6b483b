use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mp3maker::cli::{Cli, Commands};
use mp3maker::config::Config;
use mp3maker::cookies::CredentialBundle;
use mp3maker::pipeline::{self, response, ConversionPipeline};
use mp3maker::request::MediaRequest;
use mp3maker::utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mp3maker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Check for required external dependencies (non-fatal in containers)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("{} Dependency check warnings:", style("⚠").yellow());
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    match cli.command {
        Commands::Convert {
            url,
            start,
            end,
            bitrate,
            cookies_file,
        } => {
            let config = Config::load().await?;
            let request = MediaRequest::from_parts(&url, &start, &end, bitrate)?;
            let cookie_override = cookies_file
                .map(|path| CredentialBundle::from_export_file(&path))
                .transpose()?;

            let pipeline = ConversionPipeline::new(config).await?;
            let request_id = pipeline::new_request_id();

            tracing::info!("Starting conversion for URL: {}", url);

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap(),
                );
                spinner.enable_steady_tick(Duration::from_millis(120));
                spinner
            };
            progress.set_message("Downloading and extracting segment...");

            let result = pipeline.convert(&request, &request_id, cookie_override).await;
            match result {
                Ok(receipt) => {
                    progress.finish_with_message("Conversion complete");
                    println!("Uploaded: s3://{}/{}", receipt.s3_bucket, receipt.s3_key);
                    println!(
                        "Segment length: {}",
                        utils::format_duration(receipt.duration_seconds as f64)
                    );
                    println!("Request id: {}", receipt.request_id);
                }
                Err(err) => {
                    progress.finish_with_message("Conversion failed");
                    return Err(err);
                }
            }
        }
        Commands::Invoke {
            event,
            cookies_file,
        } => {
            let config = Config::load().await?;
            let raw_event = match event {
                Some(path) => fs_err::read_to_string(path)?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let cookie_override = cookies_file
                .map(|path| CredentialBundle::from_export_file(&path))
                .transpose()?;

            let envelope = response::handle_invocation(config, &raw_event, cookie_override).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file initialized.");
                config.display();
            }
        }
    }

    Ok(())
}
