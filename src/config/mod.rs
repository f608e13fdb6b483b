use anyhow::{Context, Result};
use aws_config::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::request::Bitrate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// AWS configuration
    pub aws: AwsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket the finished MP3s are delivered to
    pub s3_bucket: String,

    /// Secrets Manager secret holding the optional YouTube cookies
    pub cookies_secret_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scratch directory for downloads (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,

    /// Keep local artifacts after the request completes (debugging aid)
    pub keep_artifacts: bool,

    /// Bitrate used when a request does not specify one
    pub default_bitrate: Bitrate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                s3_bucket: String::new(),
                cookies_secret_name: "mp3maker/youtube-cookies".to_string(),
            },
            app: AppConfig {
                temp_dir: None,
                keep_artifacts: false,
                default_bitrate: Bitrate::Kbps96,
            },
        }
    }
}

impl Config {
    /// Load configuration from file (creating a default template when none
    /// exists), apply environment overrides, and validate. The result is
    /// constructed once at startup and passed by reference from there on.
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            serde_yaml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("mp3maker").join("config.yaml"))
    }

    /// Environment wins over the file: the deployed function is configured
    /// entirely through S3_BUCKET / COOKIES_SECRET_NAME / AWS_REGION.
    fn apply_env_overrides(&mut self) {
        if let Ok(bucket) = std::env::var("S3_BUCKET") {
            self.aws.s3_bucket = bucket;
        }
        if let Ok(secret_name) = std::env::var("COOKIES_SECRET_NAME") {
            self.aws.cookies_secret_name = secret_name;
        }
        if let Ok(region) = std::env::var("AWS_REGION") {
            self.aws.region = region;
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.aws.s3_bucket.is_empty() {
            anyhow::bail!("S3 bucket must be configured (config file or S3_BUCKET)");
        }

        Region::new(self.aws.region.clone());

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  AWS Region: {}", self.aws.region);
        println!("  S3 Bucket: {}", self.aws.s3_bucket);
        println!("  Cookies Secret: {}", self.aws.cookies_secret_name);
        println!("  Keep Artifacts: {}", self.app.keep_artifacts);
        println!("  Default Bitrate: {}", self.app.default_bitrate);
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.aws.region.clone())
    }
}
