use anyhow::{Context, Result};
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_secretsmanager::Client as SecretsClient;
use std::collections::HashMap;
use std::path::Path;

use crate::cookies::CredentialBundle;

/// Upload the finished MP3 to S3 with request metadata, encrypted at rest.
/// Transport errors propagate to the caller; there is no internal retry.
pub async fn upload_mp3(
    s3_client: &S3Client,
    bucket: &str,
    key: &str,
    file_path: &Path,
    metadata: HashMap<String, String>,
) -> Result<()> {
    let content = fs_err::read(file_path)?;

    tracing::info!(
        "Uploading to S3: s3://{}/{} ({})",
        bucket,
        key,
        crate::utils::format_file_size(content.len() as u64)
    );

    let mut request = s3_client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(content.into())
        .content_type("audio/mpeg")
        .server_side_encryption(ServerSideEncryption::Aes256);

    for (name, value) in metadata {
        request = request.metadata(name, value);
    }

    request
        .send()
        .await
        .context("Failed to upload MP3 to S3")?;

    Ok(())
}

/// Retrieve the optional cookie bundle from Secrets Manager.
///
/// A missing secret is a normal outcome (cookies are optional) and so is an
/// unreadable one: both fall back to anonymous download attempts.
pub async fn fetch_cookie_bundle(
    secrets_client: &SecretsClient,
    secret_name: &str,
) -> Option<CredentialBundle> {
    tracing::info!("Retrieving cookies from Secrets Manager: {}", secret_name);

    let response = match secrets_client
        .get_secret_value()
        .secret_id(secret_name)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            let service_error = err.into_service_error();
            if service_error.is_resource_not_found_exception() {
                tracing::info!(
                    "Cookies secret not found: {} (this is optional)",
                    secret_name
                );
            } else {
                tracing::warn!("Could not retrieve cookies: {}", service_error);
            }
            return None;
        }
    };

    let secret_string = response.secret_string()?;
    match serde_json::from_str::<CredentialBundle>(secret_string) {
        Ok(bundle) => {
            tracing::info!("Successfully retrieved YouTube cookies from Secrets Manager");
            Some(bundle)
        }
        Err(err) => {
            tracing::warn!("Cookie secret is not a valid credential bundle: {}", err);
            None
        }
    }
}
