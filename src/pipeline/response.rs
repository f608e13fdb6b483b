//! JSON response envelopes for the invocation interface. Every failure,
//! whatever its internal classification, collapses into the single 500
//! shape; the distinctions live in the logs.

use serde_json::{json, Value};

use crate::config::Config;
use crate::cookies::CredentialBundle;
use crate::pipeline::{new_request_id, ConversionPipeline, ConversionReceipt};
use crate::request::{ConversionEvent, MediaRequest};

/// Create standardized success response
pub fn success_response(receipt: &ConversionReceipt) -> Value {
    json!({
        "statusCode": 200,
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*"
        },
        "body": {
            "success": true,
            "message": "Audio processing completed successfully",
            "data": {
                "request_id": receipt.request_id,
                "s3_bucket": receipt.s3_bucket,
                "s3_key": receipt.s3_key,
                "filename": receipt.filename,
                "duration_seconds": receipt.duration_seconds,
                "download_expires_in": receipt.download_expires_in
            }
        }
    })
}

/// Create standardized error response
pub fn error_response(error_message: &str, request_id: &str) -> Value {
    json!({
        "statusCode": 500,
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*"
        },
        "body": {
            "success": false,
            "error": error_message,
            "request_id": request_id,
            "message": "Audio processing failed"
        }
    })
}

/// Handle one raw invocation event: validate, convert, and shape the outcome
/// into the response envelope.
pub async fn handle_invocation(
    config: Config,
    raw_event: &str,
    cookie_override: Option<CredentialBundle>,
) -> Value {
    let request_id = new_request_id();
    tracing::info!("Processing request {}", request_id);

    let event: ConversionEvent = match serde_json::from_str(raw_event) {
        Ok(event) => event,
        Err(err) => {
            return error_response(&format!("Invalid event JSON: {}", err), &request_id)
        }
    };

    let request = match MediaRequest::from_event(&event, config.app.default_bitrate) {
        Ok(request) => request,
        Err(err) => {
            tracing::error!("Request {} failed validation: {}", request_id, err);
            return error_response(&err.to_string(), &request_id);
        }
    };

    let pipeline = match ConversionPipeline::new(config).await {
        Ok(pipeline) => pipeline,
        Err(err) => return error_response(&format!("{:#}", err), &request_id),
    };

    match pipeline.convert(&request, &request_id, cookie_override).await {
        Ok(receipt) => success_response(&receipt),
        Err(err) => {
            tracing::error!("Request {} failed: {:#}", request_id, err);
            error_response(&format!("{:#}", err), &request_id)
        }
    }
}
