//! Intake byte resolution: turn a [`DocumentPayload`] into raw bytes.
//!
//! Transports differ in how they hand over an upload. Some push the bytes
//! inline with the event; most give a short-lived file URL that must be
//! fetched before it expires. Both paths enforce the configured size cap, so
//! nothing oversized ever reaches scratch storage.

use crate::config::BotConfig;
use crate::error::Img2AnyError;
use crate::transport::DocumentPayload;
use std::time::Duration;
use tracing::{debug, info};

/// Resolve a document payload to its bytes, enforcing the upload size cap.
pub async fn resolve_payload(
    payload: DocumentPayload,
    config: &BotConfig,
) -> Result<Vec<u8>, Img2AnyError> {
    let bytes = match payload {
        DocumentPayload::Bytes(bytes) => bytes,
        DocumentPayload::Remote(url) => download(&url, config.download_timeout_secs).await?,
    };

    if bytes.len() > config.max_upload_bytes {
        return Err(Img2AnyError::UploadTooLarge {
            size: bytes.len(),
            limit: config.max_upload_bytes,
        });
    }

    debug!(bytes = bytes.len(), "payload resolved");
    Ok(bytes)
}

/// Download a remote artifact with a timeout.
async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Img2AnyError> {
    info!("downloading upload from: {url}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2AnyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2AnyError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2AnyError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Img2AnyError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Img2AnyError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    Ok(bytes.to_vec())
}
