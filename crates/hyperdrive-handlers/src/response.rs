//! Delivery of the response document
//!
//! CloudFormation waits for the document on a pre-signed S3 URL. The URL
//! is signed without a content type, so the upload must not send one.

use anyhow::{Context, Result};
use hyperdrive_common::CfnResponse;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for response uploads
pub fn response_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Upload `response` to the pre-signed `url`
pub async fn send_response(client: &Client, url: &str, response: &CfnResponse) -> Result<()> {
    let body = serde_json::to_vec(response).context("Failed to serialize response document")?;

    debug!(
        logical_id = %response.logical_resource_id,
        bytes = body.len(),
        "Sending response document"
    );
    client
        .put(url)
        .header(CONTENT_TYPE, "")
        .body(body)
        .send()
        .await
        .context("Failed to send response document")?
        .error_for_status()
        .context("Response document was rejected")?;

    info!(
        logical_id = %response.logical_resource_id,
        status = ?response.status,
        "Sent response document"
    );
    Ok(())
}
