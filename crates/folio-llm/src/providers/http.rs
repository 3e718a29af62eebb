//! HTTP plumbing shared by the vendor adapters

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{LlmError, Result};

use super::types::Provider;

/// Build the client every adapter shares. The timeout is the only
/// cancellation a chat call ever sees.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(LlmError::Client)
}

/// Send a request and decode a JSON body, keeping vendor status codes intact
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::transport(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(LlmError::Api {
            provider,
            status: status.as_u16(),
            message: error_text,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| LlmError::transport(provider, e))?;
    if body.trim().is_empty() {
        return Err(LlmError::EmptyResponse { provider });
    }

    debug!("{} response: {} bytes", provider, body.len());

    serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}
