//! HTTP helpers: error classification and JSON fetching

use std::error::Error as StdError;
use std::io;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::ports::ProviderError;

/// Maximum characters of an error body kept in messages
const MAX_BODY_PREVIEW: usize = 200;

impl ProviderError {
    /// Classify an HTTP status: 429/500/502/503 are transient, the rest fatal
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = preview(body);
        match status.as_u16() {
            429 | 500 | 502 | 503 => ProviderError::Transient {
                status: Some(status.as_u16()),
                message,
            },
            code => ProviderError::Fatal { status: Some(code), message },
        }
    }

    /// Classify a transport error: timeouts, connect failures and resets are transient
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || is_connection_reset(err) {
            return ProviderError::transient(err.to_string());
        }
        if err.is_decode() {
            return ProviderError::DataShape(err.to_string());
        }
        if let Some(status) = err.status() {
            return ProviderError::from_status(status, &err.to_string());
        }
        ProviderError::fatal(err.to_string())
    }
}

fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = current.source();
    }
    false
}

fn preview(body: &str) -> String {
    if body.chars().count() > MAX_BODY_PREVIEW {
        let truncated: String = body.chars().take(MAX_BODY_PREVIEW).collect();
        format!("{}...[truncated]", truncated)
    } else {
        body.to_string()
    }
}

/// Send a request and decode a JSON body, classifying every failure
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status, &body));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::from_reqwest(&e))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        ProviderError::DataShape(format!(
            "JSON parse error at line {}, column {}: {}",
            e.line(),
            e.column(),
            e
        ))
    })
}
