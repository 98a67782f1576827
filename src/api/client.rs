use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::{CheckerError, Result};

const USER_AGENT: &str = concat!("bili-archive-checker/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the shared user agent and a request timeout
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| CheckerError::ApiError(format!("Failed to create HTTP client: {}", e)))
}

/// Handle API response (JSON)
pub async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| CheckerError::ApiError(format!("Failed to parse response: {}", e)))
    } else {
        let error_msg = match status {
            StatusCode::NOT_FOUND => "Resource not found".to_string(),
            StatusCode::TOO_MANY_REQUESTS => "Rate limited. Please try again later.".to_string(),
            _ => match response.text().await {
                Ok(text) if !text.is_empty() => format!("API error {}: {}", status, text.trim()),
                _ => format!("API error: {}", status),
            },
        };
        Err(CheckerError::ApiError(error_msg))
    }
}

/// Join a base URL and a path without doubling the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
