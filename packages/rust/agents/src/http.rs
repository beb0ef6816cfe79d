//! Shared HTTP client for network scouts.

use std::time::Duration;

use hunter_shared::{FetchFailure, FetchFailureKind, HttpConfig, HunterError, Result};
use reqwest::Client;

/// Build the client shared by every HTTP scout in a run.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| HunterError::Network(format!("failed to build HTTP client: {e}")))
}

/// Classify a transport error from reqwest.
pub(crate) fn transport_failure(context: &str, err: reqwest::Error) -> FetchFailure {
    let kind = if err.is_timeout() {
        FetchFailureKind::Timeout
    } else {
        FetchFailureKind::Network
    };
    FetchFailure::new(kind, format!("{context}: {err}"))
}

/// Turn a non-success response into a classified failure.
pub(crate) fn check_status(
    context: &str,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, FetchFailure> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchFailure::from_status(status.as_u16(), context))
    }
}
