//! HTTP access to the plotting service.

use std::time::Duration;

/// A request failure below the protocol level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// What went wrong, e.g. a connection failure or HTTP status.
    pub message: String,

    /// The response body, when the server answered with an error status.
    pub body: Option<String>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            body: None,
        }
    }
}

/// Issues GET requests and returns the response body.
pub trait Transport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<String, TransportError>;
}

/// Blocking HTTP transport over `reqwest`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<String, TransportError> {
        log::debug!("GET {url} with {query:?}");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| TransportError::new(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| TransportError::new(format!("failed to read response: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(TransportError {
                message: format!("{url} returned {status}"),
                body: (!body.is_empty()).then_some(body),
            })
        }
    }
}
