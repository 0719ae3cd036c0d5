use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection to {url} failed: {details}")]
    Connect { url: String, details: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Invalid request URL {url}: {details}")]
    InvalidUrl { url: String, details: String },

    #[error("Failed to read response body from {url}: {details}")]
    Body { url: String, details: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    pub fn connect(url: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            details: details.into(),
        }
    }

    pub fn body(url: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Body {
            url: url.into(),
            details: details.into(),
        }
    }
}

/// Failure of a single provider fetch.
///
/// Only [`ProviderError::Unreachable`] is transient; the other variants mean
/// the configured resource (or its marketplace response) is unusable as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} is unreachable: {details}")]
    Unreachable {
        provider: String,
        status: Option<u16>,
        details: String,
    },

    #[error("{provider} has no release for the configured resource: {details}")]
    NotFound { provider: String, details: String },

    #[error("{provider} returned a malformed response: {details}")]
    MalformedResponse { provider: String, details: String },
}

impl ProviderError {
    pub fn unreachable(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Unreachable {
            provider: provider.into(),
            status: None,
            details: details.into(),
        }
    }

    pub fn unreachable_status(provider: impl Into<String>, status: u16, body_snippet: &str) -> Self {
        Self::Unreachable {
            provider: provider.into(),
            status: Some(status),
            details: format!("HTTP {status}{body_snippet}"),
        }
    }

    pub fn not_found(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
            details: details.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            details: details.into(),
        }
    }

    pub fn malformed_from<E>(provider: impl Into<String>, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::malformed(provider, error.to_string())
    }

    pub fn from_transport(provider: impl Into<String>, error: &TransportError) -> Self {
        Self::unreachable(provider, error.to_string())
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Unreachable { provider, .. }
            | Self::NotFound { provider, .. }
            | Self::MalformedResponse { provider, .. } => provider,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
