use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ProviderError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

const BODY_SNIPPET_CHARS: usize = 160;
// Enough bytes for the snippet even when every character is four bytes wide.
const BODY_SNIPPET_BYTES: usize = BODY_SNIPPET_CHARS * 4;

/// Substitute positional `{0}`, `{1}`, ... placeholders in a URL template.
#[must_use]
pub fn expand_template(template: &str, params: &[&str]) -> String {
    params
        .iter()
        .enumerate()
        .fold(template.to_string(), |url, (index, value)| {
            url.replace(&format!("{{{index}}}"), value)
        })
}

/// One open request to a marketplace endpoint.
///
/// The response is held until a body reader consumes the connection or the
/// connection is dropped, whichever comes first.
#[derive(Debug)]
pub struct ProviderConnection {
    provider: String,
    response: HttpResponse,
}

impl ProviderConnection {
    /// Expand `template` with `params` and issue the GET.
    ///
    /// # Errors
    /// Transport failures, throttling (403/429) and 5xx responses map to
    /// [`ProviderError::Unreachable`]; any other non-2xx status maps to
    /// [`ProviderError::NotFound`].
    pub async fn open(
        transport: &dyn HttpTransport,
        provider: &str,
        template: &str,
        params: &[&str],
    ) -> Result<Self, ProviderError> {
        let url = expand_template(template, params);
        debug!("{provider}: GET {url}");

        let request = HttpRequest::get(&url, READ_TIMEOUT).header("User-Agent", USER_AGENT);
        let response = transport
            .get(request)
            .await
            .map_err(|error| ProviderError::from_transport(provider, &error))?;

        let status = response.status();
        if response.is_success() {
            return Ok(Self {
                provider: provider.to_string(),
                response,
            });
        }

        let snippet = response
            .prefix(BODY_SNIPPET_BYTES)
            .await
            .ok()
            .map(|body| response_snippet(&String::from_utf8_lossy(&body), BODY_SNIPPET_CHARS))
            .unwrap_or_default();

        if is_transient_status(status) {
            Err(ProviderError::unreachable_status(provider, status, &snippet))
        } else {
            Err(ProviderError::not_found(
                provider,
                format!("HTTP {status} from {url}{snippet}"),
            ))
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status()
    }

    /// Final URL after redirects.
    #[must_use]
    pub fn url(&self) -> &str {
        self.response.url()
    }

    /// # Errors
    /// Returns [`ProviderError::Unreachable`] when the body cannot be read.
    pub async fn text(self) -> Result<String, ProviderError> {
        let Self { provider, response } = self;
        response
            .text()
            .await
            .map_err(|error| ProviderError::from_transport(provider, &error))
    }

    /// # Errors
    /// Returns [`ProviderError::Unreachable`] when the body cannot be read and
    /// [`ProviderError::MalformedResponse`] when it does not match `T`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ProviderError> {
        let Self { provider, response } = self;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| ProviderError::from_transport(&provider, &error))?;
        serde_json::from_slice(&bytes).map_err(|error| ProviderError::malformed_from(provider, error))
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 403 | 408 | 429) || status >= 500
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.trim().chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
