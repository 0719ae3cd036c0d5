use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

pub const MAX_REDIRECTS: usize = 10;

pub type BodyStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub struct HttpResponse {
    status: u16,
    url: String,
    body: BodyStream,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, url: impl Into<String>, body: BodyStream) -> Self {
        Self {
            status,
            url: url.into(),
            body,
        }
    }

    #[must_use]
    pub fn from_bytes(status: u16, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self::new(status, url, stream::once(async move { Ok(body) }).boxed())
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The final URL of the response, after any redirects were followed.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn into_body(self) -> BodyStream {
        self.body
    }

    /// Collect the whole body into memory.
    ///
    /// # Errors
    /// Returns the first error yielded by the body stream.
    pub async fn bytes(mut self) -> Result<Vec<u8>, TransportError> {
        let mut collected = Vec::new();
        while let Some(chunk) = self.body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected)
    }

    /// Read at most `limit` bytes of the body and drop the rest unread.
    ///
    /// # Errors
    /// Returns the first error yielded before `limit` bytes arrived.
    pub async fn prefix(mut self, limit: usize) -> Result<Vec<u8>, TransportError> {
        let mut collected = Vec::new();
        while collected.len() < limit {
            let Some(chunk) = self.body.next().await else {
                break;
            };
            collected.extend_from_slice(&chunk?);
        }
        collected.truncate(limit);
        Ok(collected)
    }

    /// Collect the body and decode it as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    /// Returns the first error yielded by the body stream.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Performs the GET requests issued by provider connections and downloads.
///
/// Implementations follow redirects and report the final URL on the
/// response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport backed by a fresh `reqwest` client.
    ///
    /// # Errors
    /// Returns an error when the TLS backend or client cannot be initialised.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|error| TransportError::Client(error.to_string()))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| classify_reqwest_error(&request.url, &error))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body_url = final_url.clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| TransportError::body(body_url.clone(), error.to_string()))
            })
            .boxed();

        Ok(HttpResponse::new(status, final_url, body))
    }
}

fn classify_reqwest_error(url: &str, error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_string(),
            details: error.to_string(),
        }
    } else if error.is_body() || error.is_decode() {
        TransportError::body(url, error.to_string())
    } else {
        TransportError::connect(url, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use futures_util::stream;

    use super::{HttpRequest, HttpResponse};
    use crate::error::TransportError;
    use std::time::Duration;

    #[test]
    fn request_builder_accumulates_headers() {
        let request = HttpRequest::get("https://example.com", Duration::from_secs(5))
            .header("User-Agent", "beacon")
            .header("Accept", "application/json");
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.headers[0], ("User-Agent".to_string(), "beacon".to_string()));
    }

    #[tokio::test]
    async fn text_concatenates_streamed_chunks() {
        let chunks = vec![Ok(b"1.2".to_vec()), Ok(b".3\n".to_vec())];
        let response = HttpResponse::new(200, "https://example.com", stream::iter(chunks).boxed());

        assert!(response.is_success());
        let text = response.text().await.expect("body should be collected");
        assert_eq!(text, "1.2.3\n");
    }

    #[tokio::test]
    async fn bytes_surfaces_mid_stream_errors() {
        let chunks = vec![
            Ok(b"partial".to_vec()),
            Err(TransportError::body("https://example.com", "connection reset")),
        ];
        let response = HttpResponse::new(200, "https://example.com", stream::iter(chunks).boxed());

        let error = response.bytes().await.expect_err("stream error should surface");
        assert!(matches!(error, TransportError::Body { .. }));
    }

    #[tokio::test]
    async fn prefix_stops_reading_at_the_limit() {
        let endless = stream::repeat_with(|| Ok(vec![b'x'; 1024])).boxed();
        let response = HttpResponse::new(500, "https://example.com", endless);

        let prefix = response.prefix(1500).await.expect("prefix should be read");
        assert_eq!(prefix.len(), 1500);
    }

    #[test]
    fn non_2xx_is_not_success() {
        assert!(!HttpResponse::from_bytes(404, "https://example.com", Vec::new()).is_success());
        assert!(!HttpResponse::from_bytes(301, "https://example.com", Vec::new()).is_success());
    }
}
