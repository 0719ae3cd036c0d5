//! In-memory [`HttpTransport`] serving canned responses, for tests that must
//! not touch the network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
enum Canned {
    Response {
        status: u16,
        final_url: Option<String>,
        body: Vec<u8>,
    },
    Failure(TransportError),
}

/// Unregistered URLs fail with [`TransportError::Connect`].
#[derive(Debug, Default)]
pub struct CannedTransport {
    routes: HashMap<String, Canned>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_text(self, url: &str, status: u16, body: &str) -> Self {
        self.with_bytes(url, status, body.as_bytes().to_vec())
    }

    #[must_use]
    pub fn with_json(self, url: &str, status: u16, body: &serde_json::Value) -> Self {
        self.with_bytes(url, status, body.to_string().into_bytes())
    }

    #[must_use]
    pub fn with_bytes(mut self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.routes.insert(
            url.to_string(),
            Canned::Response {
                status,
                final_url: None,
                body,
            },
        );
        self
    }

    /// Serve `body` for `url` as if the request had been redirected to
    /// `final_url`.
    #[must_use]
    pub fn with_redirect(mut self, url: &str, final_url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Canned::Response {
                status,
                final_url: Some(final_url.to_string()),
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_failure(mut self, url: &str, error: TransportError) -> Self {
        self.routes.insert(url.to_string(), Canned::Failure(error));
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match self.routes.get(&url) {
            Some(Canned::Response {
                status,
                final_url,
                body,
            }) => Ok(HttpResponse::from_bytes(
                *status,
                final_url.clone().unwrap_or(url),
                body.clone(),
            )),
            Some(Canned::Failure(error)) => Err(error.clone()),
            None => Err(TransportError::connect(url, "no canned response registered")),
        }
    }
}
