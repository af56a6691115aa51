//! Live network access.

use std::future::Future;
use std::sync::Arc;

use http::header::CONTENT_TYPE;

use crate::error::NetworkError;
use crate::types::{Request, Response};

/// Performs live fetches.
///
/// Implementations fail only when the server cannot be reached; an HTTP error status is a
/// successful fetch.
pub trait Network: Send + Sync {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send;
}

impl<N: Network> Network for Arc<N> {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
        N::fetch(self, request)
    }
}

/// [`Network`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let failed = |err: reqwest::Error| NetworkError::new(request.url.as_str(), err.to_string());

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(failed)?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(failed)?;

        tracing::trace!(url = %url, status, bytes = body.len(), "network response");
        Ok(Response { url, status, content_type, body: body.to_vec() })
    }
}
