// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Response to an asset request: status line, size and a lazily read body
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP access used for feed documents and media reachability checks
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body as bytes
    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error>;

    /// Open a response without reading the body
    async fn open_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
        (**self).get_bytes(url).await
    }

    async fn open_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        (**self).open_stream(url).await
    }
}

/// Default HTTP client implementation using reqwest
#[derive(Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a preconfigured reqwest::Client (timeouts, proxies, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
        self.client.get(url).send().await?.bytes().await
    }

    async fn open_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        Ok(HttpResponse {
            status,
            content_length,
            body: Box::pin(response.bytes_stream()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            content_length: None,
            body: Box::pin(futures::stream::empty()),
        }
    }

    #[test]
    fn success_covers_2xx_only() {
        assert!(response(200).is_success());
        assert!(response(206).is_success());
        assert!(!response(304).is_success());
        assert!(!response(404).is_success());
    }

    #[test]
    fn reqwest_client_can_be_shared() {
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new());
        let _cloned = client.clone();
    }
}
