//! The two side effects of fetching: issuing a GET and waiting out a backoff

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Status and raw body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Issues GET requests against the registry
#[async_trait]
pub trait Transport: Send + Sync {
    /// Any status is a reply; only failures to get one are errors
    async fn get(&self, url: &Url) -> Result<HttpReply, FetchError>;
}

/// Blocks the fetch for a backoff interval
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// [`Transport`] backed by a single reused `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client; `timeout` of `None` lets requests run unbounded
    pub fn new(timeout: Option<Duration>) -> reqwest::Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("hubsync-ingest/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpReply, FetchError> {
        let transport_error = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();

        Ok(HttpReply { status, body })
    }
}
