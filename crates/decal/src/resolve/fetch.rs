//! Network access for remote images.
//!
//! The resolver talks to the network only through [`ImageFetcher`], so the
//! fetch strategy can be swapped out (tests use in-memory fakes). The
//! default [`HttpFetcher`] is backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderName, ORIGIN};
use thiserror::Error;
use url::Url;

/// How a request is made, mirroring a browser's CORS modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// No credentials; the request announces the storefront origin and the
    /// response is readable only if the server approves it.
    Anonymous,
    /// Credentials allowed, no CORS negotiation. Pixels from such a response
    /// taint any surface they are drawn on.
    Credentialed,
}

/// Why a fetch produced no bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("cross-origin response was not approved")]
    NotApproved,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Transport(err.to_string()),
        }
    }
}

/// A successful fetch response.
#[derive(Debug, Clone, Default)]
pub struct FetchedImage {
    bytes: Vec<u8>,
    content_type: Option<String>,
    allow_origin: Option<String>,
}

impl FetchedImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    /// Sets the `Content-Type` the server reported (builder style).
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the `Access-Control-Allow-Origin` the server reported (builder style).
    pub fn with_allow_origin(mut self, allow_origin: impl Into<String>) -> Self {
        self.allow_origin = Some(allow_origin.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn allow_origin(&self) -> Option<&str> {
        self.allow_origin.as_deref()
    }
}

/// Fetches image bytes for the resolver.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches `url` in the given mode.
    ///
    /// Implementations report the raw response; deciding whether the pixels
    /// are readable is left to the caller.
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchedImage, FetchError>;
}

/// `reqwest`-backed [`ImageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetcher {
    /// Creates a fetcher that announces `origin` on anonymous requests.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("decal/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, origin })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchedImage, FetchError> {
        debug!(url = url.as_str(), mode:? = mode; "Fetching image");

        let mut request = self.client.get(url.clone());
        if mode == FetchMode::Anonymous {
            request = request.header(ORIGIN, self.origin.origin().ascii_serialization());
        }

        let response = request.send().await?.error_for_status()?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let allow_origin = header(ACCESS_CONTROL_ALLOW_ORIGIN);

        let bytes = response.bytes().await?;
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
            allow_origin,
        })
    }
}
