//! Request and response values exchanged between the interceptor, cache backends, and network.

use std::fmt;

use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Header carrying the request mode on requests issued by a browser.
pub const SEC_FETCH_MODE: &str = "sec-fetch-mode";
/// Header carrying the request destination on requests issued by a browser.
pub const SEC_FETCH_DEST: &str = "sec-fetch-dest";

/// How the request was initiated. Only [`RequestMode::Navigate`] changes routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

impl RequestMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Self::Navigate,
            "same-origin" => Self::SameOrigin,
            "cors" => Self::Cors,
            _ => Self::NoCors,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::SameOrigin => "same-origin",
            Self::NoCors => "no-cors",
            Self::Cors => "cors",
        }
    }
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    Other(String),
}

impl Destination {
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "empty" => Self::Empty,
            "document" => Self::Document,
            "style" => Self::Style,
            "script" => Self::Script,
            "image" => Self::Image,
            "font" => Self::Font,
            "manifest" => Self::Manifest,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Empty => "empty",
            Self::Document => "document",
            Self::Style => "style",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Other(other) => other,
        }
    }

    /// Stylesheets, scripts and images are served cache-first.
    pub fn is_static_asset(&self) -> bool {
        matches!(self, Self::Style | Self::Script | Self::Image)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a cache entry: the request URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outgoing request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub destination: Destination,
}

impl Request {
    /// A plain `GET` with no navigation flag and an empty destination.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            mode: RequestMode::default(),
            destination: Destination::Empty,
        }
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, destination: Destination::Document, ..Self::new(url) }
    }

    /// A subresource load for the given destination.
    pub fn asset(url: Url, destination: Destination) -> Self {
        Self { destination, ..Self::new(url) }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_url(&self.url)
    }

    /// Build a request from an incoming `http` request.
    ///
    /// Relative URIs are resolved against `origin`. Mode and destination come from the
    /// `Sec-Fetch-Mode` and `Sec-Fetch-Dest` headers; missing headers map to the defaults.
    pub fn from_http<B>(request: &http::Request<B>, origin: &Url) -> Result<Self, url::ParseError> {
        let uri = request.uri();
        let url = if uri.scheme().is_some() {
            Url::parse(&uri.to_string())?
        } else {
            let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            origin.join(path)?
        };

        let header = |name: &str| request.headers().get(name).and_then(|value| value.to_str().ok());
        let mode = header(SEC_FETCH_MODE).map(RequestMode::parse).unwrap_or_default();
        let destination = header(SEC_FETCH_DEST).map(Destination::parse).unwrap_or_default();

        Ok(Self { url, method: request.method().clone(), mode, destination })
    }
}

/// A response produced by the network or replayed from a cache region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { url, status, content_type: None, body: body.into() }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether the status is in the `200..=299` range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert into an `http` response for serving back to a client.
    pub fn into_http(self) -> Result<http::Response<Vec<u8>>, http::Error> {
        let status = StatusCode::from_u16(self.status)?;
        let mut builder = http::Response::builder().status(status);
        let content_type =
            self.content_type.as_deref().and_then(|ct| HeaderValue::from_str(ct).ok());
        if let Some(value) = content_type {
            builder = builder.header(CONTENT_TYPE, value);
        }
        builder.body(self.body)
    }
}
