//! HTTP transport abstractions.
//!
//! This module defines the types that decouple the runtime from any specific
//! HTTP implementation. Users provide their own [`Transport`] (e.g. backed by
//! `reqwest`, enabled with the `transport-reqwest` feature, or an in-process
//! stub for tests) and the pipeline operates against these types.

#[cfg(feature = "transport-reqwest")]
mod reqwest_0_12;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use indexmap::IndexMap;

use crate::error::BoxedError;

/// Per-operation transport options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl Options {
    /// Options with explicit timeouts.
    #[must_use]
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Time allowed for connection establishment.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time allowed for the response to arrive and be read.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

/// A frozen HTTP request: verb, complete url, headers and optional body.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: String,
    headers: IndexMap<String, Vec<String>>,
    body: Option<Bytes>,
}

impl Request {
    /// Builds a request. Normally produced by
    /// [`RequestTemplate::request`](crate::template::RequestTemplate::request).
    #[must_use]
    pub fn new(
        method: String,
        url: String,
        headers: IndexMap<String, Vec<String>>,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// The HTTP verb.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The complete url, query string included.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The header multimap in insertion order.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, Vec<String>> {
        &self.headers
    }

    /// The body, when one was rendered.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Same textual form as a resolved template: request line, header lines,
/// blank line and body.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} HTTP/1.1", self.method, self.url)?;
        for (name, values) in &self.headers {
            for value in values {
                writeln!(f, "{name}: {value}")?;
            }
        }
        if let Some(body) = &self.body {
            writeln!(f)?;
            write!(f, "{}", String::from_utf8_lossy(body))?;
        }
        Ok(())
    }
}

/// A one-shot deferred read of a response body.
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<Bytes, BoxedError>> + Send>>;

/// A response body: already buffered, or a deferred read that may fail.
///
/// The pipeline buffers deferred bodies before classification; a failure at
/// that point is the terminal "error reading" case.
pub enum Body {
    /// The complete body bytes.
    Buffered(Bytes),
    /// A pending read of the complete body.
    Deferred(BodyFuture),
}

impl Body {
    /// A body from in-memory bytes.
    pub fn buffered(bytes: impl Into<Bytes>) -> Self {
        Body::Buffered(bytes.into())
    }

    /// A body that will be read on demand.
    pub fn deferred(
        read: impl Future<Output = Result<Bytes, BoxedError>> + Send + 'static,
    ) -> Self {
        Body::Deferred(Box::pin(read))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Body::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// An HTTP response as produced by a [`Transport`].
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: IndexMap<String, Vec<String>>,
    body: Option<Body>,
}

impl Response {
    /// A response with the given status and no headers or body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: IndexMap::new(),
            body: None,
        }
    }

    /// Sets the reason phrase.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds a header value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// The response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase, when the transport reported one.
    #[must_use]
    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// The header multimap.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, Vec<String>> {
        &self.headers
    }

    /// Values of the first header matching `name`, ignoring ASCII case.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Drives any deferred body read, returning a response whose body is
    /// fully buffered.
    ///
    /// # Errors
    ///
    /// The deferred read's failure; the response is consumed.
    pub async fn buffer(mut self) -> Result<Response, BoxedError> {
        match self.body.take() {
            Some(Body::Deferred(read)) => self.body = Some(Body::Buffered(read.await?)),
            other => self.body = other,
        }
        Ok(self)
    }

    /// The buffered body bytes, when present and already buffered.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Some(Body::Buffered(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// Executes frozen requests. Implementations must be safe for concurrent use;
/// the runtime shares one transport across every operation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes `request`, honouring the operation's `options`.
    ///
    /// # Errors
    ///
    /// Any failure before a response status line arrives. Such failures are
    /// classified retryable by the pipeline.
    async fn execute(&self, request: Request, options: &Options) -> Result<Response, BoxedError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxedError;

    #[tokio::test]
    async fn buffer_resolves_a_deferred_body() {
        let response = Response::new(StatusCode::OK)
            .body(Body::deferred(async { Ok(Bytes::from_static(b"payload")) }));
        let buffered = response.buffer().await.unwrap();
        assert_eq!(buffered.body_bytes(), Some(&Bytes::from_static(b"payload")));
    }

    #[tokio::test]
    async fn buffer_surfaces_the_read_failure() {
        let response = Response::new(StatusCode::OK).body(Body::deferred(async {
            Err(BoxedError::from_err(std::io::Error::other(
                "connection reset mid-body",
            )))
        }));
        assert!(response.buffer().await.is_err());
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = Response::new(StatusCode::SERVICE_UNAVAILABLE).header("Retry-After", "2");
        assert_eq!(
            response.header_values("retry-after"),
            Some(["2".to_owned()].as_slice())
        );
        assert!(response.header_values("Location").is_none());
    }

    #[test]
    fn request_textual_form_matches_the_template_rendering() {
        let mut headers = IndexMap::new();
        headers.insert("Accept".to_owned(), vec!["application/json".to_owned()]);
        let request = Request::new(
            "POST".to_owned(),
            "http://localhost/login".to_owned(),
            headers,
            Some(Bytes::from_static(b"{}")),
        );
        assert_eq!(
            request.to_string(),
            "POST http://localhost/login HTTP/1.1\nAccept: application/json\n\n{}"
        );
    }
}
