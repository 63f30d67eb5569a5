//! [`Transport`] backed by `reqwest::Client`.
//!
//! The per-operation read timeout is applied to each request. Connection
//! timeouts are a client-wide reqwest setting; configure them with
//! `reqwest::ClientBuilder::connect_timeout` when building the client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use snafu::{ResultExt, Snafu};

use super::{Body, Options, Request, Response, Transport};
use crate::error::BoxedError;

/// Failures converting to or from reqwest's request vocabulary.
#[derive(Debug, Snafu)]
pub enum ReqwestTransportError {
    /// The template's verb is not a valid HTTP method token.
    #[snafu(display("invalid HTTP method {method}"))]
    Method {
        /// The rejected verb.
        method: String,
        /// The underlying parse failure.
        source: http::method::InvalidMethod,
    },

    /// A header name or value cannot be represented on the wire.
    #[snafu(display("invalid header {name}"))]
    Header {
        /// The rejected header name.
        name: String,
    },

    /// The request itself failed.
    #[snafu(transparent)]
    Request {
        /// The underlying reqwest failure.
        source: reqwest::Error,
    },
}

impl crate::Error for ReqwestTransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Method { .. } | Self::Header { .. } => false,
            Self::Request { source } => source.is_retryable(),
        }
    }
}

impl crate::Error for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_connect() || self.is_timeout()
    }
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request, options: &Options) -> Result<Response, BoxedError> {
        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .context(MethodSnafu {
                method: request.method(),
            })
            .map_err(BoxedError::from_err)?;

        let mut headers = HeaderMap::new();
        for (name, values) in request.headers() {
            for value in values {
                let (name, value) = HeaderName::from_bytes(name.as_bytes())
                    .ok()
                    .zip(HeaderValue::from_str(value).ok())
                    .ok_or_else(|| {
                        BoxedError::from_err(ReqwestTransportError::Header { name: name.clone() })
                    })?;
                headers.append(name, value);
            }
        }

        let mut builder = self
            .request(method, request.url())
            .headers(headers)
            .timeout(options.read_timeout());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(ReqwestTransportError::from)
            .map_err(BoxedError::from_err)?;

        let status = response.status();
        let mut out = Response::new(status);
        if let Some(reason) = status.canonical_reason() {
            out = out.reason(reason);
        }
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.header(name.as_str(), value);
            }
        }
        Ok(out.body(Body::deferred(async move {
            response
                .bytes()
                .await
                .map_err(ReqwestTransportError::from)
                .map_err(BoxedError::from_err)
        })))
    }
}
