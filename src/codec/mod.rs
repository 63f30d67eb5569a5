//! Codec collaborators: decoders, encoders and the error decoder.
//!
//! The pipeline hands fully buffered bodies to [`Decoder`] /
//! [`ObserverDecoder`] implementations and lets [`BodyEncoder`] /
//! [`FormEncoder`] implementations write into the request template. All of
//! them are selected per operation by config key, with the interface's simple
//! name as fallback. Implementations must be safe for concurrent use.

mod form;
mod json;

use std::time::Duration;

use bytes::Bytes;
use indexmap::IndexMap;
use snafu::Snafu;

use crate::bind::Arg;
use crate::contract::DecodeTarget;
use crate::error::{BoxedError, InvokeError};
use crate::http::Response;
use crate::observer::{Element, Observer};
use crate::template::RequestTemplate;

pub use form::{TemplateFormEncoder, UrlEncodedFormEncoder};
pub use json::{JsonArrayObserverDecoder, JsonBodyEncoder, JsonDecoder};

/// Failures inside a codec.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    /// The body is not valid JSON, or does not fit the target type.
    #[snafu(transparent)]
    Json {
        /// The underlying serde failure.
        source: serde_json::Error,
    },

    /// The body is not valid UTF-8.
    #[snafu(transparent)]
    Utf8 {
        /// The underlying conversion failure.
        source: std::string::FromUtf8Error,
    },

    /// Reading the body failed mid-stream. The pipeline classifies this as a
    /// terminal read error.
    #[snafu(transparent)]
    Io {
        /// The underlying read failure.
        source: std::io::Error,
    },

    /// Form fields could not be url-encoded.
    #[snafu(transparent)]
    Form {
        /// The underlying serializer failure.
        source: serde_html_form::ser::Error,
    },

    /// An observer callback rejected an element.
    #[snafu(display("observer rejected the element"))]
    Callback {
        /// The error returned by the callback.
        source: BoxedError,
    },

    /// The codec does not support the requested decode target.
    #[snafu(display("decode target {target} is not supported by this codec"))]
    Unsupported {
        /// Rendering of the unsupported target.
        target: String,
    },

    /// The codec does not accept this kind of argument.
    #[snafu(display("expected {expected}"))]
    UnsupportedArgument {
        /// What the codec accepts.
        expected: &'static str,
    },
}

impl crate::Error for CodecError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Decodes a buffered 2xx response body into one value.
pub trait Decoder: Send + Sync {
    /// Decodes `body` into a value of the described target type.
    ///
    /// # Errors
    ///
    /// [`CodecError::Io`] when reading failed (terminal, never retried); any
    /// other variant when the bytes do not decode.
    fn decode(&self, body: &Bytes, target: &DecodeTarget) -> Result<Element, CodecError>;
}

/// Decodes a buffered 2xx response body iteratively, pushing each parsed
/// element to the observer. The runtime delivers the terminal callback after
/// this returns; implementations only call `on_next`.
pub trait ObserverDecoder: Send + Sync {
    /// Decodes `body`, calling `observer.on_next` zero or more times.
    ///
    /// # Errors
    ///
    /// A callback rejection must surface as [`CodecError::Callback`]; decode
    /// failures as any other variant.
    fn decode(
        &self,
        body: &Bytes,
        target: &DecodeTarget,
        observer: &dyn Observer,
    ) -> Result<(), CodecError>;
}

/// Renders a raw body argument into the request template.
pub trait BodyEncoder: Send + Sync {
    /// Writes `value` into the template body, setting `Content-Type` only
    /// when the header is not already present.
    ///
    /// # Errors
    ///
    /// Any [`CodecError`] when the argument cannot be rendered.
    fn encode(&self, value: &Arg, template: &mut RequestTemplate) -> Result<(), CodecError>;
}

/// Renders named form fields into the request template.
pub trait FormEncoder: Send + Sync {
    /// Writes `fields` into the template body, consuming any body template.
    ///
    /// # Errors
    ///
    /// Any [`CodecError`] when the fields cannot be rendered.
    fn encode(
        &self,
        fields: &IndexMap<String, String>,
        template: &mut RequestTemplate,
    ) -> Result<(), CodecError>;
}

/// Turns a non-2xx response into the error an invocation fails with.
/// Returning a retryable error re-drives the pipeline.
pub trait ErrorDecoder: Send + Sync {
    /// Classifies the response of the operation identified by `config_key`.
    fn decode(&self, config_key: &str, response: Response) -> InvokeError;
}

/// The default error decoder: a terminal status error, upgraded to a
/// transient one when the server sent a `Retry-After` delay in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorDecoder;

impl ErrorDecoder for DefaultErrorDecoder {
    fn decode(&self, config_key: &str, response: Response) -> InvokeError {
        let status = response.status();
        let error = InvokeError::Status {
            config_key: config_key.to_owned(),
            status,
        };
        match retry_after(&response) {
            Some(delay) => InvokeError::Transient {
                config_key: config_key.to_owned(),
                retry_after: Some(delay),
                source: BoxedError::from_err(error),
            },
            None => error,
        }
    }
}

/// Parses the seconds form of `Retry-After`. The HTTP-date form is ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.header_values("Retry-After")?.first()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Decodes any body as a UTF-8 string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl Decoder for StringDecoder {
    fn decode(&self, body: &Bytes, _target: &DecodeTarget) -> Result<Element, CodecError> {
        let text = String::from_utf8(body.to_vec())?;
        Ok(Box::new(text))
    }
}

/// Pushes the whole body as a single string element.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringObserverDecoder;

impl ObserverDecoder for StringObserverDecoder {
    fn decode(
        &self,
        body: &Bytes,
        target: &DecodeTarget,
        observer: &dyn Observer,
    ) -> Result<(), CodecError> {
        let element = StringDecoder.decode(body, target)?;
        observer
            .on_next(element)
            .map_err(|source| CodecError::Callback { source })
    }
}
