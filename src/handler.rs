//! Per-operation execution pipelines.
//!
//! Every operation gets a handler at construction time. Both variants share
//! one pipeline: bind arguments, target the template, execute through the
//! transport, buffer and classify the response, then decode. Transport
//! failures before the response are retryable; failures while reading or
//! decoding the body are terminal. The retryer re-drives the whole pipeline,
//! building a fresh request from the template on every attempt.

use std::sync::Arc;

use serde_json::Value;
use snafu::ResultExt;

use crate::bind::{Arg, TemplateBinder};
use crate::codec::{CodecError, Decoder, ErrorDecoder, ObserverDecoder, UnsupportedSnafu};
use crate::contract::{DecodeTarget, MethodMetadata};
use crate::error::{BoxedError, ExecutingSnafu, InvokeError, ReadingSnafu};
use crate::factory::HttpExecutor;
use crate::http::{Options, Response, Transport};
use crate::observer::{Element, Observer};
use crate::retry::RetryPolicy;
use crate::target::Target;
use crate::template::RequestTemplate;
use crate::wire::Wire;

/// What a synchronous invocation returns.
pub enum ReturnValue {
    /// The operation declared no return value.
    Unit,
    /// The raw response; body ownership is the caller's.
    Response(Response),
    /// A decoded value, boxed by the operation's decoder.
    Value(Element),
}

impl std::fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnValue::Unit => f.write_str("Unit"),
            ReturnValue::Response(response) => f.debug_tuple("Response").field(response).finish(),
            ReturnValue::Value(_) => f.write_str("Value"),
        }
    }
}

impl ReturnValue {
    /// The decoded value as `T`, when the decoder boxed that type.
    #[must_use]
    pub fn downcast<T: 'static>(self) -> Option<Box<T>> {
        match self {
            ReturnValue::Value(element) => element.downcast().ok(),
            _ => None,
        }
    }

    /// The raw response, for operations that declared one.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            ReturnValue::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Deserializes a decoded [`serde_json::Value`] into a concrete type.
    ///
    /// # Errors
    ///
    /// [`CodecError::Unsupported`] when the value is not a raw JSON value;
    /// [`CodecError::Json`] when it does not fit `T`.
    pub fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, CodecError> {
        match self {
            ReturnValue::Value(element) => match element.downcast::<Value>() {
                Ok(value) => Ok(serde_json::from_value(*value)?),
                Err(_) => UnsupportedSnafu {
                    target: "a raw JSON value return",
                }
                .fail(),
            },
            _ => UnsupportedSnafu {
                target: "a decoded value return",
            }
            .fail(),
        }
    }
}

/// Collaborators shared by both handler variants for one operation.
pub(crate) struct Pipeline {
    pub(crate) metadata: MethodMetadata,
    pub(crate) target: Arc<dyn Target>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) wire: Arc<dyn Wire>,
    pub(crate) options: Options,
    pub(crate) retry: RetryPolicy,
    pub(crate) error_decoder: Arc<dyn ErrorDecoder>,
    pub(crate) binder: TemplateBinder,
}

/// A classified 2xx response plus the request identity that produced it.
struct RoundTrip {
    method: String,
    url: String,
    response: Response,
}

impl Pipeline {
    /// One attempt: target the template, execute, buffer, observe, classify.
    async fn round_trip(&self, template: &RequestTemplate) -> Result<RoundTrip, InvokeError> {
        let request = self.target.apply(template.clone())?;
        self.wire.on_request(&*self.target, &request);
        let method = request.method().to_owned();
        let url = request.url().to_owned();

        let response = self
            .transport
            .execute(request, &self.options)
            .await
            .context(ExecutingSnafu {
                method: method.clone(),
                url: url.clone(),
            })?;
        let response = response.buffer().await.context(ReadingSnafu {
            method: method.clone(),
            url: url.clone(),
        })?;
        self.wire.on_response(&*self.target, &response);

        if response.status().is_success() {
            Ok(RoundTrip {
                method,
                url,
                response,
            })
        } else {
            Err(self
                .error_decoder
                .decode(self.metadata.config_key(), response))
        }
    }

    /// Maps a codec failure onto the pipeline's error classification: an I/O
    /// failure while reading is terminal "error reading"; a callback
    /// rejection keeps its identity; anything else is a decode failure.
    fn decode_failure(&self, method: &str, url: &str, error: CodecError) -> InvokeError {
        match error {
            CodecError::Io { source } => InvokeError::Reading {
                method: method.to_owned(),
                url: url.to_owned(),
                source: BoxedError::from_err(source),
            },
            CodecError::Callback { source } => InvokeError::Callback {
                config_key: self.metadata.config_key().to_owned(),
                source,
            },
            other => InvokeError::Decode {
                config_key: self.metadata.config_key().to_owned(),
                source: BoxedError::from_err(other),
            },
        }
    }
}

/// The per-operation handler, in its synchronous or streaming shape.
pub(crate) enum MethodHandler {
    Synchronous(SyncHandler),
    Observing(ObserverHandler),
}

impl MethodHandler {
    pub(crate) async fn invoke(&self, args: &[Arg]) -> Result<ReturnValue, InvokeError> {
        match self {
            MethodHandler::Synchronous(handler) => handler.invoke(args).await,
            MethodHandler::Observing(handler) => handler.invoke(args),
        }
    }

}

/// Runs the pipeline on the caller's task and returns the decoded value.
pub(crate) struct SyncHandler {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) decoder: Option<Arc<dyn Decoder>>,
}

impl SyncHandler {
    async fn invoke(&self, args: &[Arg]) -> Result<ReturnValue, InvokeError> {
        let pipeline = &self.pipeline;
        let template = pipeline.binder.build(&pipeline.metadata, args)?;
        let mut retryer = pipeline.retry.retryer();
        loop {
            match self.attempt(&template).await {
                Ok(value) => return Ok(value),
                Err(error) => retryer.continue_or_propagate(error).await?,
            }
        }
    }

    async fn attempt(&self, template: &RequestTemplate) -> Result<ReturnValue, InvokeError> {
        let pipeline = &self.pipeline;
        let RoundTrip {
            method,
            url,
            response,
        } = pipeline.round_trip(template).await?;

        match pipeline.metadata.decode_into() {
            DecodeTarget::Response => Ok(ReturnValue::Response(response)),
            DecodeTarget::Unit => Ok(ReturnValue::Unit),
            target @ DecodeTarget::Type(_) => {
                let Some(decoder) = &self.decoder else {
                    // The factory refuses to build typed operations without a
                    // decoder, so this cannot be reached through it.
                    return Err(pipeline.decode_failure(
                        &method,
                        &url,
                        UnsupportedSnafu {
                            target: "a typed return without a decoder",
                        }
                        .build(),
                    ));
                };
                let body = response.body_bytes().cloned().unwrap_or_default();
                decoder
                    .decode(&body, target)
                    .map(ReturnValue::Value)
                    .map_err(|error| pipeline.decode_failure(&method, &url, error))
            }
        }
    }
}

/// Submits the pipeline to the executor and pushes results to the observer.
pub(crate) struct ObserverHandler {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) decoder: Option<Arc<dyn ObserverDecoder>>,
    pub(crate) executor: Arc<HttpExecutor>,
}

impl ObserverHandler {
    /// Binds synchronously, then hands the session to the executor and
    /// returns. The observer receives every later outcome: elements, then
    /// exactly one terminal.
    fn invoke(&self, args: &[Arg]) -> Result<ReturnValue, InvokeError> {
        let pipeline = Arc::clone(&self.pipeline);
        let template = pipeline.binder.build(&pipeline.metadata, args)?;

        let index = pipeline.metadata.observer_index().unwrap_or_default();
        let observer = match args.get(index) {
            Some(Arg::Observer(observer)) => Arc::clone(observer),
            _ => {
                return Err(InvokeError::InvalidArgument {
                    index,
                    expected: "an observer",
                });
            }
        };

        let decoder = self.decoder.clone();
        let config_key = pipeline.metadata.config_key().to_owned();
        self.executor
            .submit(&config_key, async move {
                let mut retryer = pipeline.retry.retryer();
                let outcome = loop {
                    match Self::attempt(&pipeline, decoder.as_deref(), &template, &*observer).await
                    {
                        Ok(()) => break Ok(()),
                        Err(error) => {
                            if let Err(terminal) = retryer.continue_or_propagate(error).await {
                                break Err(terminal);
                            }
                        }
                    }
                };
                match outcome {
                    Ok(()) => observer.on_success(),
                    Err(error) => observer.on_failure(error),
                }
            })?;
        Ok(ReturnValue::Unit)
    }

    async fn attempt(
        pipeline: &Pipeline,
        decoder: Option<&dyn ObserverDecoder>,
        template: &RequestTemplate,
        observer: &dyn Observer,
    ) -> Result<(), InvokeError> {
        let RoundTrip {
            method,
            url,
            response,
        } = pipeline.round_trip(template).await?;

        match pipeline.metadata.decode_into() {
            DecodeTarget::Response => observer
                .on_next(Box::new(response))
                .map_err(|source| InvokeError::Callback {
                    config_key: pipeline.metadata.config_key().to_owned(),
                    source,
                }),
            DecodeTarget::Unit => Ok(()),
            target @ DecodeTarget::Type(_) => {
                let Some(decoder) = decoder else {
                    return Err(pipeline.decode_failure(
                        &method,
                        &url,
                        UnsupportedSnafu {
                            target: "a typed element without an observer decoder",
                        }
                        .build(),
                    ));
                };
                let body = response.body_bytes().cloned().unwrap_or_default();
                decoder
                    .decode(&body, target, observer)
                    .map_err(|error| pipeline.decode_failure(&method, &url, error))
            }
        }
    }
}
