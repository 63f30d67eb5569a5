//! Building dispatchers from interface descriptions.
//!
//! [`Charade`] is the factory: it owns the transport, the collaborator maps,
//! the retry policy and the streaming executor. [`Charade::new_instance`]
//! parses a target's interface through the contract, wires one handler per
//! operation and returns an [`ApiClient`] dispatch object. Collaborators are
//! selected by config key first, then by the interface's simple name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bon::Builder;
use tracing::Instrument as _;

use crate::bind::{Arg, TemplateBinder};
use crate::codec::{
    BodyEncoder, Decoder, DefaultErrorDecoder, ErrorDecoder, FormEncoder, ObserverDecoder,
};
use crate::contract::{
    Contract, ContractError, DecodeTarget, DefaultContract, MethodMetadata,
    NoBodyEncoderForOperationSnafu, NoDecoderForOperationSnafu, NoFormEncoderForOperationSnafu,
    NoObserverDecoderForOperationSnafu,
};
use crate::error::{ClosedSnafu, InvokeError, UnknownMethodSnafu};
use crate::handler::{MethodHandler, ObserverHandler, Pipeline, ReturnValue, SyncHandler};
use crate::http::{Options, Transport};
use crate::retry::RetryPolicy;
use crate::target::Target;
use crate::wire::{NoOpWire, Wire};

/// The scheduling façade for streaming operations. New work is refused after
/// close; in-flight sessions run to completion.
#[derive(Debug, Default)]
pub(crate) struct HttpExecutor {
    closed: AtomicBool,
}

impl HttpExecutor {
    /// Spawns a streaming session, labelled with its config key.
    pub(crate) fn submit(
        &self,
        config_key: &str,
        task: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), InvokeError> {
        if self.closed.load(Ordering::Acquire) {
            return ClosedSnafu.fail();
        }
        let span = tracing::debug_span!("charade", config_key = %config_key);
        drop(tokio::spawn(task.instrument(span)));
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The runtime factory.
///
/// Collaborator maps are keyed by config key
/// (`TestInterface#post()`), falling back to the interface's simple name
/// (`TestInterface`). Operations that need a collaborator with neither key
/// registered fail [`Charade::new_instance`].
#[derive(Builder)]
pub struct Charade {
    /// The HTTP transport shared by every operation.
    transport: Arc<dyn Transport>,

    /// The contract that parses interface descriptions.
    #[builder(default = Arc::new(DefaultContract::new()))]
    contract: Arc<dyn Contract>,

    /// Decoders for synchronous operations with a typed return.
    #[builder(default)]
    decoders: HashMap<String, Arc<dyn Decoder>>,

    /// Decoders for streaming operations with a typed element.
    #[builder(default)]
    observer_decoders: HashMap<String, Arc<dyn ObserverDecoder>>,

    /// Encoders for operations with a raw body argument.
    #[builder(default)]
    body_encoders: HashMap<String, Arc<dyn BodyEncoder>>,

    /// Encoders for operations with form parameters.
    #[builder(default)]
    form_encoders: HashMap<String, Arc<dyn FormEncoder>>,

    /// Per-operation error decoders; the default handles `Retry-After`.
    #[builder(default)]
    error_decoders: HashMap<String, Arc<dyn ErrorDecoder>>,

    /// Per-operation transport options.
    #[builder(default)]
    options: HashMap<String, Options>,

    /// Options for operations without a per-operation entry.
    #[builder(default)]
    default_options: Options,

    /// The retry policy; a fresh retryer is built per invocation.
    #[builder(default)]
    retry: RetryPolicy,

    /// The observation wire.
    #[builder(default = Arc::new(NoOpWire))]
    wire: Arc<dyn Wire>,

    #[builder(skip)]
    executor: Arc<HttpExecutor>,
}

fn select<T: ?Sized>(
    map: &HashMap<String, Arc<T>>,
    config_key: &str,
    interface: &str,
) -> Option<Arc<T>> {
    map.get(config_key).or_else(|| map.get(interface)).cloned()
}

impl Charade {
    /// Wires a dispatcher for the target's interface.
    ///
    /// # Errors
    ///
    /// Any [`ContractError`] from parsing, or the missing-collaborator
    /// variants when an operation's codecs are not registered.
    pub fn new_instance(&self, target: impl Target + 'static) -> Result<ApiClient, ContractError> {
        let target: Arc<dyn Target> = Arc::new(target);
        let interface = target.interface().name().to_owned();
        let parsed = self.contract.parse(target.interface())?;

        let mut handlers = HashMap::with_capacity(parsed.len());
        for metadata in parsed {
            let name = metadata.name().to_owned();
            let handler = self.handler(&interface, &target, metadata)?;
            handlers.insert(name, handler);
        }
        Ok(ApiClient {
            interface,
            handlers,
            executor: Arc::clone(&self.executor),
        })
    }

    fn handler(
        &self,
        interface: &str,
        target: &Arc<dyn Target>,
        metadata: MethodMetadata,
    ) -> Result<MethodHandler, ContractError> {
        let key = metadata.config_key().to_owned();

        let binder = if metadata.form_params().is_empty() {
            if metadata.body_index().is_some() {
                let encoder = select(&self.body_encoders, &key, interface)
                    .ok_or_else(|| NoBodyEncoderForOperationSnafu { config_key: key.as_str() }.build())?;
                TemplateBinder::BodyEncoded(encoder)
            } else {
                TemplateBinder::Resolving
            }
        } else {
            let encoder = select(&self.form_encoders, &key, interface)
                .ok_or_else(|| NoFormEncoderForOperationSnafu { config_key: key.as_str() }.build())?;
            TemplateBinder::FormEncoded(encoder)
        };

        let error_decoder = select(&self.error_decoders, &key, interface)
            .unwrap_or_else(|| Arc::new(DefaultErrorDecoder));
        let options = self
            .options
            .get(&key)
            .or_else(|| self.options.get(interface))
            .copied()
            .unwrap_or(self.default_options);

        let streaming = metadata.observer_index().is_some();
        let typed = matches!(metadata.decode_into(), DecodeTarget::Type(_));

        let pipeline = Arc::new(Pipeline {
            metadata,
            target: Arc::clone(target),
            transport: Arc::clone(&self.transport),
            wire: Arc::clone(&self.wire),
            options,
            retry: self.retry,
            error_decoder,
            binder,
        });

        if streaming {
            let decoder = if typed {
                Some(
                    select(&self.observer_decoders, &key, interface).ok_or_else(|| {
                        NoObserverDecoderForOperationSnafu { config_key: key.as_str() }.build()
                    })?,
                )
            } else {
                None
            };
            Ok(MethodHandler::Observing(ObserverHandler {
                pipeline,
                decoder,
                executor: Arc::clone(&self.executor),
            }))
        } else {
            let decoder = if typed {
                Some(
                    select(&self.decoders, &key, interface)
                        .ok_or_else(|| NoDecoderForOperationSnafu { config_key: key.as_str() }.build())?,
                )
            } else {
                None
            };
            Ok(MethodHandler::Synchronous(SyncHandler { pipeline, decoder }))
        }
    }

    /// Stops accepting streaming work. Idempotent; in-flight sessions finish,
    /// synchronous operations are unaffected.
    pub fn close(&self) {
        self.executor.close();
    }

    /// True once [`Charade::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }
}

/// The dispatch object for one targeted interface. Stateless and shareable
/// across tasks.
pub struct ApiClient {
    interface: String,
    handlers: HashMap<String, MethodHandler>,
    executor: Arc<HttpExecutor>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Invokes the named operation with the given argument vector.
    ///
    /// Synchronous operations run on the caller's task and return their
    /// decoded value. Streaming operations return
    /// [`ReturnValue::Unit`] immediately; their observer receives the
    /// session.
    ///
    /// # Errors
    ///
    /// [`InvokeError::UnknownMethod`] for names outside the interface, any
    /// pipeline failure for synchronous operations, and binding or
    /// [`InvokeError::Closed`] failures for streaming ones.
    pub async fn call(&self, method: &str, args: Vec<Arg>) -> Result<ReturnValue, InvokeError> {
        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| UnknownMethodSnafu { name: method }.build())?;
        handler.invoke(&args).await
    }

    /// The simple name of the interface this client dispatches.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// The operation names this client can dispatch.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// True when the owning factory has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }
}
