//! Implements a declarative HTTP API client runtime.
//!
//! Describe an API as an [`InterfaceDesc`] (one [`MethodDesc`] per
//! operation, annotated with its HTTP verb, path, and parameter roles) and
//! [`Charade`] turns the description into a live [`ApiClient`]. Invocations
//! expand a request template from the argument vector, execute through a
//! pluggable [`Transport`], retry transient failures with bounded backoff,
//! and decode 2xx responses into values, or stream decoded elements to an
//! [`Observer`] on a spawned task.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use charade::codec::JsonDecoder;
//! use charade::{
//!     Arg, Charade, HardCodedTarget, InterfaceDesc, MethodDesc, ParamDesc, ReturnKind, TypeExpr,
//! };
//!
//! # async fn run(transport: Arc<dyn charade::Transport>) -> Result<(), Box<dyn std::error::Error>> {
//! let github = InterfaceDesc::new("GitHub").op(
//!     MethodDesc::new("contributors")
//!         .get()
//!         .path("/repos/{owner}/{repo}/contributors")
//!         .param(ParamDesc::of("String").path("owner"))
//!         .param(ParamDesc::of("String").path("repo"))
//!         .returns(ReturnKind::Type(TypeExpr::simple("Contributors"))),
//! );
//!
//! let runtime = Charade::builder()
//!     .transport(transport)
//!     .decoders(HashMap::from([(
//!         "GitHub".to_owned(),
//!         Arc::new(JsonDecoder) as Arc<dyn charade::codec::Decoder>,
//!     )]))
//!     .build();
//!
//! let api = runtime.new_instance(HardCodedTarget::new(github, "https://api.github.com"))?;
//! let contributors = api
//!     .call("contributors", vec![Arg::from("rust-lang"), Arg::from("rust")])
//!     .await?;
//! let entries: serde_json::Value = contributors.json()?;
//! assert!(entries.is_array());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod bind;
pub mod codec;
pub mod contract;
mod error;
mod factory;
mod handler;
pub mod http;
pub mod observer;
pub mod prelude;
mod retry;
mod target;
mod template;
mod types;
mod wire;

pub use crate::bind::Arg;
pub use crate::contract::{
    Contract, ContractError, DecodeTarget, DefaultContract, InterfaceDesc, MethodDesc,
    MethodMetadata, ParamDesc, ReturnKind, Role, config_key,
};
pub use crate::error::{BoxedError, Error, InvokeError};
pub use crate::factory::{ApiClient, Charade};
pub use crate::handler::ReturnValue;
pub use crate::http::{Body, Options, Request, Response, Transport};
pub use crate::observer::{ChannelObserver, Element, Observer, StreamEvent};
pub use crate::retry::{RetryPolicy, Retryer};
pub use crate::target::{HardCodedTarget, Target};
pub use crate::template::{Bindings, RequestTemplate, TemplateError};
pub use crate::types::{InterfaceDecl, TypeError, TypeExpr, TypeRegistry};
pub use crate::wire::{NoOpWire, TracingWire, Wire};

pub use bytes::Bytes;
