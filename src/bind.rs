//! Runtime arguments and their expansion into request templates.
//!
//! [`Arg`] is the dynamic argument vector element of a dispatched call. The
//! binder copies the operation's frozen template, applies any base-url
//! override, builds placeholder bindings from the parameter map, runs the
//! body or form encoder the operation calls for, and resolves.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use url::Url;

use crate::codec::{BodyEncoder, FormEncoder};
use crate::contract::MethodMetadata;
use crate::error::{BoxedError, InvokeError};
use crate::observer::Observer;
use crate::template::{Bindings, RequestTemplate, TemplateError};

/// One argument of a dispatched invocation.
pub enum Arg {
    /// A named-parameter value, substituted into placeholders.
    Text(String),
    /// An absent optional value. Renders as the empty string, except query
    /// values that are exactly one placeholder, which are dropped.
    Null,
    /// A full base url overriding the target's.
    Url(Url),
    /// A raw body value handed to the operation's body encoder.
    Body(serde_json::Value),
    /// Pre-encoded body bytes handed to the operation's body encoder.
    Bytes(Bytes),
    /// The streaming observer.
    Observer(Arc<dyn Observer>),
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Text(value) => f.debug_tuple("Text").field(value).finish(),
            Arg::Null => f.write_str("Null"),
            Arg::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Arg::Body(value) => f.debug_tuple("Body").field(value).finish(),
            Arg::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Arg::Observer(_) => f.write_str("Observer"),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

macro_rules! arg_from_display {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Arg {
            fn from(value: $ty) -> Self {
                Arg::Text(value.to_string())
            }
        }
    )*};
}

arg_from_display!(i32, i64, u32, u64, bool);

impl From<Url> for Arg {
    fn from(value: Url) -> Self {
        Arg::Url(value)
    }
}

impl From<serde_json::Value> for Arg {
    fn from(value: serde_json::Value) -> Self {
        Arg::Body(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

impl From<Arc<dyn Observer>> for Arg {
    fn from(value: Arc<dyn Observer>) -> Self {
        Arg::Observer(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

impl Arg {
    /// The placeholder binding this argument produces, `None` for null.
    fn as_binding(&self, index: usize) -> Result<Option<String>, InvokeError> {
        match self {
            Arg::Text(value) => Ok(Some(value.clone())),
            Arg::Url(url) => Ok(Some(url.to_string())),
            Arg::Null => Ok(None),
            _ => Err(InvokeError::InvalidArgument {
                index,
                expected: "a named-parameter value",
            }),
        }
    }
}

/// Expands an argument vector into a concrete request template, one strategy
/// per operation shape.
pub(crate) enum TemplateBinder {
    /// Named parameters only.
    Resolving,
    /// The operation declares a raw body argument.
    BodyEncoded(Arc<dyn BodyEncoder>),
    /// The operation declares form parameters.
    FormEncoded(Arc<dyn FormEncoder>),
}

impl TemplateBinder {
    pub(crate) fn build(
        &self,
        metadata: &MethodMetadata,
        args: &[Arg],
    ) -> Result<RequestTemplate, InvokeError> {
        let mut template = metadata.template().clone();

        if let Some(index) = metadata.url_index() {
            match args.get(index) {
                Some(Arg::Url(url)) => {
                    // Url normalises an empty path to a trailing slash, which
                    // would double up against a path-rooted template.
                    let prefix = if template.url().starts_with('/') {
                        url.as_str().strip_suffix('/').unwrap_or(url.as_str())
                    } else {
                        url.as_str()
                    };
                    template.insert_url_prefix(prefix);
                }
                Some(Arg::Text(url)) => {
                    template.insert_url_prefix(url);
                }
                Some(Arg::Null) | None => {}
                Some(_) => {
                    return Err(InvokeError::InvalidArgument {
                        index,
                        expected: "a base url",
                    });
                }
            }
        }

        let mut bindings = Bindings::new();
        for (index, names) in metadata.index_to_name() {
            let arg = args.get(*index).ok_or_else(|| {
                InvokeError::from(TemplateError::UnboundParameter {
                    name: names.first().cloned().unwrap_or_default(),
                })
            })?;
            let value = arg.as_binding(*index)?;
            for name in names {
                bindings.insert(name.clone(), value.clone());
            }
        }

        match self {
            TemplateBinder::Resolving => {}
            TemplateBinder::BodyEncoded(encoder) => {
                let index = metadata.body_index().unwrap_or_default();
                let arg = args.get(index).ok_or(InvokeError::InvalidArgument {
                    index,
                    expected: "a body value",
                })?;
                encoder
                    .encode(arg, &mut template)
                    .map_err(|source| InvokeError::Encoding {
                        config_key: metadata.config_key().to_owned(),
                        source: BoxedError::from_err(source),
                    })?;
            }
            TemplateBinder::FormEncoded(encoder) => {
                // A null form argument renders as the empty string.
                let fields: IndexMap<String, String> = metadata
                    .form_params()
                    .iter()
                    .map(|name| {
                        let value = bindings
                            .get(name)
                            .cloned()
                            .flatten()
                            .unwrap_or_default();
                        (name.clone(), value)
                    })
                    .collect();
                encoder
                    .encode(&fields, &mut template)
                    .map_err(|source| InvokeError::Encoding {
                        config_key: metadata.config_key().to_owned(),
                        source: BoxedError::from_err(source),
                    })?;
            }
        }

        Ok(template.resolve(&bindings))
    }
}
