//! Buildable HTTP request templates with `{name}` placeholders.
//!
//! A [`RequestTemplate`] is mutable while the contract assembles it and while
//! encoders write into it; [`RequestTemplate::resolve`] expands placeholders
//! against runtime bindings, and [`RequestTemplate::request`] freezes the
//! result into a [`Request`]. Placeholders may appear in the url path, query
//! values, header values, and the body template.

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use snafu::Snafu;

use crate::http::Request;

/// Runtime values for template placeholders.
///
/// A `None` value is a parameter that was bound to null: it renders as the
/// empty string everywhere except a query value that is exactly one
/// placeholder, which is dropped from the query string entirely.
pub type Bindings = IndexMap<String, Option<String>>;

/// Name of the content type header, written once.
pub(crate) const CONTENT_TYPE: &str = "Content-Type";

/// Characters percent-encoded when a binding is expanded into a url path or
/// query value. Everything outside the RFC 3986 reserved and unreserved sets
/// is escaped; reserved characters pass through untouched.
const EXPANSION: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// Failures when freezing a template into a request.
#[derive(Debug, Snafu)]
pub enum TemplateError {
    /// `{name}` placeholders survived resolution.
    #[snafu(display("template still contains unresolved placeholders: {}", names.join(", ")))]
    NotFullyResolved {
        /// The placeholder names left in the template.
        names: Vec<String>,
    },

    /// An argument position named by the operation was never supplied.
    #[snafu(display("no argument bound for template parameter {name}"))]
    UnboundParameter {
        /// The parameter that has no binding.
        name: String,
    },
}

/// A mutable HTTP request under construction.
///
/// The url holds the path portion only; queries live in their own
/// insertion-ordered multimap so that order and duplicates survive rendering.
/// The body is either literal bytes or a template string, never both.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: String,
    url: String,
    queries: IndexMap<String, Vec<String>>,
    headers: IndexMap<String, Vec<String>>,
    body: Option<Bytes>,
    body_template: Option<String>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: "GET".to_owned(),
            url: String::new(),
            queries: IndexMap::new(),
            headers: IndexMap::new(),
            body: None,
            body_template: None,
        }
    }
}

impl RequestTemplate {
    /// Creates an empty GET template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP verb. Any uppercase token is accepted, including
    /// extension verbs.
    pub fn set_method(&mut self, verb: impl Into<String>) -> &mut Self {
        self.method = verb.into();
        self
    }

    /// The HTTP verb.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Appends a url fragment. Any `?k=v&k2=v2&flag` portion is lifted out of
    /// the path into the query multimap, preserving insertion order; a bare
    /// key is recorded as present with no values; repeated keys accumulate.
    pub fn append_url(&mut self, fragment: &str) -> &mut Self {
        let path = self.lift_queries(fragment);
        self.url.push_str(&path);
        self
    }

    /// Prefixes the url, lifting any query portion of the prefix the same way
    /// [`RequestTemplate::append_url`] does. Used by targets to prepend the
    /// base url and by url-override arguments to replace it.
    pub fn insert_url_prefix(&mut self, prefix: &str) -> &mut Self {
        let path = self.lift_queries(prefix);
        self.url.insert_str(0, &path);
        self
    }

    /// The path portion of the url, placeholders included.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Adds query values under `name`. An empty iterator records the key as
    /// present with no values (a flag).
    pub fn query<I, V>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let slot = self.queries.entry(name.into()).or_default();
        slot.extend(values.into_iter().map(Into::into));
        self
    }

    /// The query multimap in insertion order.
    #[must_use]
    pub fn queries(&self) -> &IndexMap<String, Vec<String>> {
        &self.queries
    }

    /// Adds header values under `name`.
    pub fn header<I, V>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let slot = self.headers.entry(name.into()).or_default();
        slot.extend(values.into_iter().map(Into::into));
        self
    }

    /// The header multimap in insertion order.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, Vec<String>> {
        &self.headers
    }

    /// Sets a literal byte body, clearing any body template. The content type
    /// is only written when the header is not already present, so a
    /// produced-media-type marker wins over an encoder default.
    pub fn set_body(&mut self, bytes: impl Into<Bytes>, content_type: Option<&str>) -> &mut Self {
        self.body = Some(bytes.into());
        self.body_template = None;
        if let Some(value) = content_type
            && !self.headers.contains_key(CONTENT_TYPE)
        {
            self.header(CONTENT_TYPE, [value]);
        }
        self
    }

    /// The literal body, when one has been set or rendered.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Sets a body template with `{name}` placeholders, clearing any literal
    /// body. Literal braces are written as `%7B` / `%7D`; rendering decodes
    /// the expanded template once.
    pub fn set_body_template(&mut self, template: impl Into<String>) -> &mut Self {
        self.body_template = Some(template.into());
        self.body = None;
        self
    }

    /// The unrendered body template.
    #[must_use]
    pub fn body_template(&self) -> Option<&str> {
        self.body_template.as_deref()
    }

    /// Expands every placeholder this template knows a binding for, returning
    /// the expanded template. Bound values are percent-encoded in the url path
    /// and query values, substituted verbatim into header values, and the
    /// body template is rendered into a literal body. Unbound placeholders
    /// remain literal, except query values that are exactly one unbound or
    /// null-bound placeholder, which are dropped (optional query filters).
    ///
    /// Resolving twice with the same bindings yields the same bytes as once.
    #[must_use]
    pub fn resolve(&self, bindings: &Bindings) -> RequestTemplate {
        let mut resolved = self.clone();
        resolved.url = expand(&self.url, bindings, Expansion::Uri);

        let mut queries = IndexMap::new();
        for (name, values) in &self.queries {
            if values.is_empty() {
                queries.insert(name.clone(), Vec::new());
                continue;
            }
            let kept: Vec<String> = values
                .iter()
                .filter(|value| !dropped_query_value(value, bindings))
                .map(|value| expand(value, bindings, Expansion::Uri))
                .collect();
            if !kept.is_empty() {
                queries.insert(name.clone(), kept);
            }
        }
        resolved.queries = queries;

        for values in resolved.headers.values_mut() {
            for value in values.iter_mut() {
                *value = expand(value, bindings, Expansion::Verbatim);
            }
        }

        if self.body_template.is_some() {
            resolved.render_body_template(bindings);
        }
        resolved
    }

    /// Renders the body template into a literal body, consuming the template.
    /// Bound values are expanded percent-encoded and the whole result is
    /// decoded once, so values round-trip and `%7B`/`%7D` in the template
    /// become literal braces.
    pub(crate) fn render_body_template(&mut self, bindings: &Bindings) {
        if let Some(template) = self.body_template.take() {
            let expanded = expand(&template, bindings, Expansion::Uri);
            let decoded = percent_decode_str(&expanded).decode_utf8_lossy().into_owned();
            self.body = Some(Bytes::from(decoded));
        }
    }

    /// Freezes the template into a request, validating that no placeholder
    /// remains anywhere.
    pub fn request(&self) -> Result<Request, TemplateError> {
        let names = self.unresolved();
        if !names.is_empty() {
            return NotFullyResolvedSnafu { names }.fail();
        }
        let mut url = self.url.clone();
        if let Some(line) = query_line(&self.queries) {
            url.push('?');
            url.push_str(&line);
        }
        Ok(Request::new(
            self.method.clone(),
            url,
            self.headers.clone(),
            self.body.clone(),
        ))
    }

    /// Placeholder names still present anywhere in the template.
    fn unresolved(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |input: &str| {
            for name in placeholder_names(input) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_owned());
                }
            }
        };
        push(&self.url);
        for values in self.queries.values() {
            for value in values {
                push(value);
            }
        }
        for values in self.headers.values() {
            for value in values {
                push(value);
            }
        }
        if let Some(template) = &self.body_template {
            push(template);
        }
        names
    }

    fn lift_queries(&mut self, fragment: &str) -> String {
        let Some((path, query)) = fragment.split_once('?') else {
            return fragment.to_owned();
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((key, value)) => self.query(key, [value]),
                None => self.query(pair, std::iter::empty::<String>()),
            };
        }
        path.to_owned()
    }
}

/// `METHOD url[?queries] HTTP/1.1` plus one line per header value, then a
/// blank line and the body when one is present.
impl fmt::Display for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(line) = query_line(&self.queries) {
            write!(f, "?{line}")?;
        }
        writeln!(f, " HTTP/1.1")?;
        for (name, values) in &self.headers {
            for value in values {
                writeln!(f, "{name}: {value}")?;
            }
        }
        if let Some(body) = &self.body {
            writeln!(f)?;
            write!(f, "{}", String::from_utf8_lossy(body))?;
        } else if let Some(template) = &self.body_template {
            writeln!(f)?;
            write!(f, "{template}")?;
        }
        Ok(())
    }
}

/// Renders queries as `k=v` pairs joined by `&` in insertion order; a
/// key with no values renders as the bare key.
pub(crate) fn query_line(queries: &IndexMap<String, Vec<String>>) -> Option<String> {
    if queries.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    for (name, values) in queries {
        if values.is_empty() {
            parts.push(name.clone());
        } else {
            for value in values {
                parts.push(format!("{name}={value}"));
            }
        }
    }
    Some(parts.join("&"))
}

/// Iterates the `{name}` placeholders of a template string.
pub(crate) fn placeholder_names(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input;
    std::iter::from_fn(move || {
        loop {
            let open = rest.find('{')?;
            let Some(len) = rest[open + 1..].find('}') else {
                rest = "";
                return None;
            };
            let name = &rest[open + 1..open + 1 + len];
            rest = &rest[open + 1 + len + 1..];
            if !name.is_empty() && !name.contains('{') {
                return Some(name);
            }
        }
    })
}

#[derive(Clone, Copy)]
enum Expansion {
    /// Percent-encode bound values, leaving URI-reserved characters alone.
    Uri,
    /// Substitute bound values untouched (header values).
    Verbatim,
}

/// True when a query value is exactly one placeholder whose binding is null
/// or absent; such values are dropped rather than rendered.
fn dropped_query_value(value: &str, bindings: &Bindings) -> bool {
    let Some(name) = sole_placeholder(value) else {
        return false;
    };
    !matches!(bindings.get(name), Some(Some(_)))
}

fn sole_placeholder(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        return None;
    }
    Some(inner)
}

fn expand(input: &str, bindings: &Bindings, mode: Expansion) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open + 1..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + 1 + len];
        out.push_str(&rest[..open]);
        match bindings.get(name) {
            Some(bound) => {
                let raw = bound.as_deref().unwrap_or("");
                match mode {
                    Expansion::Uri => {
                        out.push_str(&utf8_percent_encode(raw, EXPANSION).to_string());
                    }
                    Expansion::Verbatim => out.push_str(raw),
                }
            }
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &rest[open + 1 + len + 1..];
    }
    out.push_str(rest);
    out
}
