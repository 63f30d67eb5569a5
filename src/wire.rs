//! Passive observation of requests and responses.
//!
//! A [`Wire`] sees every request after targeting and every response after its
//! body has been buffered, on every retry attempt. It observes; it cannot
//! rewrite.

use crate::http::{Request, Response};
use crate::target::Target;

/// Observation hooks around each transport round-trip.
pub trait Wire: Send + Sync {
    /// Called with the concrete request before the transport executes it.
    fn on_request(&self, target: &dyn Target, request: &Request) {
        let _ = (target, request);
    }

    /// Called with the buffered response before classification.
    fn on_response(&self, target: &dyn Target, response: &Response) {
        let _ = (target, response);
    }
}

/// The default wire: observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpWire;

impl Wire for NoOpWire {}

/// A wire that logs the request line and the response status at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWire;

impl Wire for TracingWire {
    fn on_request(&self, target: &dyn Target, request: &Request) {
        tracing::debug!(
            api = target.interface().name(),
            method = request.method(),
            url = request.url(),
            "---> request"
        );
    }

    fn on_response(&self, target: &dyn Target, response: &Response) {
        tracing::debug!(
            api = target.interface().name(),
            status = response.status().as_u16(),
            bytes = response.body_bytes().map_or(0, bytes::Bytes::len),
            "<--- response"
        );
    }
}
