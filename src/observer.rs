//! The streaming push sink.
//!
//! Streaming operations take an [`Observer`]: the runtime delivers decoded
//! elements through `on_next` and finishes every session with exactly one
//! terminal call, `on_success` or `on_failure`, even when a callback fails.
//! Elements are type-erased; decoders document what they box.

use std::any::Any;

use snafu::Snafu;
use tokio::sync::mpsc;

use crate::error::{BoxedError, InvokeError};

/// A decoded element pushed to an observer.
pub type Element = Box<dyn Any + Send>;

/// A push sink for one streaming invocation.
///
/// Calls arrive from a single task: elements in decoder order, then one
/// terminal. An `Err` from [`Observer::on_next`] stops delivery and deflects
/// the session to [`Observer::on_failure`]. A panic from `on_failure` is
/// re-surfaced to the executor, not swallowed.
pub trait Observer: Send + Sync {
    /// Receives one decoded element.
    ///
    /// # Errors
    ///
    /// Any error; it terminates the session through `on_failure`.
    fn on_next(&self, element: Element) -> Result<(), BoxedError>;

    /// The session completed; no further calls follow.
    fn on_success(&self);

    /// The session failed; no further calls follow.
    fn on_failure(&self, error: InvokeError);
}

/// One event of a streaming session, as surfaced by [`ChannelObserver`].
#[derive(Debug)]
pub enum StreamEvent {
    /// A decoded element.
    Next(Element),
    /// The successful terminal.
    Success,
    /// The failed terminal.
    Failure(InvokeError),
}

/// The consumer side of a [`ChannelObserver`] went away.
#[derive(Debug, Snafu)]
#[snafu(display("stream consumer dropped the receiver"))]
pub struct ReceiverClosed;

impl crate::Error for ReceiverClosed {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// An observer that forwards its session into an unbounded channel, for
/// consumers that prefer pulling a stream of events over implementing
/// callbacks.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelObserver {
    /// A channel observer plus the receiver its session drains into.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn on_next(&self, element: Element) -> Result<(), BoxedError> {
        self.tx
            .send(StreamEvent::Next(element))
            .map_err(|_| BoxedError::from_err(ReceiverClosed))
    }

    fn on_success(&self) {
        let _ = self.tx.send(StreamEvent::Success);
    }

    fn on_failure(&self, error: InvokeError) {
        let _ = self.tx.send(StreamEvent::Failure(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_forwards_the_session() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_next(Box::new("one".to_owned())).unwrap();
        observer.on_success();

        let StreamEvent::Next(element) = rx.try_recv().unwrap() else {
            unreachable!("expected an element first");
        };
        assert_eq!(*element.downcast::<String>().unwrap(), "one");
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Success));
    }

    #[test]
    fn dropped_receiver_fails_on_next() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        assert!(observer.on_next(Box::new(1_i64)).is_err());
    }
}
