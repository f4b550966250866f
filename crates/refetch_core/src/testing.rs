// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for exercising the engine without a real transport.
//!
//! Available under the `test-util` feature. [`FakeTransport`] stands in for
//! an endpoint's handler and keeps every request parked until the test
//! resolves it, so tests control exactly when and in what order responses
//! arrive. [`RecordingProbe`] captures the event stream, which is how tests
//! observe outcomes that leave no trace in the state, such as a discarded
//! stale response.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::TransportError;
use crate::event::{Event, EventHook};
use crate::token::CancelToken;

/// A transport whose responses are handed out manually.
///
/// Each call records its arguments and parks until [`resolve_next`] supplies
/// an outcome. Resolution is first-in first-out, so a test that wants the
/// *first* request to lose a race resolves the second one later.
///
/// Cloning shares the call log and the queue.
///
/// [`resolve_next`]: FakeTransport::resolve_next
#[derive(Clone, Debug, Default)]
pub struct FakeTransport {
    calls: Arc<Mutex<Vec<Value>>>,
    waiting: Arc<Mutex<VecDeque<oneshot::Sender<Result<Value, TransportError>>>>>,
}

impl FakeTransport {
    /// Creates a transport with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler closure to register on an endpoint.
    pub fn handler(
        &self,
    ) -> impl Fn(Value, CancelToken) -> BoxFuture<'static, Result<Value, TransportError>>
    + Clone
    + Send
    + Sync
    + 'static {
        let calls = Arc::clone(&self.calls);
        let waiting = Arc::clone(&self.waiting);
        move |args, _token| {
            calls.lock().push(args);
            let (sender, receiver) = oneshot::channel();
            waiting.lock().push_back(sender);
            Box::pin(async move {
                receiver
                    .await
                    .unwrap_or_else(|_canceled| Err(TransportError::new("transport dropped")))
            })
        }
    }

    /// The number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The arguments of every call made so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }

    /// The number of calls still waiting for a response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.waiting.lock().len()
    }

    /// Completes the oldest waiting call with the given outcome.
    ///
    /// Returns `false` if no call was waiting, or if the caller stopped
    /// listening before the response arrived.
    pub fn resolve_next(&self, outcome: Result<Value, TransportError>) -> bool {
        let sender = self.waiting.lock().pop_front();
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Completes the newest waiting call with the given outcome.
    ///
    /// Lets a test make a later request settle before an earlier one, the
    /// out-of-order arrival that stale-response handling exists for.
    pub fn resolve_last(&self, outcome: Result<Value, TransportError>) -> bool {
        let sender = self.waiting.lock().pop_back();
        match sender {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// An event hook that records everything it sees.
#[derive(Clone, Debug, Default)]
pub struct RecordingProbe {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingProbe {
    /// Creates a probe with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The hook to install on the engine builder.
    #[must_use]
    pub fn hook(&self) -> EventHook {
        let events = Arc::clone(&self.events);
        Arc::new(move |event| events.lock().push(event.clone()))
    }

    /// Every event observed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// How many late responses were discarded.
    #[must_use]
    pub fn stale_discards(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::StaleResponseDiscarded { .. }))
            .count()
    }

    /// Empties the log.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transport_records_calls_and_resolves_in_fifo_order() {
        let transport = FakeTransport::new();
        let handler = transport.handler();

        let first = handler(json!(1), CancelToken::new());
        let second = handler(json!(2), CancelToken::new());
        assert_eq!(transport.calls(), vec![json!(1), json!(2)]);
        assert_eq!(transport.pending(), 2);

        assert!(transport.resolve_next(Ok(json!("first"))));
        assert!(transport.resolve_next(Err(TransportError::new("second failed"))));
        assert!(!transport.resolve_next(Ok(Value::Null)));

        assert_eq!(futures::executor::block_on(first), Ok(json!("first")));
        assert_eq!(
            futures::executor::block_on(second),
            Err(TransportError::new("second failed"))
        );
    }

    #[test]
    fn dropped_caller_reports_unresolvable() {
        let transport = FakeTransport::new();
        let handler = transport.handler();
        drop(handler(json!(1), CancelToken::new()));
        assert!(!transport.resolve_next(Ok(Value::Null)));
    }

    #[test]
    fn probe_counts_stale_discards() {
        use crate::entry::RequestId;
        use crate::key::CacheKey;

        let probe = RecordingProbe::new();
        let hook = probe.hook();
        hook(&Event::StaleResponseDiscarded {
            key: CacheKey::from_raw("k"),
            request_id: RequestId(1),
        });
        hook(&Event::EntryEvicted {
            key: CacheKey::from_raw("k"),
        });

        assert_eq!(probe.stale_discards(), 1);
        assert_eq!(probe.events().len(), 2);

        probe.clear();
        assert!(probe.events().is_empty());
    }
}
