// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mutation invocation and tag-driven invalidation.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use refetch_core::{CancelToken, Event, RequestId, Result, TransportError};
use serde_json::Value;

use crate::engine::Engine;

/// Options for one mutation invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct MutationOptions {
    track: bool,
}

impl MutationOptions {
    /// The default options: the mutation's record is dropped once it
    /// settles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the mutation's record in the cache after it settles, so its
    /// outcome can be read through
    /// [`select_mutation`](Engine::select_mutation). Tracked records live
    /// until [`forget_mutation`](Engine::forget_mutation).
    #[must_use]
    pub fn tracked() -> Self {
        Self { track: true }
    }

    /// Whether the record outlives settlement.
    #[must_use]
    pub fn is_tracked(self) -> bool {
        self.track
    }
}

/// A running mutation.
///
/// Awaiting it yields the mutation's outcome. The state effects do not wait
/// for the caller: by the time the future resolves, the mutation record has
/// settled and every query invalidated by the mutation's tags has already
/// been moved to pending. Dropping the future abandons the result but not
/// the mutation, which runs to completion either way.
#[derive(Debug)]
pub struct ActiveMutation {
    request_id: RequestId,
    receiver: oneshot::Receiver<std::result::Result<Value, TransportError>>,
}

impl ActiveMutation {
    /// The mutation's request id, usable with
    /// [`select_mutation`](Engine::select_mutation) and
    /// [`forget_mutation`](Engine::forget_mutation).
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for ActiveMutation {
    type Output = std::result::Result<Value, TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver).poll(cx).map(|sent| {
            sent.unwrap_or_else(|_canceled| {
                Err(TransportError::new("mutation driver dropped before completing"))
            })
        })
    }
}

impl Engine {
    /// Invokes a mutation endpoint.
    ///
    /// Mutations never deduplicate: every invocation runs its handler. On
    /// success, the endpoint's invalidated tags are resolved against the
    /// arguments and every cached query providing one of them is refetched
    /// before the returned future resolves. A failed mutation invalidates
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`](refetch_core::Error::UnknownEndpoint)
    /// if `endpoint` is not a registered mutation endpoint.
    pub fn invoke(
        &self,
        endpoint: &str,
        args: Value,
        options: MutationOptions,
    ) -> Result<ActiveMutation> {
        let def = self.registry().resolve_mutation(endpoint)?;
        let request_id = self.next_request_id();
        self.dispatch(vec![Event::MutationStarted {
            request_id,
            endpoint: def.name().to_string(),
            args: args.clone(),
            track: options.is_tracked(),
        }]);

        let tags = def.invalidated_tags(&args);
        let fut = def.start(args, CancelToken::new());
        let (sender, receiver) = oneshot::channel();
        let engine = self.clone();
        self.spawner().spawn(async move {
            let outcome = fut.await;
            match &outcome {
                Ok(result) => {
                    engine.dispatch(vec![Event::MutationFulfilled {
                        request_id,
                        result: result.clone(),
                    }]);
                    engine.invalidate(&tags);
                }
                Err(error) => {
                    tracing::debug!(request_id = request_id.0, %error, "mutation rejected");
                    engine.dispatch(vec![Event::MutationRejected {
                        request_id,
                        error: error.clone(),
                    }]);
                }
            }
            let _ = sender.send(outcome);
        });

        Ok(ActiveMutation {
            request_id,
            receiver,
        })
    }

    /// Releases a tracked mutation record.
    pub fn forget_mutation(&self, request_id: RequestId) {
        self.dispatch(vec![Event::MutationForgotten { request_id }]);
    }
}
