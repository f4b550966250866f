// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The event vocabulary consumed by the state reducer.

use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::RequestId;
use crate::error::TransportError;
use crate::key::CacheKey;
use crate::tag::Tag;

/// A state transition applied to a [`Snapshot`](crate::Snapshot).
///
/// Events are the only way cache state changes. They carry any timestamps
/// they need so the reducer never reads a clock, which keeps
/// [`Snapshot::apply`](crate::Snapshot::apply) a pure function of snapshot
/// and event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Event {
    /// A subscription attached to a cache key, creating the entry if absent.
    SubscriberAdded {
        /// The entry's key.
        key: CacheKey,
        /// The endpoint name, recorded on a newly created entry.
        endpoint: String,
        /// The call arguments, recorded on a newly created entry.
        args: Value,
        /// The tags the entry's results provide.
        provides: Vec<Tag>,
    },
    /// A subscription detached from a cache key.
    SubscriberRemoved {
        /// The entry's key.
        key: CacheKey,
        /// When the detach happened; stamps `idle_since` if the count hits
        /// zero.
        at: SystemTime,
    },
    /// A fetch was initiated for an entry.
    QueryStarted {
        /// The entry's key.
        key: CacheKey,
        /// The new request's id, which supersedes any earlier in-flight id.
        request_id: RequestId,
    },
    /// An in-flight fetch succeeded.
    QueryFulfilled {
        /// The entry's key.
        key: CacheKey,
        /// The request that produced the result.
        request_id: RequestId,
        /// The result value.
        data: Value,
        /// When the result arrived.
        at: SystemTime,
    },
    /// An in-flight fetch failed.
    QueryRejected {
        /// The entry's key.
        key: CacheKey,
        /// The request that failed.
        request_id: RequestId,
        /// The failure.
        error: TransportError,
    },
    /// A response arrived for a request that is no longer current.
    ///
    /// Applying this event changes nothing; it exists so observers can see
    /// that a late response was dropped rather than lost.
    StaleResponseDiscarded {
        /// The entry's key.
        key: CacheKey,
        /// The superseded request.
        request_id: RequestId,
    },
    /// An idle entry was removed from the cache.
    EntryEvicted {
        /// The entry's key.
        key: CacheKey,
    },
    /// A mutation was invoked.
    MutationStarted {
        /// The mutation's request id, which is also its record key.
        request_id: RequestId,
        /// The endpoint name.
        endpoint: String,
        /// The call arguments.
        args: Value,
        /// Whether the record outlives settlement.
        track: bool,
    },
    /// A mutation succeeded.
    MutationFulfilled {
        /// The mutation's request id.
        request_id: RequestId,
        /// The result value.
        result: Value,
    },
    /// A mutation failed.
    MutationRejected {
        /// The mutation's request id.
        request_id: RequestId,
        /// The failure.
        error: TransportError,
    },
    /// A tracked mutation record was released.
    MutationForgotten {
        /// The mutation's request id.
        request_id: RequestId,
    },
}

/// An observer invoked with every event the engine applies.
///
/// Hooks run after the event has been applied and published. They must not
/// call back into the engine.
pub type EventHook = Arc<dyn Fn(&Event) + Send + Sync>;
