// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cached query entries and mutation records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;
use crate::tag::Tag;

/// Identifies one initiated request.
///
/// Every fetch and every mutation gets a fresh id. Completion events carry the
/// id of the request they belong to, which is how a superseded request's late
/// response is recognized and discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(
    /// The raw id value.
    pub u64,
);

/// The lifecycle state of a cached query entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    /// The entry exists but no request has produced data or an error yet.
    #[default]
    Uninitialized,
    /// A request is in flight.
    Pending,
    /// The most recent settled request succeeded.
    Fulfilled,
    /// The most recent settled request failed and no earlier success exists
    /// to fall back on, or the failure is the latest word on the entry.
    Rejected,
}

/// One cached query result with its bookkeeping.
///
/// Entries live in the [`Snapshot`](crate::Snapshot) keyed by
/// [`CacheKey`](crate::CacheKey) and are only ever replaced whole by the
/// reducer, never mutated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryEntry {
    pub(crate) endpoint: String,
    pub(crate) args: Value,
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<Value>,
    pub(crate) error: Option<TransportError>,
    pub(crate) last_fulfilled_at: Option<SystemTime>,
    pub(crate) subscriber_count: usize,
    pub(crate) in_flight: Option<RequestId>,
    pub(crate) provides: Vec<Tag>,
    pub(crate) idle_since: Option<SystemTime>,
}

impl QueryEntry {
    pub(crate) fn new(endpoint: String, args: Value, provides: Vec<Tag>) -> Self {
        Self {
            endpoint,
            args,
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            last_fulfilled_at: None,
            subscriber_count: 0,
            in_flight: None,
            provides,
            idle_since: None,
        }
    }

    /// The endpoint this entry belongs to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The arguments the entry was fetched with.
    #[must_use]
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// The entry's lifecycle state.
    #[must_use]
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// The most recent successful result, if any.
    ///
    /// Data survives later rejections and refetches, so consumers can keep
    /// rendering the last known good value while a refresh is in flight.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The most recent failure, if any. Cleared by the next success.
    #[must_use]
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// When the entry last transitioned to [`QueryStatus::Fulfilled`].
    #[must_use]
    pub fn last_fulfilled_at(&self) -> Option<SystemTime> {
        self.last_fulfilled_at
    }

    /// The number of active subscriptions holding this entry live.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// The id of the in-flight request, if one is outstanding.
    #[must_use]
    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    /// The tags this entry's result provides.
    #[must_use]
    pub fn provides(&self) -> &[Tag] {
        &self.provides
    }

    /// Whether the entry provides the given tag.
    #[must_use]
    pub fn provides_tag(&self, tag: &Tag) -> bool {
        self.provides.contains(tag)
    }

    /// When the entry's subscriber count last dropped to zero.
    ///
    /// `None` while the entry has subscribers. Eviction compares this against
    /// the grace period.
    #[must_use]
    pub fn idle_since(&self) -> Option<SystemTime> {
        self.idle_since
    }
}

/// The lifecycle state of a mutation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationStatus {
    /// The mutation is executing.
    Pending,
    /// The mutation succeeded.
    Fulfilled,
    /// The mutation failed.
    Rejected,
}

/// One in-progress or tracked mutation.
///
/// Untracked records are dropped from the snapshot as soon as they settle;
/// tracked records stay until explicitly forgotten so selectors can observe
/// the outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub(crate) endpoint: String,
    pub(crate) args: Value,
    pub(crate) status: MutationStatus,
    pub(crate) result: Option<Value>,
    pub(crate) error: Option<TransportError>,
    pub(crate) track: bool,
}

impl MutationRecord {
    /// The endpoint the mutation was invoked on.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The arguments the mutation was invoked with.
    #[must_use]
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// The record's lifecycle state.
    #[must_use]
    pub fn status(&self) -> MutationStatus {
        self.status
    }

    /// The mutation's result, once fulfilled.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// The mutation's failure, once rejected.
    #[must_use]
    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// Whether the record outlives settlement for later inspection.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.track
    }
}
