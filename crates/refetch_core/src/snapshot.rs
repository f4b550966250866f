// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The immutable cache state and its pure reducer.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::entry::{MutationRecord, MutationStatus, QueryEntry, QueryStatus, RequestId};
use crate::event::Event;
use crate::key::CacheKey;
use crate::tag::Tag;

/// One immutable version of the whole cache state.
///
/// The engine holds the current snapshot behind a lock and replaces it
/// wholesale: [`Snapshot::apply`] consumes an event and produces the next
/// version without mutating the old one. Readers that cloned an `Arc` to an
/// earlier snapshot keep a consistent view for as long as they hold it.
///
/// The version counter increments on every applied event, which gives
/// selectors a cheap equality check for memoization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    version: u64,
    entries: HashMap<CacheKey, QueryEntry>,
    mutations: HashMap<RequestId, MutationRecord>,
}

impl Snapshot {
    /// An empty snapshot at version zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot's version. Strictly increasing across applied events.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up a query entry by key.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<&QueryEntry> {
        self.entries.get(key)
    }

    /// Iterates over all query entries.
    pub fn entries(&self) -> impl Iterator<Item = (&CacheKey, &QueryEntry)> {
        self.entries.iter()
    }

    /// Looks up a mutation record by request id.
    #[must_use]
    pub fn mutation(&self, request_id: RequestId) -> Option<&MutationRecord> {
        self.mutations.get(&request_id)
    }

    /// The keys of all entries providing at least one of the given tags,
    /// in sorted order.
    #[must_use]
    pub fn keys_providing(&self, tags: &[Tag]) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| tags.iter().any(|tag| entry.provides_tag(tag)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Applies one event, producing the next snapshot.
    ///
    /// This is a pure function: the receiver is untouched, the result differs
    /// only as the event dictates, and the version is incremented exactly
    /// once. Events that no longer apply (a completion for a superseded
    /// request, an eviction for an entry that regained a subscriber) change
    /// nothing beyond the version.
    #[must_use]
    pub fn apply(&self, event: &Event) -> Self {
        let mut next = self.clone();
        next.version += 1;
        match event {
            Event::SubscriberAdded {
                key,
                endpoint,
                args,
                provides,
            } => {
                let entry = next.entries.entry(key.clone()).or_insert_with(|| {
                    QueryEntry::new(endpoint.clone(), args.clone(), provides.clone())
                });
                entry.subscriber_count += 1;
                entry.idle_since = None;
            }
            Event::SubscriberRemoved { key, at } => {
                if let Some(entry) = next.entries.get_mut(key) {
                    entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
                    if entry.subscriber_count == 0 {
                        entry.idle_since = Some(*at);
                    }
                }
            }
            Event::QueryStarted { key, request_id } => {
                if let Some(entry) = next.entries.get_mut(key) {
                    entry.status = QueryStatus::Pending;
                    entry.in_flight = Some(*request_id);
                }
            }
            Event::QueryFulfilled {
                key,
                request_id,
                data,
                at,
            } => {
                if let Some(entry) = next.entries.get_mut(key)
                    && entry.in_flight == Some(*request_id)
                {
                    entry.status = QueryStatus::Fulfilled;
                    entry.data = Some(data.clone());
                    entry.error = None;
                    entry.last_fulfilled_at = Some(*at);
                    entry.in_flight = None;
                }
            }
            Event::QueryRejected {
                key,
                request_id,
                error,
            } => {
                if let Some(entry) = next.entries.get_mut(key)
                    && entry.in_flight == Some(*request_id)
                {
                    // Prior data survives a failed refetch.
                    entry.status = QueryStatus::Rejected;
                    entry.error = Some(error.clone());
                    entry.in_flight = None;
                }
            }
            Event::StaleResponseDiscarded { .. } => {}
            Event::EntryEvicted { key } => {
                if let Some(entry) = next.entries.get(key)
                    && entry.subscriber_count == 0
                    && entry.status != QueryStatus::Pending
                {
                    next.entries.remove(key);
                }
            }
            Event::MutationStarted {
                request_id,
                endpoint,
                args,
                track,
            } => {
                next.mutations.insert(
                    *request_id,
                    MutationRecord {
                        endpoint: endpoint.clone(),
                        args: args.clone(),
                        status: MutationStatus::Pending,
                        result: None,
                        error: None,
                        track: *track,
                    },
                );
            }
            Event::MutationFulfilled { request_id, result } => {
                next.settle_mutation(*request_id, |record| {
                    record.status = MutationStatus::Fulfilled;
                    record.result = Some(result.clone());
                });
            }
            Event::MutationRejected { request_id, error } => {
                next.settle_mutation(*request_id, |record| {
                    record.status = MutationStatus::Rejected;
                    record.error = Some(error.clone());
                });
            }
            Event::MutationForgotten { request_id } => {
                next.mutations.remove(request_id);
            }
        }
        next
    }

    /// Settles a mutation record, dropping it if it is untracked.
    fn settle_mutation(&mut self, request_id: RequestId, settle: impl FnOnce(&mut MutationRecord)) {
        if let Some(record) = self.mutations.get_mut(&request_id) {
            if record.track {
                settle(record);
            } else {
                self.mutations.remove(&request_id);
            }
        }
    }

    /// Normalizes a snapshot restored from outside the current process.
    ///
    /// Subscriber counts and in-flight requests describe live process state
    /// and do not survive a restore: counts go to zero, in-flight markers are
    /// cleared, and entries caught mid-fetch fall back to their last settled
    /// shape. Every entry becomes idle as of `at` so the normal grace period
    /// applies before eviction. Unsettled and untracked mutation records are
    /// dropped.
    #[must_use]
    pub fn rehydrated(mut self, at: SystemTime) -> Self {
        for entry in self.entries.values_mut() {
            entry.subscriber_count = 0;
            entry.in_flight = None;
            entry.idle_since = Some(at);
            if entry.status == QueryStatus::Pending {
                entry.status = if entry.data.is_some() {
                    QueryStatus::Fulfilled
                } else {
                    QueryStatus::Uninitialized
                };
            }
        }
        self.mutations
            .retain(|_, record| record.track && record.status != MutationStatus::Pending);
        self
    }
}
