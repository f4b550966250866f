// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoized selectors deriving consumer-facing views from snapshots.

use std::sync::Arc;

use parking_lot::Mutex;
use refetch_core::{
    CacheKey, MutationRecord, MutationStatus, QueryEntry, QueryStatus, RequestId, Result, Snapshot,
    TransportError,
};
use serde_json::Value;

use crate::engine::Engine;

/// What a consumer sees for one cached query.
///
/// The flags are derived from the entry's status. During a refetch the last
/// known good `data` remains available alongside `is_loading`, and after a
/// failed refetch it remains available alongside `error`; `is_error` is set
/// only when a failure left the consumer with nothing to show.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryView {
    /// The most recent successful result, if any.
    pub data: Option<Value>,
    /// The most recent failure, if it has not been superseded by a success.
    pub error: Option<TransportError>,
    /// No request has produced anything for this key yet.
    pub is_uninitialized: bool,
    /// A request is in flight.
    pub is_loading: bool,
    /// The latest settled request succeeded.
    pub is_success: bool,
    /// The latest settled request failed and there is no earlier data.
    pub is_error: bool,
}

impl QueryView {
    fn derive(entry: Option<&QueryEntry>) -> Self {
        let Some(entry) = entry else {
            return Self {
                is_uninitialized: true,
                ..Self::default()
            };
        };
        let data = entry.data().cloned();
        let error = entry.error().cloned();
        match entry.status() {
            QueryStatus::Uninitialized => Self {
                is_uninitialized: true,
                ..Self::default()
            },
            QueryStatus::Pending => Self {
                data,
                error,
                is_loading: true,
                ..Self::default()
            },
            QueryStatus::Fulfilled => Self {
                data,
                is_success: true,
                ..Self::default()
            },
            QueryStatus::Rejected => Self {
                is_error: data.is_none(),
                data,
                error,
                ..Self::default()
            },
        }
    }
}

/// A memoized view over one query's cache entry.
///
/// Calling [`view`](QuerySelector::view) twice with the same snapshot
/// returns the same `Arc`, so consumers can use pointer equality to skip
/// re-rendering when nothing changed.
#[derive(Debug)]
pub struct QuerySelector {
    key: CacheKey,
    memo: Mutex<Option<(u64, Arc<QueryView>)>>,
}

impl QuerySelector {
    fn new(key: CacheKey) -> Self {
        Self {
            key,
            memo: Mutex::new(None),
        }
    }

    /// The cache key this selector reads.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Derives the view of the given snapshot, reusing the previous result
    /// when the snapshot has not changed since.
    pub fn view(&self, snapshot: &Snapshot) -> Arc<QueryView> {
        let mut memo = self.memo.lock();
        if let Some((version, view)) = &*memo
            && *version == snapshot.version()
        {
            return Arc::clone(view);
        }
        let view = Arc::new(QueryView::derive(snapshot.entry(&self.key)));
        *memo = Some((snapshot.version(), Arc::clone(&view)));
        view
    }
}

/// What a consumer sees for one mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutationView {
    /// The mutation's result, once fulfilled.
    pub result: Option<Value>,
    /// The mutation's failure, once rejected.
    pub error: Option<TransportError>,
    /// No record exists: never started, untracked and settled, or forgotten.
    pub is_uninitialized: bool,
    /// The mutation is executing.
    pub is_loading: bool,
    /// The mutation succeeded.
    pub is_success: bool,
    /// The mutation failed.
    pub is_error: bool,
}

impl MutationView {
    fn derive(record: Option<&MutationRecord>) -> Self {
        let Some(record) = record else {
            return Self {
                is_uninitialized: true,
                ..Self::default()
            };
        };
        match record.status() {
            MutationStatus::Pending => Self {
                is_loading: true,
                ..Self::default()
            },
            MutationStatus::Fulfilled => Self {
                result: record.result().cloned(),
                is_success: true,
                ..Self::default()
            },
            MutationStatus::Rejected => Self {
                error: record.error().cloned(),
                is_error: true,
                ..Self::default()
            },
        }
    }
}

/// A memoized view over one mutation record.
#[derive(Debug)]
pub struct MutationSelector {
    request_id: RequestId,
    memo: Mutex<Option<(u64, Arc<MutationView>)>>,
}

impl MutationSelector {
    /// The request id this selector reads.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Derives the view of the given snapshot, reusing the previous result
    /// when the snapshot has not changed since.
    pub fn view(&self, snapshot: &Snapshot) -> Arc<MutationView> {
        let mut memo = self.memo.lock();
        if let Some((version, view)) = &*memo
            && *version == snapshot.version()
        {
            return Arc::clone(view);
        }
        let view = Arc::new(MutationView::derive(snapshot.mutation(self.request_id)));
        *memo = Some((snapshot.version(), Arc::clone(&view)));
        view
    }
}

impl Engine {
    /// Creates a selector for a query's cache entry.
    ///
    /// The selector is independent of any subscription: it reads whatever
    /// the snapshot holds for the key, including nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`](refetch_core::Error::UnknownEndpoint)
    /// if `endpoint` is not a registered query endpoint.
    pub fn select(&self, endpoint: &str, args: &Value) -> Result<QuerySelector> {
        let def = self.registry().resolve_query(endpoint)?;
        Ok(QuerySelector::new(def.cache_key(args)))
    }

    /// Creates a selector for a mutation record.
    ///
    /// Useful with tracked mutations, whose records outlive settlement.
    #[must_use]
    pub fn select_mutation(&self, request_id: RequestId) -> MutationSelector {
        MutationSelector {
            request_id,
            memo: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_entry_views_as_uninitialized() {
        let view = QueryView::derive(None);
        assert!(view.is_uninitialized);
        assert!(!view.is_loading && !view.is_success && !view.is_error);
        assert!(view.data.is_none() && view.error.is_none());
    }

    #[test]
    fn selector_memoizes_per_snapshot_version() {
        use refetch_core::Event;

        let key = CacheKey::derive("getPost", &json!(1));
        let selector = QuerySelector::new(key.clone());

        let snapshot = Snapshot::new().apply(&Event::SubscriberAdded {
            key,
            endpoint: "getPost".to_string(),
            args: json!(1),
            provides: Vec::new(),
        });

        let first = selector.view(&snapshot);
        let second = selector.view(&snapshot);
        assert!(Arc::ptr_eq(&first, &second));

        let changed = snapshot.apply(&Event::MutationForgotten {
            request_id: RequestId(99),
        });
        let third = selector.view(&changed);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }
}
