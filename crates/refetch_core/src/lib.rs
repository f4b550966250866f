// Copyright (c) Microsoft Corporation.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Data model and pure state reducer for the refetch query cache engine.
//!
//! This crate defines what the cache *is*: [`Endpoint`] definitions collected
//! into a [`Registry`], an immutable [`Snapshot`] of cached [`QueryEntry`]
//! values and [`MutationRecord`]s, and the [`Event`] vocabulary that
//! [`Snapshot::apply`] folds into the next snapshot. The companion `refetch`
//! crate supplies the engine that drives requests and emits the events.
//!
//! # State as a fold over events
//!
//! Snapshots never change in place. Every state transition is an [`Event`],
//! and the reducer is a pure function from `(snapshot, event)` to the next
//! snapshot:
//!
//! ```
//! use refetch_core::{CacheKey, Event, Snapshot};
//! use serde_json::json;
//!
//! let key = CacheKey::derive("getPost", &json!(1));
//! let snapshot = Snapshot::new().apply(&Event::SubscriberAdded {
//!     key: key.clone(),
//!     endpoint: "getPost".to_string(),
//!     args: json!(1),
//!     provides: Vec::new(),
//! });
//!
//! assert_eq!(snapshot.entry(&key).unwrap().subscriber_count(), 1);
//! assert_eq!(snapshot.version(), 1);
//! ```
//!
//! Events carry their own timestamps, so replaying the same events always
//! produces the same state regardless of when the replay happens.
//!
//! # Test utilities
//!
//! The `test-util` feature adds `testing::FakeTransport` (a manually
//! resolved transport), `testing::RecordingProbe` (an event log), and
//! `ClockControl` (frozen, manually advanced time).

pub mod clock;
mod endpoint;
mod entry;
pub mod error;
mod event;
mod key;
mod registry;
mod snapshot;
mod tag;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;
mod token;

#[doc(inline)]
pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use clock::ClockControl;
#[doc(inline)]
pub use endpoint::{Endpoint, EndpointKind};
#[doc(inline)]
pub use entry::{MutationRecord, MutationStatus, QueryEntry, QueryStatus, RequestId};
#[doc(inline)]
pub use error::{Error, Result, TransportError};
#[doc(inline)]
pub use event::{Event, EventHook};
#[doc(inline)]
pub use key::{CacheKey, stable_args};
#[doc(inline)]
pub use registry::Registry;
#[doc(inline)]
pub use snapshot::Snapshot;
#[doc(inline)]
pub use tag::Tag;
#[doc(inline)]
pub use token::CancelToken;

#[cfg(test)]
mod send_sync_tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn public_types_are_send_and_sync() {
        assert_impl_all!(Endpoint: Send, Sync, Clone);
        assert_impl_all!(Registry: Send, Sync, Clone);
        assert_impl_all!(Snapshot: Send, Sync, Clone);
        assert_impl_all!(Event: Send, Sync, Clone);
        assert_impl_all!(CancelToken: Send, Sync, Clone);
        assert_impl_all!(Clock: Send, Sync, Clone);
        assert_impl_all!(TransportError: Send, Sync, Clone);
    }
}
