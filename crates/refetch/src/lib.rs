// Copyright (c) Microsoft Corporation.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! A client-side query and mutation cache engine.
//!
//! `refetch` keeps remote data cached, deduplicated, and fresh on behalf of
//! many concurrent consumers. Consumers declare *what* they need by
//! subscribing to a query endpoint with arguments; the engine decides whether
//! to serve the cached result, join an in-flight request, or fetch. Writes go
//! through mutation endpoints that declare which [`Tag`]s they invalidate,
//! and every cached query providing an invalidated tag is refetched
//! automatically.
//!
//! # A complete round trip
//!
//! ```
//! use refetch::{Clock, Endpoint, Engine, Spawner, Tag};
//! use serde_json::json;
//!
//! // An inline spawner runs request drivers to completion synchronously,
//! // which keeps this example deterministic without a runtime.
//! let engine = Engine::builder(Clock::system())
//!     .endpoint(
//!         Endpoint::query("getPost", |args, _token| async move {
//!             Ok(json!({ "id": args, "name": "A sample post" }))
//!         })
//!         .provides(|args| vec![Tag::new(format!("Post:{args}"))]),
//!     )
//!     .spawner(Spawner::new_custom(|fut| futures::executor::block_on(fut)))
//!     .build()
//!     .unwrap();
//!
//! let subscription = engine.subscribe("getPost", json!(1)).unwrap();
//! let selector = engine.select("getPost", &json!(1)).unwrap();
//!
//! let view = selector.view(&engine.snapshot());
//! assert!(view.is_success);
//! assert_eq!(view.data.as_ref().unwrap()["name"], "A sample post");
//!
//! drop(subscription); // the entry idles, then ages out via `sweep`
//! ```
//!
//! # Lifecycle
//!
//! Results are cached per [`CacheKey`], derived from the endpoint name and a
//! stable serialization of the arguments. Entries are kept alive by
//! [`Subscription`] handles; when the last one drops, the entry idles for a
//! grace period before [`Engine::sweep`] (or the periodic sweeper started by
//! [`Engine::start_sweeper`]) evicts it. A refetch replaces the entry's data
//! only when it settles; consumers keep seeing the previous result while the
//! new request is in flight.
//!
//! # Observing state
//!
//! [`Engine::snapshot`] returns an immutable [`Snapshot`] of everything
//! cached. [`QuerySelector`] and [`MutationSelector`] derive stable,
//! memoized views from snapshots, so consumers can cheaply poll for changes.
//!
//! # Runtimes
//!
//! Request drivers run on a [`Spawner`]: Tokio by default (the `tokio`
//! feature), or any custom executor via [`Spawner::new_custom`].

mod builder;
mod engine;
mod mutation;
mod select;
mod spawn;

#[doc(inline)]
pub use builder::EngineBuilder;
#[doc(inline)]
pub use engine::{Engine, Subscription};
#[doc(inline)]
pub use mutation::{ActiveMutation, MutationOptions};
pub use refetch_core::{
    CacheKey, CancelToken, Clock, Endpoint, EndpointKind, Error, Event, EventHook, MutationRecord,
    MutationStatus, QueryEntry, QueryStatus, RequestId, Result, Snapshot, Tag, TransportError,
    stable_args,
};
#[doc(inline)]
pub use select::{MutationSelector, MutationView, QuerySelector, QueryView};
#[doc(inline)]
pub use spawn::Spawner;

#[cfg(test)]
mod send_sync_tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn public_types_are_send_and_sync() {
        assert_impl_all!(Engine: Send, Sync, Clone);
        assert_impl_all!(Subscription: Send, Sync);
        assert_impl_all!(ActiveMutation: Send);
        assert_impl_all!(QuerySelector: Send, Sync);
        assert_impl_all!(MutationSelector: Send, Sync);
        assert_impl_all!(Spawner: Send, Sync, Clone);
    }
}
