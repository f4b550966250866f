// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring and constructing an [`Engine`].

use std::fmt;
use std::time::Duration;

use refetch_core::{Clock, Endpoint, Error, EventHook, Registry, Snapshot};

use crate::engine::Engine;
use crate::spawn::Spawner;

/// Configures an [`Engine`].
///
/// Obtained from [`Engine::builder`]. Endpoint definitions are collected here
/// and validated when [`build`](EngineBuilder::build) constructs the closed
/// registry.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use refetch::{Clock, Endpoint, Engine, Spawner, Tag};
/// use serde_json::json;
///
/// let engine = Engine::builder(Clock::system())
///     .endpoint(
///         Endpoint::query("getPosts", |_args, _token| async { Ok(json!([])) })
///             .provides(|_| vec![Tag::new("Post:LIST")]),
///     )
///     .eviction_grace(Duration::from_secs(120))
///     .spawner(Spawner::new_custom(|fut| futures::executor::block_on(fut)))
///     .build()
///     .unwrap();
/// # let _ = engine;
/// ```
#[must_use = "builders do nothing until `build` is called"]
pub struct EngineBuilder {
    clock: Clock,
    endpoints: Vec<Endpoint>,
    eviction_grace: Duration,
    stale_after: Option<Duration>,
    spawner: Option<Spawner>,
    hooks: Vec<EventHook>,
    preloaded: Option<Snapshot>,
}

/// How long an unsubscribed entry survives before it may be evicted.
const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(60);

impl EngineBuilder {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            endpoints: Vec::new(),
            eviction_grace: DEFAULT_EVICTION_GRACE,
            stale_after: None,
            spawner: None,
            hooks: Vec::new(),
            preloaded: None,
        }
    }

    /// Registers an endpoint definition.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Sets how long an entry with no subscribers is kept before eviction.
    ///
    /// Defaults to 60 seconds.
    pub fn eviction_grace(mut self, grace: Duration) -> Self {
        self.eviction_grace = grace;
        self
    }

    /// Sets the freshness window for cached results.
    ///
    /// A new subscription to an entry fulfilled longer than `window` ago
    /// triggers a refetch instead of serving the cached value as-is. Without
    /// a window, a cached result satisfies new subscriptions indefinitely.
    pub fn stale_after(mut self, window: Duration) -> Self {
        self.stale_after = Some(window);
        self
    }

    /// Sets the spawner used to run request drivers.
    ///
    /// Defaults to the Tokio spawner when the `tokio` feature is enabled.
    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Installs an observer for every event the engine applies.
    ///
    /// Hooks run after the event takes effect and must not call back into
    /// the engine.
    pub fn on_event(mut self, hook: EventHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Seeds the engine with a previously captured snapshot.
    ///
    /// The snapshot is normalized on build: subscriber counts and in-flight
    /// markers are process-local and do not carry over. See
    /// [`Snapshot::rehydrated`].
    pub fn preloaded(mut self, snapshot: Snapshot) -> Self {
        self.preloaded = Some(snapshot);
        self
    }

    /// Validates the configuration and constructs the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEndpoint`] if two endpoints share a name,
    /// or [`Error::MissingSpawner`] if no spawner was configured and the
    /// `tokio` default is unavailable.
    pub fn build(self) -> Result<Engine, Error> {
        let registry = Registry::from_endpoints(self.endpoints)?;
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            #[cfg(feature = "tokio")]
            None => Spawner::new_tokio(),
            #[cfg(not(feature = "tokio"))]
            None => return Err(Error::MissingSpawner),
        };
        let initial = match self.preloaded {
            Some(snapshot) => snapshot.rehydrated(self.clock.now()),
            None => Snapshot::new(),
        };
        Ok(Engine::new(
            registry,
            initial,
            self.clock,
            spawner,
            self.hooks,
            self.eviction_grace,
            self.stale_after,
        ))
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("endpoints", &self.endpoints.len())
            .field("eviction_grace", &self.eviction_grace)
            .field("stale_after", &self.stale_after)
            .field("hooks", &self.hooks.len())
            .field("preloaded", &self.preloaded.is_some())
            .finish_non_exhaustive()
    }
}
