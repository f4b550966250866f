// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The request coordinator: subscriptions, deduplication, and eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use refetch_core::{
    CacheKey, CancelToken, Clock, Endpoint, Event, EventHook, QueryStatus, Registry, RequestId,
    Result, Snapshot, Tag, TransportError,
};
use serde_json::Value;

use crate::builder::EngineBuilder;
use crate::spawn::Spawner;

/// The query and mutation cache engine.
///
/// The engine owns the current [`Snapshot`] and is the only thing that
/// changes it: every operation turns into events folded through
/// [`Snapshot::apply`] under the engine's write lock. Cloning the engine is
/// cheap and shares all state, which is also how spawned request drivers
/// hold on to it.
///
/// Queries are started by [`subscribe`](Engine::subscribe) and shared:
/// concurrent subscriptions to the same cache key attach to one in-flight
/// request instead of fanning out duplicates. Entries stay alive while
/// subscribed, then linger for a grace period before [`sweep`](Engine::sweep)
/// evicts them. Mutations run through
/// [`invoke`](Engine::invoke) and refetch the queries whose tags they
/// invalidate.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Shared>,
}

pub(crate) struct Shared {
    registry: Registry,
    state: RwLock<Arc<Snapshot>>,
    hooks: Vec<EventHook>,
    clock: Clock,
    spawner: Spawner,
    eviction_grace: Duration,
    stale_after: Option<Duration>,
    next_request_id: AtomicU64,
    /// Cancel tokens for in-flight query requests, keyed by entry.
    tokens: Mutex<HashMap<CacheKey, (RequestId, CancelToken)>>,
}

impl Engine {
    /// Starts configuring an engine that reads time from `clock`.
    pub fn builder(clock: Clock) -> EngineBuilder {
        EngineBuilder::new(clock)
    }

    pub(crate) fn new(
        registry: Registry,
        initial: Snapshot,
        clock: Clock,
        spawner: Spawner,
        hooks: Vec<EventHook>,
        eviction_grace: Duration,
        stale_after: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                registry,
                state: RwLock::new(Arc::new(initial)),
                hooks,
                clock,
                spawner,
                eviction_grace,
                stale_after,
                next_request_id: AtomicU64::new(1),
                tokens: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The current state. The returned snapshot is immutable; it never
    /// reflects later changes.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.state.read())
    }

    /// Subscribes to a query, fetching it if the cache cannot satisfy it.
    ///
    /// The entry's subscriber count is incremented immediately. A fetch is
    /// started only when needed: a missing or uninitialized entry always
    /// fetches, an entry with a request already in flight is joined as-is,
    /// a fulfilled entry refetches only once it is older than the configured
    /// freshness window, and a rejected entry retries.
    ///
    /// Dropping the returned [`Subscription`] releases the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`](refetch_core::Error::UnknownEndpoint)
    /// if `endpoint` is not a registered query endpoint.
    pub fn subscribe(&self, endpoint: &str, args: Value) -> Result<Subscription> {
        let def = self.inner.registry.resolve_query(endpoint)?;
        let key = def.cache_key(&args);
        let provides = def.provided_tags(&args);

        let mut events = vec![Event::SubscriberAdded {
            key: key.clone(),
            endpoint: def.name().to_string(),
            args: args.clone(),
            provides,
        }];
        let mut launch = None;
        {
            let mut guard = self.inner.state.write();
            if let Some(request_id) = self.fetch_decision(&guard, &key) {
                events.push(Event::QueryStarted {
                    key: key.clone(),
                    request_id,
                });
                launch = Some(request_id);
            }
            Self::apply_locked(&mut guard, &events);
        }
        self.notify(&events);

        if let Some(request_id) = launch {
            self.launch(&def, key.clone(), args, request_id);
        }
        Ok(Subscription {
            engine: self.clone(),
            key,
            active: true,
        })
    }

    /// Decides, under the write lock, whether a new subscription needs a
    /// fetch. This is the deduplication point: all concurrent subscribers
    /// pass through here serially, and only the one that finds no usable
    /// entry and no in-flight request starts a new one.
    fn fetch_decision(&self, snapshot: &Snapshot, key: &CacheKey) -> Option<RequestId> {
        let needs_fetch = match snapshot.entry(key) {
            None => true,
            Some(entry) => match entry.status() {
                QueryStatus::Uninitialized => entry.in_flight().is_none(),
                QueryStatus::Pending => false,
                QueryStatus::Fulfilled => self.is_stale(entry.last_fulfilled_at()),
                QueryStatus::Rejected => true,
            },
        };
        needs_fetch.then(|| self.next_request_id())
    }

    fn is_stale(&self, last_fulfilled_at: Option<SystemTime>) -> bool {
        match (self.inner.stale_after, last_fulfilled_at) {
            (Some(window), Some(at)) => at + window <= self.inner.clock.now(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Forces a refetch of a cached query.
    ///
    /// Does nothing if the entry is not in the cache; a refetch never
    /// creates entries. An in-flight request for the entry is superseded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`](refetch_core::Error::UnknownEndpoint)
    /// if `endpoint` is not a registered query endpoint.
    pub fn refetch(&self, endpoint: &str, args: &Value) -> Result<()> {
        let def = self.inner.registry.resolve_query(endpoint)?;
        self.refetch_key(&def.cache_key(args));
        Ok(())
    }

    /// Refetches every cached query whose results provide one of `tags`.
    ///
    /// Entries currently in flight are superseded; their old responses are
    /// discarded when they arrive.
    pub fn invalidate(&self, tags: &[Tag]) {
        let keys = self.snapshot().keys_providing(tags);
        if !keys.is_empty() {
            tracing::debug!(count = keys.len(), "invalidating cached queries");
        }
        for key in keys {
            self.refetch_key(&key);
        }
    }

    fn refetch_key(&self, key: &CacheKey) {
        let origin = {
            let guard = self.inner.state.read();
            guard
                .entry(key)
                .map(|entry| (entry.endpoint().to_string(), entry.args().clone()))
        };
        let Some((endpoint, args)) = origin else {
            return;
        };
        // The entry names a registered query endpoint; it was created by one.
        let Ok(def) = self.inner.registry.resolve_query(&endpoint) else {
            return;
        };
        let request_id = self.next_request_id();
        self.dispatch(vec![Event::QueryStarted {
            key: key.clone(),
            request_id,
        }]);
        self.launch(&def, key.clone(), args, request_id);
    }

    /// Starts the handler and spawns the driver that settles the entry.
    ///
    /// The handler itself is invoked synchronously, so the transport sees the
    /// request before this returns; only waiting for the response happens on
    /// the spawned driver.
    fn launch(&self, def: &Endpoint, key: CacheKey, args: Value, request_id: RequestId) {
        let token = CancelToken::new();
        {
            let mut tokens = self.inner.tokens.lock();
            if let Some((_, superseded)) = tokens.insert(key.clone(), (request_id, token.clone())) {
                superseded.cancel();
            }
        }

        let fut = def.start(args, token);
        let engine = self.clone();
        self.inner.spawner.spawn(async move {
            let outcome = fut.await;
            engine.complete_query(&key, request_id, outcome);
        });
    }

    /// Settles an entry with a response, unless the request was superseded.
    fn complete_query(
        &self,
        key: &CacheKey,
        request_id: RequestId,
        outcome: std::result::Result<Value, TransportError>,
    ) {
        let event = {
            let mut guard = self.inner.state.write();
            let current = guard.entry(key).and_then(|entry| entry.in_flight());
            let event = if current == Some(request_id) {
                match outcome {
                    Ok(data) => Event::QueryFulfilled {
                        key: key.clone(),
                        request_id,
                        data,
                        at: self.inner.clock.now(),
                    },
                    Err(error) => Event::QueryRejected {
                        key: key.clone(),
                        request_id,
                        error,
                    },
                }
            } else {
                tracing::debug!(%key, request_id = request_id.0, "discarding stale response");
                Event::StaleResponseDiscarded {
                    key: key.clone(),
                    request_id,
                }
            };
            Self::apply_locked(&mut guard, std::slice::from_ref(&event));
            event
        };
        self.notify(std::slice::from_ref(&event));

        let mut tokens = self.inner.tokens.lock();
        if tokens.get(key).is_some_and(|(id, _)| *id == request_id) {
            tokens.remove(key);
        }
    }

    /// Evicts every entry that has been idle for longer than the grace
    /// period. Returns the number of entries evicted.
    ///
    /// Entries with subscribers or an in-flight request are never evicted.
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let events: Vec<Event> = {
            let guard = self.inner.state.read();
            guard
                .entries()
                .filter(|(_, entry)| {
                    entry.subscriber_count() == 0
                        && entry.status() != QueryStatus::Pending
                        && entry
                            .idle_since()
                            .is_some_and(|idle| idle + self.inner.eviction_grace <= now)
                })
                .map(|(key, _)| Event::EntryEvicted { key: key.clone() })
                .collect()
        };
        let count = events.len();
        if count > 0 {
            tracing::debug!(count, "evicting idle cache entries");
            self.dispatch(events);
        }
        count
    }

    /// Spawns a driver that calls [`sweep`](Engine::sweep) every `interval`.
    ///
    /// The driver holds only a weak reference to the engine and stops once
    /// every other handle is dropped.
    #[cfg(feature = "tokio")]
    pub fn start_sweeper(&self, interval: Duration) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.spawner.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Engine { inner }.sweep();
            }
        });
    }

    fn unsubscribe_key(&self, key: &CacheKey) {
        self.dispatch(vec![Event::SubscriberRemoved {
            key: key.clone(),
            at: self.inner.clock.now(),
        }]);

        // An abandoned in-flight request gets an advisory cancel; if its
        // transport completes anyway the result is still applied.
        let snapshot = self.snapshot();
        if snapshot
            .entry(key)
            .is_some_and(|entry| entry.subscriber_count() == 0 && entry.in_flight().is_some())
            && let Some((_, token)) = self.inner.tokens.lock().get(key)
        {
            token.cancel();
        }
    }

    /// Applies events under the write lock, then runs hooks outside it.
    pub(crate) fn dispatch(&self, events: Vec<Event>) {
        {
            let mut guard = self.inner.state.write();
            Self::apply_locked(&mut guard, &events);
        }
        self.notify(&events);
    }

    fn apply_locked(guard: &mut Arc<Snapshot>, events: &[Event]) {
        for event in events {
            *guard = Arc::new(guard.apply(event));
        }
    }

    fn notify(&self, events: &[Event]) {
        for event in events {
            for hook in &self.inner.hooks {
                hook(event);
            }
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.inner.spawner
    }

    pub(crate) fn next_request_id(&self) -> RequestId {
        RequestId(self.inner.next_request_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("endpoints", &self.inner.registry.len())
            .field("version", &self.snapshot().version())
            .field("eviction_grace", &self.inner.eviction_grace)
            .field("stale_after", &self.inner.stale_after)
            .finish_non_exhaustive()
    }
}

/// A live claim on a cached query entry.
///
/// While at least one subscription to a key exists, the entry is retained
/// and kept in sync. Dropping the subscription releases the claim; when the
/// last one goes, the entry becomes idle and the grace period starts.
#[derive(Debug)]
pub struct Subscription {
    engine: Engine,
    key: CacheKey,
    active: bool,
}

impl Subscription {
    /// The cache key this subscription holds live.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Releases the subscription explicitly. Equivalent to dropping it.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.engine.unsubscribe_key(&self.key);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
