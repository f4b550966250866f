// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! [`Spawner`] for plugging in runtime implementations.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

/// Runtime-agnostic task spawner for the engine's request drivers.
///
/// The engine never joins its drivers, so spawning is fire-and-forget. Use
/// [`Spawner::new_tokio`] on a Tokio runtime, or [`Spawner::new_custom`] to
/// run drivers any other way, including inline for single-threaded tests:
///
/// ```
/// use refetch::Spawner;
///
/// let inline = Spawner::new_custom(|fut| futures::executor::block_on(fut));
/// inline.spawn(async { /* runs to completion before spawn returns */ });
/// ```
#[derive(Clone)]
pub struct Spawner(SpawnerKind);

#[derive(Clone)]
enum SpawnerKind {
    #[cfg(feature = "tokio")]
    Tokio,
    Custom(Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>),
}

impl Spawner {
    /// Creates a spawner that uses the Tokio runtime.
    ///
    /// Spawned drivers panic if the engine is used outside of a Tokio runtime
    /// context.
    #[cfg(feature = "tokio")]
    #[must_use]
    pub fn new_tokio() -> Self {
        Self(SpawnerKind::Tokio)
    }

    /// Creates a spawner from a closure that runs a boxed future.
    pub fn new_custom(spawn: impl Fn(BoxFuture<'static, ()>) + Send + Sync + 'static) -> Self {
        Self(SpawnerKind::Custom(Arc::new(spawn)))
    }

    /// Spawns a future without retaining a handle to it.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        match &self.0 {
            #[cfg(feature = "tokio")]
            SpawnerKind::Tokio => {
                drop(tokio::spawn(fut));
            }
            SpawnerKind::Custom(spawn) => spawn(Box::pin(fut)),
        }
    }
}

#[cfg(feature = "tokio")]
impl Default for Spawner {
    fn default() -> Self {
        Self::new_tokio()
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0 {
            #[cfg(feature = "tokio")]
            SpawnerKind::Tokio => "Tokio",
            SpawnerKind::Custom(_) => "Custom",
        };
        f.debug_tuple("Spawner").field(&kind).finish()
    }
}
