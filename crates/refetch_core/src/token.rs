// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Advisory cancellation for in-flight requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An advisory cancellation signal handed to endpoint handlers.
///
/// When a request is superseded or loses its last subscriber, the engine
/// cancels the token. Cancellation never tears down cache state by itself:
/// a handler that ignores the token runs to completion and its late response
/// is discarded by the request-id check instead.
///
/// Cloning the token shares the underlying flag.
///
/// # Examples
///
/// ```
/// use refetch_core::CancelToken;
///
/// let token = CancelToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
