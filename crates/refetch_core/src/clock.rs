// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time as a value the engine reads, so tests can control it.

use std::time::SystemTime;

#[cfg(any(feature = "test-util", test))]
use std::{sync::Arc, time::Duration};

/// The engine's source of wall-clock time.
///
/// Production engines use [`Clock::system`]. Tests freeze time with
/// [`Clock::new_frozen`] and advance it explicitly through the returned
/// [`ClockControl`], which makes grace periods and freshness windows
/// deterministic instead of sleep-based.
#[derive(Clone, Debug)]
pub struct Clock {
    state: ClockState,
}

#[derive(Clone, Debug)]
enum ClockState {
    System,
    #[cfg(any(feature = "test-util", test))]
    Controlled(ClockControl),
}

impl Clock {
    /// A clock backed by [`SystemTime::now`].
    #[must_use]
    pub fn system() -> Self {
        Self {
            state: ClockState::System,
        }
    }

    /// A clock frozen at the Unix epoch, with a control to advance it.
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn new_frozen() -> (Self, ClockControl) {
        let control = ClockControl::new();
        (control.to_clock(), control)
    }

    /// The current time.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        match &self.state {
            ClockState::System => SystemTime::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockState::Controlled(control) => control.now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

/// Manual control over a frozen [`Clock`].
///
/// Clones share the same underlying time; advancing any clone is observed by
/// every clock created from any of them.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-util")]
/// # {
/// use std::time::Duration;
/// use refetch_core::Clock;
///
/// let (clock, control) = Clock::new_frozen();
/// let start = clock.now();
/// control.advance(Duration::from_secs(90));
/// assert_eq!(clock.now(), start + Duration::from_secs(90));
/// # }
/// ```
#[cfg(any(feature = "test-util", test))]
#[derive(Clone, Debug)]
pub struct ClockControl {
    base: SystemTime,
    offset: Arc<parking_lot::Mutex<Duration>>,
}

#[cfg(any(feature = "test-util", test))]
impl ClockControl {
    /// A control whose time starts at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::new_at(SystemTime::UNIX_EPOCH)
    }

    /// A control whose time starts at the given instant.
    #[must_use]
    pub fn new_at(base: SystemTime) -> Self {
        Self {
            base,
            offset: Arc::new(parking_lot::Mutex::new(Duration::ZERO)),
        }
    }

    /// A clock that reads this control's time.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock {
            state: ClockState::Controlled(self.clone()),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// The control's current time.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        self.base + *self.offset.lock()
    }
}

#[cfg(any(feature = "test-util", test))]
impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_only_moves_when_advanced() {
        let (clock, control) = Clock::new_frozen();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        control.advance(Duration::from_secs(5));
        control.advance(Duration::from_millis(250));
        assert_eq!(start + Duration::from_millis(5250), clock.now());
    }

    #[test]
    fn control_clones_share_time() {
        let (clock, control) = Clock::new_frozen();
        let other = control.clone();
        other.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), control.now());
        assert_eq!(control.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(1));
    }

    #[test]
    fn system_clock_advances_on_its_own() {
        let clock = Clock::system();
        assert!(clock.now() > SystemTime::UNIX_EPOCH);
    }
}
