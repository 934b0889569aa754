//! Utilities to track object's life cycle

use std::sync::atomic::{AtomicBool, Ordering};

/// Util to track wayland object's life time
///
/// An object tracked this way goes from live to destroyed exactly once, however many
/// destruction paths race to it (explicit destroy request, client disconnect, parent teardown).
#[derive(Debug)]
pub struct AliveTracker {
    is_alive: AtomicBool,
}

impl Default for AliveTracker {
    fn default() -> Self {
        Self {
            is_alive: AtomicBool::new(true),
        }
    }
}

impl AliveTracker {
    /// Notify the tracker that object is dead
    ///
    /// Returns `true` for the call that performed the transition, `false` for any later one.
    pub fn destroy_notify(&self) -> bool {
        self.is_alive.swap(false, Ordering::AcqRel)
    }

    /// Check if object is alive
    #[inline]
    pub fn alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }
}

/// Trait that is implemented on tracked wayland objects
pub trait IsAlive {
    /// Check if object is alive
    fn alive(&self) -> bool;
}

impl<T: IsAlive> IsAlive for &T {
    #[inline]
    fn alive(&self) -> bool {
        IsAlive::alive(*self)
    }
}
