//! Various utilities functions and types

mod alive_tracker;
mod geometry;
pub mod serial;
pub mod user_data;

pub use self::alive_tracker::{AliveTracker, IsAlive};
pub use self::geometry::{Logical, Point};
pub use self::serial::{Serial, SerialCounter, SERIAL_COUNTER};

/// This resource has been destroyed and can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("This resource has been destroyed and can no longer be used.")]
pub struct DeadResource;
