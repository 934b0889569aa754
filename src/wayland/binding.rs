//! Per-client protocol object bindings
//!
//! A [`ResourceBinding`] is how the protocol handlers remember the objects clients created from
//! a global (tablet seats, tablets, tools) and the role objects of surfaces. It does not keep the
//! object alive, and records the object's destruction exactly once.

use std::fmt;

use wayland_server::{backend::ObjectId, Resource, Weak};

use crate::utils::{AliveTracker, DeadResource, IsAlive};

/// A weak handle on one client's protocol object
pub struct ResourceBinding<I: Resource> {
    resource: Weak<I>,
    alive: AliveTracker,
}

impl<I: Resource> fmt::Debug for ResourceBinding<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("resource", &self.resource.id())
            .field("alive", &self.alive.alive())
            .finish()
    }
}

impl<I: Resource> ResourceBinding<I> {
    /// Track a freshly created protocol object
    ///
    /// Fails if the object is already dead.
    pub fn new(resource: &I) -> Result<Self, DeadResource> {
        if !resource.is_alive() {
            return Err(DeadResource);
        }
        Ok(ResourceBinding {
            resource: resource.downgrade(),
            alive: AliveTracker::default(),
        })
    }

    /// Protocol id of the tracked object, stable for its whole lifetime
    pub fn id(&self) -> ObjectId {
        self.resource.id()
    }

    /// Whether the object identified by `id` belongs to the same client as this one
    pub fn same_client_as(&self, id: &ObjectId) -> bool {
        self.resource.id().same_client_as(id)
    }

    /// Access the protocol object, if it is still alive
    pub fn upgrade(&self) -> Result<I, DeadResource> {
        if !self.alive.alive() {
            return Err(DeadResource);
        }
        self.resource.upgrade().map_err(|_| DeadResource)
    }

    /// Record the destruction of the object
    ///
    /// Returns `true` only the first time, so destruction side effects can be run exactly once.
    pub fn destroy_notify(&self) -> bool {
        self.alive.destroy_notify()
    }
}

impl<I: Resource> IsAlive for ResourceBinding<I> {
    #[inline]
    fn alive(&self) -> bool {
        self.alive.alive() && self.resource.upgrade().is_ok()
    }
}
