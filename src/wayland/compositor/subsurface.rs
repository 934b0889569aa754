//! The subsurface role
//!
//! A [`SubsurfaceHandle`] ties a child surface to its parent. It owns the double-buffered
//! position of the child, its synchronization mode and its place in the parent's stacking order.
//!
//! The handle is kept alive by the client's `wl_subsurface` object. Neither the parent nor the
//! child surface keep it alive, and it only holds a weak reference on its parent: if the parent
//! surface is destroyed first the subsurface simply loses its parent.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, OnceLock, Weak},
};

use wayland_server::{
    protocol::{wl_subsurface::WlSubsurface, wl_surface::WlSurface},
    Resource,
};

use super::{hook::HookId, tree::PrivateSurfaceData};
use crate::{
    utils::{AliveTracker, IsAlive, Logical, Point},
    wayland::binding::ResourceBinding,
};

/// The role of a surface attached to a parent through `wl_subcompositor.get_subsurface`
pub const SUBSURFACE_ROLE: &str = "subsurface";

/// Synchronization mode of a subsurface
///
/// The mode does not change when the pending position of a subsurface is applied, which is always
/// at the commit of the subsurface itself. It tells the renderer whether the committed state of
/// the subsurface may be shown before the parent commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubsurfaceMode {
    /// The subsurface is presented together with its parent
    #[default]
    Synchronized,
    /// The subsurface is presented independently of its parent
    Desynchronized,
}

/// Errors of the subsurface protocol
///
/// All of them are protocol errors of the requesting client, posted with the `bad_surface` code
/// of `wl_subcompositor` or `wl_subsurface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubsurfaceError {
    /// One of the surfaces is not managed by this compositor
    #[error("surface is not managed by this compositor")]
    UnknownSurface,
    /// The surface and its requested parent are the same surface
    #[error("a surface cannot be its own parent")]
    SelfParent,
    /// The requested parent is a descendant of the surface
    #[error("the parent surface is a descendant of the surface")]
    Cycle,
    /// The surface already has a role
    #[error("surface already has a role")]
    AlreadyHasRole,
    /// The subsurface no longer has a parent to be stacked relative to
    #[error("subsurface has no parent")]
    NoParent,
    /// The reference surface of a restacking request is neither a sibling nor the parent
    #[error("reference surface is neither a sibling nor the parent")]
    NotASibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Location {
    Above,
    Below,
}

/// Moves the entry matched by `is_target` directly above or below the entry matched by
/// `is_anchor`. The sequence is ordered back-to-front.
///
/// Every other entry keeps its relative order. Nothing is modified on failure.
pub(crate) fn restack<T>(
    entries: &mut Vec<T>,
    is_target: impl Fn(&T) -> bool,
    is_anchor: impl Fn(&T) -> bool,
    location: Location,
) -> Result<(), SubsurfaceError> {
    let from = entries
        .iter()
        .position(is_target)
        .ok_or(SubsurfaceError::NoParent)?;
    let anchor = entries
        .iter()
        .position(is_anchor)
        .ok_or(SubsurfaceError::NotASibling)?;
    if from == anchor {
        return Err(SubsurfaceError::NotASibling);
    }

    let entry = entries.remove(from);
    let anchor = if from < anchor { anchor - 1 } else { anchor };
    let to = match location {
        Location::Above => anchor + 1,
        Location::Below => anchor,
    };
    entries.insert(to, entry);
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct SubsurfaceState {
    position: Point<i32, Logical>,
    pending_position: Option<Point<i32, Logical>>,
    mode: SubsurfaceMode,
}

impl SubsurfaceState {
    fn set_position(&mut self, position: Point<i32, Logical>) {
        self.pending_position = Some(position);
    }

    fn commit(&mut self) -> Option<Point<i32, Logical>> {
        let position = self.pending_position.take()?;
        self.position = position;
        Some(position)
    }

    fn set_mode(&mut self, mode: SubsurfaceMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        true
    }
}

pub(crate) struct SubsurfaceInner {
    surface: WlSurface,
    parent: Mutex<Option<wayland_server::Weak<WlSurface>>>,
    state: Mutex<SubsurfaceState>,
    resource: OnceLock<ResourceBinding<WlSubsurface>>,
    commit_hook: OnceLock<HookId>,
    alive: AliveTracker,
}

pub(crate) type WeakSubsurface = Weak<SubsurfaceInner>;

/// Handle on the subsurface role of a surface
///
/// Handles are cheap to clone, compare by identity and can be used as map keys.
#[derive(Clone)]
pub struct SubsurfaceHandle {
    inner: Arc<SubsurfaceInner>,
}

impl fmt::Debug for SubsurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap();
        f.debug_struct("SubsurfaceHandle")
            .field("surface", &self.inner.surface.id())
            .field("parent", &self.parent().map(|parent| parent.id()))
            .field("state", &*state)
            .field("alive", &self.inner.alive.alive())
            .finish()
    }
}

impl PartialEq for SubsurfaceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SubsurfaceHandle {}

impl Hash for SubsurfaceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl IsAlive for SubsurfaceHandle {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl SubsurfaceHandle {
    pub(crate) fn new(surface: WlSurface, parent: &WlSurface) -> Self {
        SubsurfaceHandle {
            inner: Arc::new(SubsurfaceInner {
                surface,
                parent: Mutex::new(Some(parent.downgrade())),
                state: Mutex::new(SubsurfaceState::default()),
                resource: OnceLock::new(),
                commit_hook: OnceLock::new(),
                alive: AliveTracker::default(),
            }),
        }
    }

    pub(crate) fn upgrade(weak: &WeakSubsurface) -> Option<SubsurfaceHandle> {
        weak.upgrade()
            .map(|inner| SubsurfaceHandle { inner })
            .filter(|handle| handle.alive())
    }

    pub(crate) fn downgrade(&self) -> WeakSubsurface {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn is(&self, weak: &WeakSubsurface) -> bool {
        std::ptr::eq(weak.as_ptr(), Arc::as_ptr(&self.inner))
    }

    pub(crate) fn bind_resource(&self, resource: &WlSubsurface) {
        if let Ok(binding) = ResourceBinding::new(resource) {
            let _ = self.inner.resource.set(binding);
        }
    }

    pub(crate) fn set_commit_hook(&self, hook: HookId) {
        let _ = self.inner.commit_hook.set(hook);
    }

    /// The child surface holding this role
    pub fn surface(&self) -> &WlSurface {
        &self.inner.surface
    }

    /// The parent surface, if it is still alive and this subsurface is still attached to it
    pub fn parent(&self) -> Option<WlSurface> {
        self.inner
            .parent
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|parent| parent.upgrade().ok())
    }

    /// The `wl_subsurface` object of the client, if it is still alive
    pub fn resource(&self) -> Option<WlSubsurface> {
        self.inner.resource.get().and_then(|binding| binding.upgrade().ok())
    }

    /// Committed position, relative to the parent surface
    pub fn position(&self) -> Point<i32, Logical> {
        self.inner.state.lock().unwrap().position
    }

    /// Position set by the client but not committed yet
    pub fn pending_position(&self) -> Option<Point<i32, Logical>> {
        self.inner.state.lock().unwrap().pending_position
    }

    /// Current synchronization mode
    pub fn mode(&self) -> SubsurfaceMode {
        self.inner.state.lock().unwrap().mode
    }

    /// Place this subsurface directly above `sibling` in its parent's stacking order
    ///
    /// `sibling` must be another child of the same parent, or the parent itself.
    pub fn place_above(&self, sibling: &WlSurface) -> Result<(), SubsurfaceError> {
        self.place(Location::Above, sibling)
    }

    /// Place this subsurface directly below `sibling` in its parent's stacking order
    ///
    /// `sibling` must be another child of the same parent, or the parent itself.
    pub fn place_below(&self, sibling: &WlSurface) -> Result<(), SubsurfaceError> {
        self.place(Location::Below, sibling)
    }

    fn place(&self, location: Location, sibling: &WlSurface) -> Result<(), SubsurfaceError> {
        let parent = self.parent().ok_or(SubsurfaceError::NoParent)?;
        PrivateSurfaceData::restack_child(&parent, self, location, sibling)
    }

    pub(crate) fn set_position(&self, position: Point<i32, Logical>) {
        self.inner.state.lock().unwrap().set_position(position);
    }

    /// Applies the pending position, returning it if there was one
    pub(crate) fn commit(&self) -> Option<Point<i32, Logical>> {
        self.inner.state.lock().unwrap().commit()
    }

    /// Returns whether the mode changed
    pub(crate) fn set_mode(&self, mode: SubsurfaceMode) -> bool {
        self.inner.state.lock().unwrap().set_mode(mode)
    }

    /// Forget the parent, which is being destroyed
    pub(crate) fn orphan(&self) {
        self.inner.parent.lock().unwrap().take();
    }

    pub(crate) fn detach_from_parent(&self) {
        let parent = self.inner.parent.lock().unwrap().take();
        if let Some(parent) = parent.and_then(|parent| parent.upgrade().ok()) {
            PrivateSurfaceData::remove_child(&parent, self);
        }
    }

    /// Tear down the role. Returns `true` for the call that actually destroyed it.
    pub(crate) fn destroy(&self) -> bool {
        if !self.inner.alive.destroy_notify() {
            return false;
        }
        self.detach_from_parent();
        PrivateSurfaceData::clear_subsurface(&self.inner.surface, self);
        if let Some(hook) = self.inner.commit_hook.get() {
            PrivateSurfaceData::remove_post_commit_hook(&self.inner.surface, *hook);
        }
        if let Some(binding) = self.inner.resource.get() {
            binding.destroy_notify();
        }
        true
    }
}
