use std::{any::Any, sync::Arc};

use tracing::trace;
use wayland_server::{
    protocol::{wl_callback::WlCallback, wl_surface::WlSurface},
    DisplayHandle, Resource,
};

use super::{
    hook::{Hook, HookId},
    subsurface::{restack, Location, SubsurfaceError, SubsurfaceHandle, WeakSubsurface, SUBSURFACE_ROLE},
    AlreadyHasRole, SurfaceUserData,
};

pub(crate) type PostCommitHook = dyn Fn(&mut dyn Any, &DisplayHandle, &WlSurface) + Send + Sync;
pub(crate) type DestructionHook = dyn Fn(&mut dyn Any, &WlSurface) + Send + Sync;

/// One slot of a surface's stacking order
///
/// The surface itself has a slot, so its children can be placed below it as well as above it.
#[derive(Debug)]
pub(crate) enum StackEntry {
    Parent,
    Child(WeakSubsurface),
}

impl StackEntry {
    fn subsurface(&self) -> Option<SubsurfaceHandle> {
        match self {
            StackEntry::Parent => None,
            StackEntry::Child(weak) => SubsurfaceHandle::upgrade(weak),
        }
    }

    fn is(&self, handle: &SubsurfaceHandle) -> bool {
        matches!(self, StackEntry::Child(weak) if handle.is(weak))
    }

    fn is_live(&self) -> bool {
        match self {
            StackEntry::Parent => true,
            StackEntry::Child(_) => self.subsurface().is_some(),
        }
    }
}

/// Node of the surface tree
///
/// The tree is bidirectional: a surface knows its subsurface role (and through it its parent),
/// and a parent knows its children in stacking order. All links are weak, so the client can
/// destroy any of the objects in any order.
#[derive(Debug)]
pub(crate) struct PrivateSurfaceData {
    role: Option<&'static str>,
    subsurface: Option<WeakSubsurface>,
    stack: Vec<StackEntry>,
    pending_frame_callbacks: Vec<WlCallback>,
    frame_callbacks: Vec<WlCallback>,
    post_commit_hooks: Vec<Hook<PostCommitHook>>,
    destruction_hooks: Vec<Hook<DestructionHook>>,
}

impl Default for PrivateSurfaceData {
    fn default() -> Self {
        PrivateSurfaceData {
            role: None,
            subsurface: None,
            stack: vec![StackEntry::Parent],
            pending_frame_callbacks: Vec::new(),
            frame_callbacks: Vec::new(),
            post_commit_hooks: Vec::new(),
            destruction_hooks: Vec::new(),
        }
    }
}

impl PrivateSurfaceData {
    fn with<T>(surface: &WlSurface, f: impl FnOnce(&mut PrivateSurfaceData) -> T) -> Option<T> {
        let data = surface.data::<SurfaceUserData>()?;
        let mut guard = data.inner.lock().unwrap();
        Some(f(&mut guard))
    }

    /// Runs the destruction hooks and unlinks the surface from the tree
    pub(crate) fn cleanup<D: 'static>(state: &mut D, data: &SurfaceUserData, surface: &WlSurface) {
        let (hooks, subsurface, stack) = {
            let mut my_data = data.inner.lock().unwrap();
            (
                my_data.destruction_hooks.clone(),
                my_data.subsurface.take(),
                std::mem::take(&mut my_data.stack),
            )
        };

        let state: &mut dyn Any = state;
        for hook in hooks {
            (hook.cb)(&mut *state, surface);
        }

        // the role object may outlive us, but it has nothing left to be a child of
        if let Some(subsurface) = subsurface.as_ref().and_then(SubsurfaceHandle::upgrade) {
            subsurface.detach_from_parent();
        }

        for child in stack.iter().filter_map(StackEntry::subsurface) {
            trace!(child = ?child.surface().id(), "orphaning subsurface");
            child.orphan();
        }
    }

    pub(crate) fn get_role(surface: &WlSurface) -> Option<&'static str> {
        Self::with(surface, |data| data.role).flatten()
    }

    pub(crate) fn set_role(surface: &WlSurface, role: &'static str) -> Result<(), AlreadyHasRole> {
        Self::with(surface, |data| match data.role {
            Some(current) if current != role => Err(AlreadyHasRole),
            _ => {
                data.role = Some(role);
                Ok(())
            }
        })
        .unwrap_or(Err(AlreadyHasRole))
    }

    pub(crate) fn subsurface(surface: &WlSurface) -> Option<SubsurfaceHandle> {
        Self::with(surface, |data| {
            data.subsurface.as_ref().and_then(SubsurfaceHandle::upgrade)
        })
        .flatten()
    }

    /// Gives `surface` the subsurface role, held by `handle`
    pub(crate) fn attach_subsurface(
        surface: &WlSurface,
        handle: &SubsurfaceHandle,
    ) -> Result<(), SubsurfaceError> {
        Self::with(surface, |data| {
            let other_role = data.role.is_some_and(|role| role != SUBSURFACE_ROLE);
            let live_role_object = data
                .subsurface
                .as_ref()
                .and_then(SubsurfaceHandle::upgrade)
                .is_some();
            if other_role || live_role_object {
                return Err(SubsurfaceError::AlreadyHasRole);
            }
            data.role = Some(SUBSURFACE_ROLE);
            data.subsurface = Some(handle.downgrade());
            Ok(())
        })
        .unwrap_or(Err(SubsurfaceError::UnknownSurface))
    }

    pub(crate) fn clear_subsurface(surface: &WlSurface, handle: &SubsurfaceHandle) {
        Self::with(surface, |data| {
            if data.subsurface.as_ref().is_some_and(|weak| handle.is(weak)) {
                data.subsurface = None;
            }
        });
    }

    /// Puts a new child on top of the stacking order of `parent`
    pub(crate) fn push_child(parent: &WlSurface, child: &SubsurfaceHandle) {
        Self::with(parent, |data| {
            data.stack.retain(StackEntry::is_live);
            data.stack.push(StackEntry::Child(child.downgrade()));
        });
    }

    pub(crate) fn remove_child(parent: &WlSurface, child: &SubsurfaceHandle) {
        Self::with(parent, |data| data.stack.retain(|entry| !entry.is(child)));
    }

    pub(crate) fn restack_child(
        parent: &WlSurface,
        child: &SubsurfaceHandle,
        location: Location,
        sibling: &WlSurface,
    ) -> Result<(), SubsurfaceError> {
        let sibling_is_parent = sibling == parent;
        Self::with(parent, |data| {
            restack(
                &mut data.stack,
                |entry| entry.is(child),
                |entry| match entry {
                    StackEntry::Parent => sibling_is_parent,
                    StackEntry::Child(_) => entry
                        .subsurface()
                        .is_some_and(|other| other.surface() == sibling),
                },
                location,
            )
        })
        .unwrap_or(Err(SubsurfaceError::NoParent))
    }

    /// Live children, back-to-front
    pub(crate) fn children(surface: &WlSurface) -> Vec<SubsurfaceHandle> {
        Self::with(surface, |data| {
            data.stack.iter().filter_map(StackEntry::subsurface).collect()
        })
        .unwrap_or_default()
    }

    /// The surface and its live children, back-to-front
    pub(crate) fn stacking_order(surface: &WlSurface) -> Vec<WlSurface> {
        Self::with(surface, |data| {
            data.stack
                .iter()
                .filter_map(|entry| match entry {
                    StackEntry::Parent => Some(surface.clone()),
                    StackEntry::Child(_) => entry.subsurface().map(|child| child.surface().clone()),
                })
                .collect()
        })
        .unwrap_or_default()
    }

    pub(crate) fn add_frame_callback(surface: &WlSurface, callback: WlCallback) {
        Self::with(surface, |data| data.pending_frame_callbacks.push(callback));
    }

    pub(crate) fn take_frame_callbacks(surface: &WlSurface) -> Vec<WlCallback> {
        Self::with(surface, |data| std::mem::take(&mut data.frame_callbacks)).unwrap_or_default()
    }

    /// Promotes the pending state of the surface
    pub(crate) fn commit(surface: &WlSurface) {
        Self::with(surface, |data| {
            let pending = std::mem::take(&mut data.pending_frame_callbacks);
            data.frame_callbacks.extend(pending);
        });
    }

    pub(crate) fn add_post_commit_hook(surface: &WlSurface, hook: Arc<PostCommitHook>) -> Option<HookId> {
        let hook = Hook::new(hook);
        let id = hook.id;
        Self::with(surface, |data| data.post_commit_hooks.push(hook))?;
        Some(id)
    }

    pub(crate) fn remove_post_commit_hook(surface: &WlSurface, id: HookId) {
        Self::with(surface, |data| data.post_commit_hooks.retain(|hook| hook.id != id));
    }

    pub(crate) fn invoke_post_commit_hooks<D: 'static>(
        state: &mut D,
        dh: &DisplayHandle,
        surface: &WlSurface,
    ) {
        // hooks may query the tree, so they must run without the lock
        let hooks = Self::with(surface, |data| data.post_commit_hooks.clone()).unwrap_or_default();
        let state: &mut dyn Any = state;
        for hook in hooks {
            (hook.cb)(&mut *state, dh, surface);
        }
    }

    pub(crate) fn add_destruction_hook(surface: &WlSurface, hook: Arc<DestructionHook>) -> Option<HookId> {
        let hook = Hook::new(hook);
        let id = hook.id;
        Self::with(surface, |data| data.destruction_hooks.push(hook))?;
        Some(id)
    }

    pub(crate) fn remove_destruction_hook(surface: &WlSurface, id: HookId) {
        Self::with(surface, |data| data.destruction_hooks.retain(|hook| hook.id != id));
    }
}
