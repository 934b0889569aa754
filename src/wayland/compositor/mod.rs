//! Utilities for handling surfaces and subsurfaces
//!
//! This module provides automatic handling of the `wl_compositor` and `wl_subcompositor` globals
//! and of the objects created from them. Surfaces are only tracked as far as the surface tree is
//! concerned: their roles, their parent/children relationships, their frame callbacks. Buffers,
//! damage and the other drawing state of a surface are accepted and ignored, drawing is up to
//! your compositor.
//!
//! ## How to use it
//!
//! ### Initialization
//!
//! Create a [`CompositorState`], implement [`CompositorHandler`] on your compositor state and
//! use [`delegate_compositor!`](crate::delegate_compositor) to route the requests:
//!
//! ```no_run
//! use trellis::delegate_compositor;
//! use trellis::reexports::wayland_server::{protocol::wl_surface::WlSurface, Display};
//! use trellis::wayland::compositor::{CompositorHandler, CompositorState, SubsurfaceHandle};
//! use trellis::utils::{Logical, Point};
//!
//! struct State;
//!
//! impl CompositorHandler for State {
//!     fn commit(&mut self, surface: &WlSurface) {
//!         // the committed state of `surface` and of its subsurfaces can now be inspected
//!     }
//!
//!     fn subsurface_position_changed(&mut self, subsurface: &SubsurfaceHandle, position: Point<i32, Logical>) {
//!         // damage the old and new area of the subsurface
//!     }
//! }
//!
//! delegate_compositor!(State);
//!
//! let display = Display::<State>::new().unwrap();
//! let compositor_state = CompositorState::new::<State>(&display.handle());
//! ```
//!
//! ### The surface tree
//!
//! Surfaces given the [`SUBSURFACE_ROLE`] by a client are attached to a parent. The tree can be
//! inspected with [`get_parent`], [`get_children`] and [`stacking_order`]; the role itself is
//! accessed with [`get_subsurface`].
//!
//! The position of a subsurface is double-buffered: it is applied when the subsurface itself is
//! committed, whatever its [`SubsurfaceMode`]. The mode only tells your renderer whether the new
//! state of a child may be shown before its parent commits, see [`is_effectively_sync`].
//!
//! ### Hooks
//!
//! Other protocol handlers can react to commits and destruction of a surface with
//! [`add_post_commit_hook`] and [`add_destruction_hook`]. Post-commit hooks run after the
//! surface's own pending state has been applied and before [`CompositorHandler::commit`].

mod handlers;
mod hook;
mod subsurface;
mod tree;

use std::{any::Any, sync::Mutex};

use wayland_server::{
    backend::GlobalId,
    protocol::{
        wl_callback::WlCallback, wl_compositor::WlCompositor, wl_subcompositor::WlSubcompositor,
        wl_surface::WlSurface,
    },
    DisplayHandle, GlobalDispatch, Resource,
};

pub use self::hook::HookId;
pub use self::subsurface::{SubsurfaceError, SubsurfaceHandle, SubsurfaceMode, SUBSURFACE_ROLE};
use self::tree::PrivateSurfaceData;
use crate::utils::{user_data::UserDataMap, Logical, Point};

/// Advertised version of `wl_compositor`
pub const COMPOSITOR_VERSION: u32 = 5;
/// Advertised version of `wl_subcompositor`
pub const SUBCOMPOSITOR_VERSION: u32 = 1;

/// The surface already has a role that is not the one requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("surface already has a role")]
pub struct AlreadyHasRole;

impl From<AlreadyHasRole> for SubsurfaceError {
    fn from(_: AlreadyHasRole) -> Self {
        SubsurfaceError::AlreadyHasRole
    }
}

/// Handler trait for the compositor globals
///
/// Only [`commit`](CompositorHandler::commit) is mandatory, the other notifications default to
/// doing nothing.
pub trait CompositorHandler {
    /// A client created a new surface
    fn new_surface(&mut self, surface: &WlSurface) {
        let _ = surface;
    }

    /// A surface was committed
    ///
    /// Its frame callbacks are available through [`take_frame_callbacks`], the position of its
    /// subsurface role (if any) has been applied.
    fn commit(&mut self, surface: &WlSurface);

    /// A surface was destroyed
    fn destroyed(&mut self, surface: &WlSurface) {
        let _ = surface;
    }

    /// A client gave a surface the subsurface role
    fn new_subsurface(&mut self, subsurface: &SubsurfaceHandle) {
        let _ = subsurface;
    }

    /// The committed position of a subsurface changed
    fn subsurface_position_changed(&mut self, subsurface: &SubsurfaceHandle, position: Point<i32, Logical>) {
        let _ = (subsurface, position);
    }

    /// The synchronization mode of a subsurface changed
    fn subsurface_mode_changed(&mut self, subsurface: &SubsurfaceHandle, mode: SubsurfaceMode) {
        let _ = (subsurface, mode);
    }

    /// A subsurface role object was destroyed
    ///
    /// Called exactly once per subsurface, whether the client destroyed it or disconnected.
    fn subsurface_destroyed(&mut self, subsurface: &SubsurfaceHandle) {
        let _ = subsurface;
    }
}

/// State of the compositor globals
#[derive(Debug)]
pub struct CompositorState {
    compositor: GlobalId,
    subcompositor: GlobalId,
}

impl CompositorState {
    /// Create new [`wl_compositor`](wayland_server::protocol::wl_compositor)
    /// and [`wl_subcompositor`](wayland_server::protocol::wl_subcompositor) globals.
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<WlCompositor, ()> + GlobalDispatch<WlSubcompositor, ()> + 'static,
    {
        let compositor = display.create_global::<D, WlCompositor, ()>(COMPOSITOR_VERSION, ());
        let subcompositor = display.create_global::<D, WlSubcompositor, ()>(SUBCOMPOSITOR_VERSION, ());

        CompositorState {
            compositor,
            subcompositor,
        }
    }

    /// Get the id of the `wl_compositor` global
    pub fn compositor_global(&self) -> GlobalId {
        self.compositor.clone()
    }

    /// Get the id of the `wl_subcompositor` global
    pub fn subcompositor_global(&self) -> GlobalId {
        self.subcompositor.clone()
    }

    /// Remove both globals from the display
    ///
    /// Objects clients already created from them keep working.
    pub fn remove_globals<D: 'static>(self, display: &DisplayHandle) {
        display.remove_global::<D>(self.compositor);
        display.remove_global::<D>(self.subcompositor);
    }
}

/// User data of the `wl_surface` objects created by [`CompositorState`]
#[derive(Debug, Default)]
pub struct SurfaceUserData {
    inner: Mutex<PrivateSurfaceData>,
    data_map: UserDataMap,
}

/// User data of the `wl_subsurface` objects created by [`CompositorState`]
#[derive(Debug)]
pub struct SubsurfaceUserData {
    handle: SubsurfaceHandle,
}

impl SubsurfaceUserData {
    /// The subsurface role held by this object
    pub fn handle(&self) -> &SubsurfaceHandle {
        &self.handle
    }
}

/// Give a role to a surface
///
/// A surface keeps its role for its whole lifetime. Giving a surface the role it already has
/// succeeds, any other role is refused.
pub fn give_role(surface: &WlSurface, role: &'static str) -> Result<(), AlreadyHasRole> {
    PrivateSurfaceData::set_role(surface, role)
}

/// Get the role of a surface
pub fn get_role(surface: &WlSurface) -> Option<&'static str> {
    PrivateSurfaceData::get_role(surface)
}

/// Access the subsurface role of a surface, if it currently has a live one
pub fn get_subsurface(surface: &WlSurface) -> Option<SubsurfaceHandle> {
    PrivateSurfaceData::subsurface(surface)
}

/// Retrieve the parent of a surface
pub fn get_parent(surface: &WlSurface) -> Option<WlSurface> {
    get_subsurface(surface).and_then(|subsurface| subsurface.parent())
}

/// Retrieve the direct children of a surface, back-to-front
pub fn get_children(surface: &WlSurface) -> Vec<WlSurface> {
    PrivateSurfaceData::children(surface)
        .into_iter()
        .map(|child| child.surface().clone())
        .collect()
}

/// Retrieve the subsurface roles of the direct children of a surface, back-to-front
pub fn get_subsurfaces(surface: &WlSurface) -> Vec<SubsurfaceHandle> {
    PrivateSurfaceData::children(surface)
}

/// Retrieve a surface and its direct children in drawing order, back-to-front
///
/// Children placed below their parent come before it.
pub fn stacking_order(surface: &WlSurface) -> Vec<WlSurface> {
    PrivateSurfaceData::stacking_order(surface)
}

/// Check if a surface is effectively synchronized
///
/// A surface is effectively synchronized if it is a subsurface in [`SubsurfaceMode::Synchronized`]
/// or if any of its ancestors is.
pub fn is_effectively_sync(surface: &WlSurface) -> bool {
    let mut current = surface.clone();
    loop {
        let Some(subsurface) = get_subsurface(&current) else {
            return false;
        };
        if subsurface.mode() == SubsurfaceMode::Synchronized {
            return true;
        }
        match subsurface.parent() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Whether `ancestor` is `surface` or one of its ancestors
fn is_in_ancestry(surface: &WlSurface, ancestor: &WlSurface) -> bool {
    let mut current = Some(surface.clone());
    while let Some(surface) = current {
        if &surface == ancestor {
            return true;
        }
        current = get_parent(&surface);
    }
    false
}

/// Take the frame callbacks of the last commit of a surface
///
/// Send `done` on them once the committed state has been presented.
pub fn take_frame_callbacks(surface: &WlSurface) -> Vec<WlCallback> {
    PrivateSurfaceData::take_frame_callbacks(surface)
}

/// Access the data map of a surface, to attach your own data to it
pub fn with_data_map<F, T>(surface: &WlSurface, f: F) -> Option<T>
where
    F: FnOnce(&UserDataMap) -> T,
{
    surface.data::<SurfaceUserData>().map(|data| f(&data.data_map))
}

/// Register a hook run after each commit of a surface
///
/// Returns `None` if the surface is not managed by [`CompositorState`].
pub fn add_post_commit_hook<D, F>(surface: &WlSurface, hook: F) -> Option<HookId>
where
    D: 'static,
    F: Fn(&mut D, &DisplayHandle, &WlSurface) + Send + Sync + 'static,
{
    PrivateSurfaceData::add_post_commit_hook(
        surface,
        std::sync::Arc::new(move |state: &mut dyn Any, dh: &DisplayHandle, surface: &WlSurface| {
            if let Some(state) = state.downcast_mut::<D>() {
                hook(state, dh, surface);
            }
        }),
    )
}

/// Unregister a post-commit hook
pub fn remove_post_commit_hook(surface: &WlSurface, hook_id: HookId) {
    PrivateSurfaceData::remove_post_commit_hook(surface, hook_id)
}

/// Register a hook run when a surface is destroyed
///
/// Returns `None` if the surface is not managed by [`CompositorState`].
pub fn add_destruction_hook<D, F>(surface: &WlSurface, hook: F) -> Option<HookId>
where
    D: 'static,
    F: Fn(&mut D, &WlSurface) + Send + Sync + 'static,
{
    PrivateSurfaceData::add_destruction_hook(
        surface,
        std::sync::Arc::new(move |state: &mut dyn Any, surface: &WlSurface| {
            if let Some(state) = state.downcast_mut::<D>() {
                hook(state, surface);
            }
        }),
    )
}

/// Unregister a destruction hook
pub fn remove_destruction_hook(surface: &WlSurface, hook_id: HookId) {
    PrivateSurfaceData::remove_destruction_hook(surface, hook_id)
}

/// Implements the compositor globals and their objects on your state type, by delegating to
/// [`CompositorState`](crate::wayland::compositor::CompositorState)
///
/// Your state type needs to implement
/// [`CompositorHandler`](crate::wayland::compositor::CompositorHandler).
#[macro_export]
macro_rules! delegate_compositor {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_compositor::WlCompositor: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_subcompositor::WlSubcompositor: ()
        ] => $crate::wayland::compositor::CompositorState);

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_compositor::WlCompositor: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_surface::WlSurface: $crate::wayland::compositor::SurfaceUserData
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_region::WlRegion: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_callback::WlCallback: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_subcompositor::WlSubcompositor: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_subsurface::WlSubsurface: $crate::wayland::compositor::SubsurfaceUserData
        ] => $crate::wayland::compositor::CompositorState);
    };
}
