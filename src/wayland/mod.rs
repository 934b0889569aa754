//! Protocol-related utilities
//!
//! This module contains the handlers managing the wayland protocol objects of this crate.
//!
//! All handlers follow the same pattern:
//!
//! - A state struct (like [`compositor::CompositorState`]) is created from a
//!   [`DisplayHandle`](wayland_server::DisplayHandle) and publishes one or more globals.
//!   Keep it inside your compositor state and drop its globals with its `remove_global*`
//!   method once you no longer want clients to bind them.
//! - A `delegate_*!` macro implements the `Dispatch`/`GlobalDispatch` traits of
//!   [`wayland_server`] for your compositor state by forwarding to the handler.
//! - A handler trait (like [`compositor::CompositorHandler`]) lets your compositor react to
//!   what clients do.
//!
//! ```no_run
//! use trellis::delegate_compositor;
//! use trellis::reexports::wayland_server::{protocol::wl_surface::WlSurface, Display};
//! use trellis::wayland::compositor::{CompositorHandler, CompositorState};
//!
//! struct State {
//!     compositor_state: CompositorState,
//! }
//!
//! impl CompositorHandler for State {
//!     fn commit(&mut self, surface: &WlSurface) {
//!         // schedule a redraw, inspect the surface tree, ...
//!     }
//! }
//!
//! delegate_compositor!(State);
//!
//! let display = Display::<State>::new().unwrap();
//! let compositor_state = CompositorState::new::<State>(&display.handle());
//! let state = State { compositor_state };
//! ```

pub mod binding;
pub mod compositor;
pub mod seat;
pub mod tablet_manager;
