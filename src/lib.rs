#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # Trellis: subsurface and tablet protocol engines for wayland compositors
//!
//! This crate provides the server side of two state-heavy parts of the wayland protocol:
//!
//! - the surface hierarchy built with `wl_subcompositor`/`wl_subsurface`, with its double-buffered
//!   position and its stacking order, see [`wayland::compositor`];
//! - the graphics tablet protocol (`zwp_tablet_manager_v2` and friends), with its proximity
//!   sessions and its frame batching of tool events, see [`wayland::tablet_manager`].
//!
//! Everything else a compositor needs (sockets, buffers, rendering) is left to the compositor.
//!
//! ## Structure of the crate
//!
//! - [`backend`] contains the device-level descriptions of input hardware, which the compositor
//!   fills from whatever input stack it uses.
//! - [`wayland`] contains the protocol handlers. Each handler is a state struct that publishes its
//!   globals on the [`Display`](wayland_server::Display) plus a `delegate_*!` macro that routes the
//!   requests of its objects to it.
//! - [`utils`] contains small shared types: geometry, serials, liveness tracking.
//!
//! ## State handling
//!
//! All requests are dispatched sequentially on the compositor's own state type, the `D` of
//! `wayland_server::Display<D>`. Handlers never spawn threads; the few handles that are shared
//! (tablet tools, subsurfaces) are reference counted so they can be held by the compositor's input
//! code while being updated by client requests.
//!
//! ### Logging
//!
//! Trellis uses [`tracing`] for its internal logging. Protocol violations are reported to the
//! offending client and logged at `debug`, events dropped because nobody can receive them are
//! logged at `trace`.
//!
//! For release builds it is recommended to limit the log level at compile time:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod backend;
pub mod utils;
#[cfg(feature = "wayland_frontend")]
pub mod wayland;

pub mod reexports;
