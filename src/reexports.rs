//! Crates whose types appear in the public api of trellis
//!
//! Depend on these reexports rather than on your own copy, so that the versions always match.

#[cfg(feature = "wayland_frontend")]
pub use wayland_protocols;
#[cfg(feature = "wayland_frontend")]
pub use wayland_server;
