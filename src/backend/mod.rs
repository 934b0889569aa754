//! Descriptions of the input hardware the protocol handlers talk about
//!
//! Trellis does not read input devices itself. The compositor translates whatever its input
//! stack reports (libinput, a nested session, a test harness) into the types of this module and
//! hands them to the protocol handlers in [`crate::wayland`].

pub mod input;
