//! Input device descriptions

mod tablet;

pub use tablet::{TabletToolCapabilities, TabletToolDescriptor, TabletToolType};

/// State of a button on a pointer device, like mouse or tablet tool. Either pressed or released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}
