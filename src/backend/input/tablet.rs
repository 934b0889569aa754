use bitflags::bitflags;

/// A physical tool used on graphics tablets
///
/// Tools are identified by their whole descriptor: adding a tool whose descriptor is already known
/// to a seat gives back the existing tool. Tools able to report a hardware serial are thus the same
/// tool on every tablet of the seat, the others are told apart by type and capabilities only.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct TabletToolDescriptor {
    /// What kind of tool this is
    pub tool_type: TabletToolType,
    /// Hardware serial of the tool, `0` if the device cannot report one
    pub hardware_serial: u64,
    /// Hardware id of the tool in Wacom's format, `0` if unknown
    pub hardware_id_wacom: u64,
    /// Axes the tool reports on top of x/y and tip contact
    pub capabilities: TabletToolCapabilities,
}

impl TabletToolDescriptor {
    /// Descriptor of a tool without hardware identification
    pub fn new(tool_type: TabletToolType, capabilities: TabletToolCapabilities) -> Self {
        TabletToolDescriptor {
            tool_type,
            hardware_serial: 0,
            hardware_id_wacom: 0,
            capabilities,
        }
    }

    /// Hardware serial as sent on the wire, high 32 bits first
    pub fn hardware_serial_parts(&self) -> (u32, u32) {
        split_u64(self.hardware_serial)
    }

    /// Wacom hardware id as sent on the wire, high 32 bits first
    pub fn hardware_id_wacom_parts(&self) -> (u32, u32) {
        split_u64(self.hardware_id_wacom)
    }
}

fn split_u64(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

/// Physical type of a tablet tool, which usually decides how the compositor and clients
/// interpret its input
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum TabletToolType {
    /// Pen
    Pen,
    /// Eraser, often the back end of a pen
    Eraser,
    /// Paintbrush
    Brush,
    /// Pencil
    Pencil,
    /// Airbrush
    Airbrush,
    /// Mouse used on the tablet
    Mouse,
    /// Mouse with a lens cursor
    Lens,
}

bitflags! {
    /// Axes a tablet tool can report beyond its position and tip contact
    ///
    /// The values match the `capability` enum of the tablet protocol.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TabletToolCapabilities: u32 {
        /// Tilt along x and y
        const TILT = 1;
        /// Tip pressure
        const PRESSURE = 2;
        /// Distance to the tablet surface
        const DISTANCE = 4;
        /// Rotation around the z axis
        const ROTATION = 16;
        /// Slider, like the finger wheel of an airbrush
        const SLIDER = 32;
        /// Wheel
        const WHEEL = 64;
    }
}

impl Default for TabletToolCapabilities {
    fn default() -> Self {
        TabletToolCapabilities::empty()
    }
}
