use std::fmt;
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use wayland_protocols::wp::tablet::zv2::server::{
    zwp_tablet_seat_v2::ZwpTabletSeatV2,
    zwp_tablet_tool_v2::{self, ZwpTabletToolV2},
};
use wayland_server::protocol::wl_surface::WlSurface;
use wayland_server::{backend::ClientId, Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::backend::input::{ButtonState, TabletToolCapabilities, TabletToolDescriptor, TabletToolType};
use crate::utils::{Logical, Point, Serial, SERIAL_COUNTER};
use crate::wayland::{
    binding::ResourceBinding,
    compositor,
    seat::{CursorImageAttributes, CursorImageStatus, CURSOR_IMAGE_ROLE},
};

use super::tablet::TabletHandle;
use super::tablet_seat::TabletSeatHandler;
use super::TabletManagerState;

/// Converts a normalized axis value to the fixed range used on the wire
fn normalized_to_wire(value: f64) -> u32 {
    (value.clamp(0.0, 1.0) * 65535.0).round() as u32
}

/// Same as [`normalized_to_wire`] for the slider, which goes from -1 to 1
fn slider_to_wire(value: f64) -> i32 {
    (value.clamp(-1.0, 1.0) * 65535.0).round() as i32
}

/// One staged update, waiting for the next frame
#[derive(Debug)]
enum ToolEvent {
    ProximityIn { serial: Serial, tablet: TabletHandle },
    ProximityOut,
    Down { serial: Serial },
    Up,
    Motion(Point<f64, Logical>),
    Pressure(f64),
    Distance(f64),
    Tilt(f64, f64),
    Rotation(f64),
    Slider(f64),
    Wheel { degrees: f64, clicks: i32 },
    Button { button: u32, state: ButtonState, serial: Serial },
}

#[derive(Debug)]
pub(crate) struct TabletTool {
    desc: TabletToolDescriptor,
    instances: Vec<ResourceBinding<ZwpTabletToolV2>>,
    /// Surface the next frame is addressed to
    surface: Option<WlSurface>,
    /// Tablet of the current proximity session
    tablet: Option<TabletHandle>,
    /// Surface the client was last told the tool is in proximity of
    entered: Option<WlSurface>,
    /// Proximity out was requested, the session ends with the next frame
    leaving: bool,
    is_down: bool,
    pending: SmallVec<[ToolEvent; 8]>,
}

impl TabletTool {
    fn new(desc: TabletToolDescriptor) -> Self {
        TabletTool {
            desc,
            instances: Vec::new(),
            surface: None,
            tablet: None,
            entered: None,
            leaving: false,
            is_down: false,
            pending: SmallVec::new(),
        }
    }

    fn instance_for(&self, surface: &WlSurface) -> Option<ZwpTabletToolV2> {
        self.instances
            .iter()
            .find(|instance| instance.same_client_as(&surface.id()))
            .and_then(|instance| instance.upgrade().ok())
    }

    fn is_client_supported(&self) -> bool {
        self.surface
            .as_ref()
            .is_some_and(|surface| surface.is_alive() && self.instance_for(surface).is_some())
    }

    fn proximity_in(&mut self, tablet: &TabletHandle) {
        if self.surface.is_none() {
            debug!("Tablet tool entered proximity without a surface, ignoring");
            return;
        }
        self.tablet = Some(tablet.clone());
        self.leaving = false;
        self.pending.push(ToolEvent::ProximityIn {
            serial: SERIAL_COUNTER.next_serial(),
            tablet: tablet.clone(),
        });
    }

    fn proximity_out(&mut self) {
        self.leaving = true;
        self.pending.push(ToolEvent::ProximityOut);
    }

    /// Tells the client of `entered` the tool left it
    fn leave(&mut self, entered: &WlSurface, time: u32) {
        if let Some(wl_tool) = self.instance_for(entered) {
            if self.is_down {
                wl_tool.up();
            }
            wl_tool.proximity_out();
            wl_tool.frame(time);
        }
        self.is_down = false;
        self.entered = None;
    }

    fn enter(&mut self, surface: &WlSurface, wl_tool: &ZwpTabletToolV2, tablet: &TabletHandle, serial: Serial) -> bool {
        if self.entered.as_ref() == Some(surface) {
            return false;
        }
        match tablet.instance_for(surface) {
            Some(wl_tablet) => {
                wl_tool.proximity_in(serial.into(), &wl_tablet, surface);
                self.entered = Some(surface.clone());
                true
            }
            None => {
                debug!(surface = ?surface.id(), "Client did not bind the tablet, no proximity");
                false
            }
        }
    }

    /// Sends one staged event, returns whether something was sent
    fn deliver(&mut self, surface: &WlSurface, wl_tool: &ZwpTabletToolV2, event: ToolEvent) -> bool {
        match event {
            ToolEvent::ProximityIn { serial, tablet } => self.enter(surface, wl_tool, &tablet, serial),
            ToolEvent::ProximityOut => {
                if self.entered.take().is_none() {
                    return false;
                }
                if self.is_down {
                    wl_tool.up();
                    self.is_down = false;
                }
                wl_tool.proximity_out();
                true
            }
            // axis events are only meaningful between proximity in and out
            _ if self.entered.is_none() => false,
            ToolEvent::Down { serial } => {
                if self.is_down {
                    return false;
                }
                self.is_down = true;
                wl_tool.down(serial.into());
                true
            }
            ToolEvent::Up => {
                if !self.is_down {
                    return false;
                }
                self.is_down = false;
                wl_tool.up();
                true
            }
            ToolEvent::Motion(location) => {
                wl_tool.motion(location.x, location.y);
                true
            }
            ToolEvent::Pressure(pressure) => {
                wl_tool.pressure(normalized_to_wire(pressure));
                true
            }
            ToolEvent::Distance(distance) => {
                wl_tool.distance(normalized_to_wire(distance));
                true
            }
            ToolEvent::Tilt(x, y) => {
                wl_tool.tilt(x, y);
                true
            }
            ToolEvent::Rotation(degrees) => {
                wl_tool.rotation(degrees);
                true
            }
            ToolEvent::Slider(position) => {
                wl_tool.slider(slider_to_wire(position));
                true
            }
            ToolEvent::Wheel { degrees, clicks } => {
                wl_tool.wheel(degrees, clicks);
                true
            }
            ToolEvent::Button { button, state, serial } => {
                wl_tool.button(serial.into(), button, state.into());
                true
            }
        }
    }

    fn frame(&mut self, time: u32) {
        let events = std::mem::take(&mut self.pending);
        let target = self.surface.clone().filter(|surface| surface.is_alive());

        // the frame goes to another surface than the one in proximity: close the old session
        // and, unless the caller starts a new one explicitly, carry the current one over
        let mut reenter = false;
        if target != self.entered {
            if let Some(entered) = self.entered.clone() {
                trace!(from = ?entered.id(), "Tablet tool changed surface");
                self.leave(&entered, time);
            }
            reenter = self.tablet.is_some()
                && !self.leaving
                && !events
                    .iter()
                    .any(|event| matches!(event, ToolEvent::ProximityIn { .. }));
        }

        let instance = target
            .as_ref()
            .and_then(|surface| self.instance_for(surface).map(|wl_tool| (surface.clone(), wl_tool)));
        match instance {
            Some((surface, wl_tool)) => {
                let mut sent = false;
                if reenter {
                    if let Some(tablet) = self.tablet.clone() {
                        sent |= self.enter(&surface, &wl_tool, &tablet, SERIAL_COUNTER.next_serial());
                    }
                }
                for event in events {
                    sent |= self.deliver(&surface, &wl_tool, event);
                }
                if sent || self.entered.is_some() {
                    wl_tool.frame(time);
                }
            }
            None if !events.is_empty() => {
                trace!(dropped = events.len(), "No client to receive tablet tool events");
            }
            None => {}
        }

        if self.leaving {
            self.surface = None;
            self.tablet = None;
            self.entered = None;
            self.is_down = false;
            self.leaving = false;
        }
    }

    fn removed(&mut self) {
        for instance in self.instances.drain(..) {
            if let Ok(wl_tool) = instance.upgrade() {
                // the tool will send no further events
                wl_tool.removed();
            }
        }
        self.surface = None;
        self.tablet = None;
        self.entered = None;
        self.pending.clear();
    }
}

/// Handle to a tablet tool device
///
/// A tool represents a physical tool that has been, or is currently, in use with a tablet of the
/// seat. Tools able to report a hardware serial are the same tool on every tablet.
///
/// Events are staged by the methods of this handle and only sent to the client on
/// [`frame`](TabletToolHandle::frame), so that clients always see a consistent state. They are
/// addressed to the client owning the [current surface](TabletToolHandle::set_current_surface)
/// at the time of the frame, and silently dropped if that client did not bind the tablet seat.
#[derive(Debug, Clone)]
pub struct TabletToolHandle {
    pub(crate) inner: Arc<Mutex<TabletTool>>,
}

impl PartialEq for TabletToolHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl TabletToolHandle {
    pub(super) fn new(desc: &TabletToolDescriptor) -> Self {
        TabletToolHandle {
            inner: Arc::new(Mutex::new(TabletTool::new(desc.clone()))),
        }
    }

    pub(super) fn new_instance<D>(&self, client: &Client, dh: &DisplayHandle, seat: &ZwpTabletSeatV2)
    where
        D: Dispatch<ZwpTabletToolV2, TabletToolUserData>,
        D: 'static,
    {
        let desc = self.descriptor();
        let wl_tool = match client.create_resource::<ZwpTabletToolV2, _, D>(
            dh,
            seat.version(),
            TabletToolUserData {
                handle: self.clone(),
                desc: desc.clone(),
            },
        ) {
            Ok(wl_tool) => wl_tool,
            Err(err) => {
                warn!(?err, "Failed to create a zwp_tablet_tool_v2");
                return;
            }
        };

        seat.tool_added(&wl_tool);

        wl_tool._type(desc.tool_type.into());

        let (high, low) = desc.hardware_serial_parts();
        wl_tool.hardware_serial(high, low);

        let (high, low) = desc.hardware_id_wacom_parts();
        wl_tool.hardware_id_wacom(high, low);

        for (flag, capability) in [
            (TabletToolCapabilities::TILT, zwp_tablet_tool_v2::Capability::Tilt),
            (TabletToolCapabilities::PRESSURE, zwp_tablet_tool_v2::Capability::Pressure),
            (TabletToolCapabilities::DISTANCE, zwp_tablet_tool_v2::Capability::Distance),
            (TabletToolCapabilities::ROTATION, zwp_tablet_tool_v2::Capability::Rotation),
            (TabletToolCapabilities::SLIDER, zwp_tablet_tool_v2::Capability::Slider),
            (TabletToolCapabilities::WHEEL, zwp_tablet_tool_v2::Capability::Wheel),
        ] {
            if desc.capabilities.contains(flag) {
                wl_tool.capability(capability);
            }
        }

        wl_tool.done();

        match ResourceBinding::new(&wl_tool) {
            Ok(binding) => self.inner.lock().unwrap().instances.push(binding),
            Err(err) => debug!(?err, "zwp_tablet_tool_v2 died while being announced"),
        }
    }

    /// Description of the physical tool
    pub fn descriptor(&self) -> TabletToolDescriptor {
        self.inner.lock().unwrap().desc.clone()
    }

    /// Set the surface the next frames are addressed to, `None` to address no surface
    ///
    /// This sends nothing by itself. If the tool is in proximity of another surface, the next
    /// [`frame`](TabletToolHandle::frame) first tells that surface the tool left it, then tells
    /// the new surface the tool entered it.
    pub fn set_current_surface(&self, surface: Option<WlSurface>) {
        self.inner.lock().unwrap().surface = surface;
    }

    /// Surface the next frames are addressed to
    pub fn current_surface(&self) -> Option<WlSurface> {
        self.inner.lock().unwrap().surface.clone()
    }

    /// Whether the client owning the current surface can receive this tool's events
    ///
    /// This is false without a current surface, and stays true after
    /// [`proximity_out`](TabletToolHandle::proximity_out) until the frame ending the proximity
    /// session has been sent.
    pub fn is_client_supported(&self) -> bool {
        self.inner.lock().unwrap().is_client_supported()
    }

    /// The tool came in proximity of the current surface, through `tablet`
    ///
    /// Ignored if there is no current surface.
    pub fn proximity_in(&self, tablet: &TabletHandle) {
        self.inner.lock().unwrap().proximity_in(tablet);
    }

    /// The tool left proximity
    ///
    /// The proximity session ends with the next frame, which also clears the current surface.
    pub fn proximity_out(&self) {
        self.inner.lock().unwrap().proximity_out();
    }

    /// Tablet tool is making contact
    pub fn tip_down(&self, serial: Serial) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Down { serial });
    }

    /// Tablet tool is no longer making contact
    pub fn tip_up(&self) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Up);
    }

    /// Stage a motion, in coordinates local to the current surface
    pub fn motion(&self, location: Point<f64, Logical>) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Motion(location));
    }

    /// Stage a pressure update, normalized between 0 and 1
    pub fn pressure(&self, pressure: f64) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Pressure(pressure));
    }

    /// Stage a distance update, normalized between 0 and 1
    pub fn distance(&self, distance: f64) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Distance(distance));
    }

    /// Stage a tilt update, in degrees along the x and y axis
    pub fn tilt(&self, tilt: (f64, f64)) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Tilt(tilt.0, tilt.1));
    }

    /// Stage a rotation update, in degrees
    pub fn rotation(&self, rotation: f64) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Rotation(rotation));
    }

    /// Stage a slider update, normalized between -1 and 1
    pub fn slider_position(&self, slider: f64) {
        self.inner.lock().unwrap().pending.push(ToolEvent::Slider(slider));
    }

    /// Stage a wheel update
    pub fn wheel(&self, degrees: f64, clicks: i32) {
        self.inner
            .lock()
            .unwrap()
            .pending
            .push(ToolEvent::Wheel { degrees, clicks });
    }

    /// Stage a button press or release
    pub fn button(&self, button: u32, state: ButtonState, serial: Serial) {
        self.inner
            .lock()
            .unwrap()
            .pending
            .push(ToolEvent::Button { button, state, serial });
    }

    /// Send all staged events as one frame
    ///
    /// `time` is forwarded as is to the client, in milliseconds with an undefined base.
    pub fn frame(&self, time: u32) {
        self.inner.lock().unwrap().frame(time);
    }

    pub(super) fn removed(&self) {
        self.inner.lock().unwrap().removed();
    }
}

impl From<TabletToolType> for zwp_tablet_tool_v2::Type {
    #[inline]
    fn from(from: TabletToolType) -> zwp_tablet_tool_v2::Type {
        match from {
            TabletToolType::Pen => zwp_tablet_tool_v2::Type::Pen,
            TabletToolType::Eraser => zwp_tablet_tool_v2::Type::Eraser,
            TabletToolType::Brush => zwp_tablet_tool_v2::Type::Brush,
            TabletToolType::Pencil => zwp_tablet_tool_v2::Type::Pencil,
            TabletToolType::Airbrush => zwp_tablet_tool_v2::Type::Airbrush,
            TabletToolType::Mouse => zwp_tablet_tool_v2::Type::Mouse,
            TabletToolType::Lens => zwp_tablet_tool_v2::Type::Lens,
        }
    }
}

impl From<ButtonState> for zwp_tablet_tool_v2::ButtonState {
    #[inline]
    fn from(from: ButtonState) -> zwp_tablet_tool_v2::ButtonState {
        match from {
            ButtonState::Pressed => zwp_tablet_tool_v2::ButtonState::Pressed,
            ButtonState::Released => zwp_tablet_tool_v2::ButtonState::Released,
        }
    }
}

/// User data of ZwpTabletToolV2 object
pub struct TabletToolUserData {
    pub(crate) handle: TabletToolHandle,
    pub(crate) desc: TabletToolDescriptor,
}

impl fmt::Debug for TabletToolUserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabletToolUserData")
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

impl<D> Dispatch<ZwpTabletToolV2, TabletToolUserData, D> for TabletManagerState
where
    D: Dispatch<ZwpTabletToolV2, TabletToolUserData>,
    D: TabletSeatHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        tool: &ZwpTabletToolV2,
        request: zwp_tablet_tool_v2::Request,
        data: &TabletToolUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwp_tablet_tool_v2::Request::SetCursor {
                surface,
                hotspot_x,
                hotspot_y,
                ..
            } => {
                // only the client the tool is over may change its cursor
                let Some(current) = data.handle.current_surface() else {
                    return;
                };
                if !current.id().same_client_as(&tool.id()) {
                    return;
                }

                let Some(surface) = surface else {
                    state.tablet_tool_image(&data.desc, CursorImageStatus::Hidden);
                    return;
                };
                if compositor::give_role(&surface, CURSOR_IMAGE_ROLE).is_err() {
                    tool.post_error(
                        zwp_tablet_tool_v2::Error::Role,
                        "Given wl_surface has another role.",
                    );
                    return;
                }

                compositor::with_data_map(&surface, |data_map| {
                    let attributes =
                        data_map.get_or_insert_threadsafe(|| Mutex::new(CursorImageAttributes::default()));
                    attributes.lock().unwrap().hotspot = (hotspot_x, hotspot_y).into();
                });
                state.tablet_tool_image(&data.desc, CursorImageStatus::Surface(surface));
            }
            zwp_tablet_tool_v2::Request::Destroy => {
                // Nothing to do
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(_state: &mut D, _client: ClientId, resource: &ZwpTabletToolV2, data: &TabletToolUserData) {
        data.handle.inner.lock().unwrap().instances.retain(|instance| {
            if instance.id() == resource.id() {
                instance.destroy_notify();
                false
            } else {
                true
            }
        });
    }
}
