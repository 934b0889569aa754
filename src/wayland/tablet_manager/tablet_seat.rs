use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, trace};
use wayland_protocols::wp::tablet::zv2::server::{
    zwp_tablet_seat_v2::{self, ZwpTabletSeatV2},
    zwp_tablet_tool_v2::ZwpTabletToolV2,
    zwp_tablet_v2::ZwpTabletV2,
};
use wayland_server::{backend::ClientId, Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::backend::input::TabletToolDescriptor;
use crate::wayland::{binding::ResourceBinding, seat::CursorImageStatus};

use super::tablet::{TabletDescriptor, TabletHandle, TabletUserData};
use super::tablet_tool::{TabletToolHandle, TabletToolUserData};
use super::TabletManagerState;

/// Handler trait for the tablet seats, implemented on your compositor state
pub trait TabletSeatHandler {
    /// Callback that will be notified whenever a client requests to set a custom tool image.
    fn tablet_tool_image(&mut self, tool: &TabletToolDescriptor, image: CursorImageStatus) {
        let _ = (tool, image);
    }
}

#[derive(Debug, Default)]
struct TabletSeat {
    instances: Vec<ResourceBinding<ZwpTabletSeatV2>>,
    /// Tablets keyed by device node, in announcement order
    tablets: IndexMap<String, TabletHandle>,
    tools: IndexMap<TabletToolDescriptor, TabletToolHandle>,
}

impl TabletSeat {
    fn live_instances(&self) -> impl Iterator<Item = (Client, ZwpTabletSeatV2)> + '_ {
        self.instances
            .iter()
            .filter_map(|instance| instance.upgrade().ok())
            .filter_map(|seat| seat.client().map(|client| (client, seat)))
    }
}

/// Handle to a tablet seat
///
/// TabletSeat extends `Seat` with graphic tablet specific functionality
///
/// TabletSeatHandle can be used to advertise available graphics tablets and tools to wayland clients.
/// Clients binding the tablet seat late are told about every tablet and tool added before.
#[derive(Default, Debug, Clone)]
pub struct TabletSeatHandle {
    inner: Arc<Mutex<TabletSeat>>,
}

impl PartialEq for TabletSeatHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl TabletSeatHandle {
    pub(super) fn add_instance<D>(&self, dh: &DisplayHandle, seat: &ZwpTabletSeatV2, client: &Client)
    where
        D: Dispatch<ZwpTabletV2, TabletUserData>,
        D: Dispatch<ZwpTabletToolV2, TabletToolUserData>,
        D: 'static,
    {
        let mut inner = self.inner.lock().unwrap();

        // Notify new instance about available tablets
        for tablet in inner.tablets.values() {
            tablet.new_instance::<D>(client, dh, seat);
        }

        // Notify new instance about available tools
        for tool in inner.tools.values() {
            tool.new_instance::<D>(client, dh, seat);
        }

        match ResourceBinding::new(seat) {
            Ok(binding) => inner.instances.push(binding),
            Err(err) => debug!(?err, "zwp_tablet_seat_v2 died while being announced"),
        }
    }

    /// Add a new tablet to a seat.
    ///
    /// You can either add tablet when the input backend reports the device,
    /// or you can add tablet based on tool event, then clients will not know about devices that are not being used
    ///
    /// Returns new [TabletHandle] if tablet was not known by this seat. Tablets are told apart by
    /// their device node, so for an already known node it returns the existing handle.
    pub fn add_tablet<D>(&self, dh: &DisplayHandle, tablet_desc: &TabletDescriptor) -> TabletHandle
    where
        D: Dispatch<ZwpTabletV2, TabletUserData>,
        D: 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tablet) = inner.tablets.get(&tablet_desc.sysname) {
            return tablet.clone();
        }

        let tablet = TabletHandle::new(tablet_desc);
        for (client, seat) in inner.live_instances() {
            tablet.new_instance::<D>(&client, dh, &seat);
        }
        trace!(name = %tablet_desc.name, sysname = %tablet_desc.sysname, "Added tablet");
        inner.tablets.insert(tablet_desc.sysname.clone(), tablet.clone());
        tablet
    }

    /// Get a handle to the tablet on device node `sysname`
    pub fn tablet(&self, sysname: &str) -> Option<TabletHandle> {
        self.inner.lock().unwrap().tablets.get(sysname).cloned()
    }

    /// Count all tablet devices
    pub fn count_tablets(&self) -> usize {
        self.inner.lock().unwrap().tablets.len()
    }

    /// Remove tablet device
    ///
    /// Called when tablet is no longer available, clients receive `removed` for it.
    pub fn remove_tablet(&self, sysname: &str) {
        let removed = self.inner.lock().unwrap().tablets.shift_remove(sysname);
        if let Some(tablet) = removed {
            trace!(sysname, "Removed tablet");
            tablet.removed();
        }
    }

    /// Remove all tablet devices
    pub fn clear_tablets(&self) {
        let tablets = std::mem::take(&mut self.inner.lock().unwrap().tablets);
        for tablet in tablets.values() {
            tablet.removed();
        }
    }

    /// Add a new tool to a seat.
    ///
    /// Tool is usually added the first time it comes in proximity of a tablet.
    ///
    /// Returns new [TabletToolHandle] if tool was not know by this seat, if tool was already know it returns existing handle,
    /// so it is fine to call this on every proximity event.
    pub fn add_tool<D>(&self, dh: &DisplayHandle, tool_desc: &TabletToolDescriptor) -> TabletToolHandle
    where
        D: Dispatch<ZwpTabletToolV2, TabletToolUserData>,
        D: 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tool) = inner.tools.get(tool_desc) {
            return tool.clone();
        }

        let tool = TabletToolHandle::new(tool_desc);
        for (client, seat) in inner.live_instances() {
            tool.new_instance::<D>(&client, dh, &seat);
        }
        trace!(tool_type = ?tool_desc.tool_type, serial = tool_desc.hardware_serial, "Added tablet tool");
        inner.tools.insert(tool_desc.clone(), tool.clone());
        tool
    }

    /// Get a handle to the tablet tool
    pub fn tool(&self, tool_desc: &TabletToolDescriptor) -> Option<TabletToolHandle> {
        self.inner.lock().unwrap().tools.get(tool_desc).cloned()
    }

    /// Count all tablet tool devices
    pub fn count_tools(&self) -> usize {
        self.inner.lock().unwrap().tools.len()
    }

    /// Remove tablet tool device
    ///
    /// Policy of tool removal is a compositor-specific.
    ///
    /// One possible policy would be to remove a tool when all tablets the tool was used on are removed.
    pub fn remove_tool(&self, tool_desc: &TabletToolDescriptor) {
        let removed = self.inner.lock().unwrap().tools.shift_remove(tool_desc);
        if let Some(tool) = removed {
            trace!(tool_type = ?tool_desc.tool_type, "Removed tablet tool");
            tool.removed();
        }
    }

    /// Remove all tablet tool devices
    pub fn clear_tools(&self) {
        let tools = std::mem::take(&mut self.inner.lock().unwrap().tools);
        for tool in tools.values() {
            tool.removed();
        }
    }
}

/// User data of ZwpTabletSeatV2 object
#[derive(Debug)]
pub struct TabletSeatUserData {
    pub(super) handle: TabletSeatHandle,
}

impl<D> Dispatch<ZwpTabletSeatV2, TabletSeatUserData, D> for TabletManagerState
where
    D: Dispatch<ZwpTabletSeatV2, TabletSeatUserData>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _seat: &ZwpTabletSeatV2,
        request: zwp_tablet_seat_v2::Request,
        _data: &TabletSeatUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwp_tablet_seat_v2::Request::Destroy => {
                // Nothing to do
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(_state: &mut D, _client: ClientId, resource: &ZwpTabletSeatV2, data: &TabletSeatUserData) {
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
