use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use wayland_protocols::wp::tablet::zv2::server::{
    zwp_tablet_seat_v2::ZwpTabletSeatV2,
    zwp_tablet_v2::{self, ZwpTabletV2},
};
use wayland_server::protocol::wl_surface::WlSurface;
use wayland_server::{backend::ClientId, Client, DataInit, Dispatch, DisplayHandle, Resource};

use crate::wayland::binding::ResourceBinding;

use super::TabletManagerState;

/// Description of graphics tablet device
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct TabletDescriptor {
    /// Tablet device name
    pub name: String,
    /// Tablet device USB (vendor, product) id
    pub usb_id: Option<(u32, u32)>,
    /// Name of the device node, like `event33`
    ///
    /// A seat knows at most one tablet per device node.
    pub sysname: String,
    /// Paths to the device announced to clients
    pub paths: Vec<PathBuf>,
}

#[derive(Debug)]
struct Tablet {
    desc: TabletDescriptor,
    instances: Vec<ResourceBinding<ZwpTabletV2>>,
}

/// Handle to a tablet device
///
/// Tablet represents one graphics tablet device
#[derive(Debug, Clone)]
pub struct TabletHandle {
    inner: Arc<Mutex<Tablet>>,
}

impl PartialEq for TabletHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl TabletHandle {
    pub(super) fn new(desc: &TabletDescriptor) -> Self {
        TabletHandle {
            inner: Arc::new(Mutex::new(Tablet {
                desc: desc.clone(),
                instances: Vec::new(),
            })),
        }
    }

    pub(super) fn new_instance<D>(&self, client: &Client, dh: &DisplayHandle, seat: &ZwpTabletSeatV2)
    where
        D: Dispatch<ZwpTabletV2, TabletUserData>,
        D: 'static,
    {
        let wl_tablet = match client.create_resource::<ZwpTabletV2, _, D>(
            dh,
            seat.version(),
            TabletUserData { handle: self.clone() },
        ) {
            Ok(wl_tablet) => wl_tablet,
            Err(err) => {
                warn!(?err, "Failed to create a zwp_tablet_v2");
                return;
            }
        };

        seat.tablet_added(&wl_tablet);

        let desc = self.descriptor();
        wl_tablet.name(desc.name.clone());
        if let Some((id_vendor, id_product)) = desc.usb_id {
            wl_tablet.id(id_vendor, id_product);
        }
        for path in desc.paths.iter().filter_map(|path| path.to_str()) {
            wl_tablet.path(path.to_owned());
        }
        wl_tablet.done();

        match ResourceBinding::new(&wl_tablet) {
            Ok(binding) => self.inner.lock().unwrap().instances.push(binding),
            Err(err) => debug!(?err, "zwp_tablet_v2 died while being announced"),
        }
    }

    /// Description of the tablet device
    pub fn descriptor(&self) -> TabletDescriptor {
        self.inner.lock().unwrap().desc.clone()
    }

    /// Whether the client owning `surface` knows about this tablet
    pub fn is_surface_supported(&self, surface: &WlSurface) -> bool {
        surface.is_alive() && self.instance_for(surface).is_some()
    }

    /// The `zwp_tablet_v2` of the client owning `surface`
    pub(super) fn instance_for(&self, surface: &WlSurface) -> Option<ZwpTabletV2> {
        self.inner
            .lock()
            .unwrap()
            .instances
            .iter()
            .find(|instance| instance.same_client_as(&surface.id()))
            .and_then(|instance| instance.upgrade().ok())
    }

    pub(super) fn removed(&self) {
        for instance in self.inner.lock().unwrap().instances.drain(..) {
            if let Ok(wl_tablet) = instance.upgrade() {
                wl_tablet.removed();
            }
        }
    }
}

/// User data of ZwpTabletV2 object
#[derive(Debug)]
pub struct TabletUserData {
    handle: TabletHandle,
}

impl<D> Dispatch<ZwpTabletV2, TabletUserData, D> for TabletManagerState
where
    D: Dispatch<ZwpTabletV2, TabletUserData>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _tablet: &ZwpTabletV2,
        request: zwp_tablet_v2::Request,
        _data: &TabletUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwp_tablet_v2::Request::Destroy => {
                // Nothing to do
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(_state: &mut D, _client: ClientId, resource: &ZwpTabletV2, data: &TabletUserData) {
        data.handle.inner.lock().unwrap().instances.retain(|instance| {
            if instance.id() == Resource::id(resource) {
                instance.destroy_notify();
                false
            } else {
                true
            }
        });
    }
}
