//! Utilities for graphics tablet support
//!
//! This module provides helpers to handle graphics tablets.
//!
//! Tablets and tools are announced per [`Seat`]: the compositor adds them to the seat's
//! [`TabletSeatHandle`], and every client binding the tablet seat is told about them, including
//! clients binding late. Tool input is then fed through the [`TabletToolHandle`], which stages
//! events and sends them as one batch on each [`frame`](TabletToolHandle::frame).
//!
//! ```no_run
//! use trellis::{delegate_seat, delegate_tablet_manager};
//! use trellis::backend::input::{TabletToolCapabilities, TabletToolDescriptor, TabletToolType};
//! use trellis::reexports::wayland_server::Display;
//! use trellis::wayland::seat::Seat;
//! use trellis::wayland::tablet_manager::{
//!     TabletDescriptor, TabletManagerState, TabletSeatHandler, TabletSeatTrait,
//! };
//!
//! struct State;
//! impl TabletSeatHandler for State {}
//! delegate_seat!(State);
//! delegate_tablet_manager!(State);
//!
//! let display = Display::<State>::new().unwrap();
//! let dh = display.handle();
//!
//! // First we need a regular seat
//! let seat = Seat::new::<State>(&dh, "seat-0");
//!
//! // Create the manager global
//! let manager_state = TabletManagerState::new::<State>(&dh);
//!
//! let tablet_seat = seat.tablet_seat(); // Get TabletSeat associated with this seat
//! let tablet = tablet_seat.add_tablet::<State>(&dh, &TabletDescriptor {
//!     name: "Test".into(),
//!     usb_id: None,
//!     sysname: "event33".into(),
//!     paths: Vec::new(),
//! });
//! let tool = tablet_seat.add_tool::<State>(&dh, &TabletToolDescriptor {
//!     tool_type: TabletToolType::Pen,
//!     hardware_serial: 0,
//!     hardware_id_wacom: 0,
//!     capabilities: TabletToolCapabilities::PRESSURE,
//! });
//!
//! // later, with the surface under the tool
//! # let surface = None;
//! tool.set_current_surface(surface);
//! tool.proximity_in(&tablet);
//! tool.pressure(0.3);
//! tool.frame(42);
//! ```

use std::fmt;

use tracing::trace;
use wayland_protocols::wp::tablet::zv2::server::{
    zwp_tablet_manager_v2::{self, ZwpTabletManagerV2},
    zwp_tablet_seat_v2::ZwpTabletSeatV2,
    zwp_tablet_tool_v2::ZwpTabletToolV2,
    zwp_tablet_v2::ZwpTabletV2,
};
use wayland_server::{
    backend::GlobalId, Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::wayland::seat::Seat;

/// Advertised version of `zwp_tablet_manager_v2`
pub const MANAGER_VERSION: u32 = 1;

mod tablet;
mod tablet_seat;
mod tablet_tool;

pub use tablet::{TabletDescriptor, TabletHandle, TabletUserData};
pub use tablet_seat::{TabletSeatHandle, TabletSeatHandler, TabletSeatUserData};
pub use tablet_tool::{TabletToolHandle, TabletToolUserData};

/// Extends [Seat] with graphic tablet specific functionality
pub trait TabletSeatTrait {
    /// Get tablet seat associated with this seat
    fn tablet_seat(&self) -> TabletSeatHandle;
}

impl TabletSeatTrait for Seat {
    fn tablet_seat(&self) -> TabletSeatHandle {
        let user_data = self.user_data();
        user_data.get_or_insert_threadsafe(TabletSeatHandle::default).as_ref().clone()
    }
}

/// Global data of the `zwp_tablet_manager_v2` global
pub struct TabletManagerGlobalData {
    filter: Box<dyn for<'c> Fn(&'c Client) -> bool + Send + Sync>,
}

impl fmt::Debug for TabletManagerGlobalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabletManagerGlobalData").finish_non_exhaustive()
    }
}

/// State of wp tablet protocol
#[derive(Debug)]
pub struct TabletManagerState {
    global: GlobalId,
}

impl TabletManagerState {
    /// Initialize a tablet manager global.
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<ZwpTabletManagerV2, TabletManagerGlobalData>,
        D: Dispatch<ZwpTabletManagerV2, ()>,
        D: 'static,
    {
        Self::new_with_filter::<D, _>(display, |_| true)
    }

    /// Initialize a tablet manager global, visible only to the clients accepted by `filter`
    pub fn new_with_filter<D, F>(display: &DisplayHandle, filter: F) -> Self
    where
        D: GlobalDispatch<ZwpTabletManagerV2, TabletManagerGlobalData>,
        D: Dispatch<ZwpTabletManagerV2, ()>,
        D: 'static,
        F: for<'c> Fn(&'c Client) -> bool + Send + Sync + 'static,
    {
        let global = display.create_global::<D, ZwpTabletManagerV2, _>(
            MANAGER_VERSION,
            TabletManagerGlobalData {
                filter: Box::new(filter),
            },
        );

        Self { global }
    }

    /// Get the id of ZwpTabletManagerV2 global
    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }

    /// Remove the ZwpTabletManagerV2 global
    ///
    /// Objects already bound keep working until the clients destroy them.
    pub fn remove_global<D: 'static>(self, display: &DisplayHandle) {
        display.remove_global::<D>(self.global);
    }
}

impl<D> GlobalDispatch<ZwpTabletManagerV2, TabletManagerGlobalData, D> for TabletManagerState
where
    D: GlobalDispatch<ZwpTabletManagerV2, TabletManagerGlobalData>,
    D: Dispatch<ZwpTabletManagerV2, ()>,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _dh: &DisplayHandle,
        _client: &Client,
        resource: New<ZwpTabletManagerV2>,
        _global_data: &TabletManagerGlobalData,
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }

    fn can_view(client: Client, global_data: &TabletManagerGlobalData) -> bool {
        (global_data.filter)(&client)
    }
}

impl<D> Dispatch<ZwpTabletManagerV2, (), D> for TabletManagerState
where
    D: Dispatch<ZwpTabletManagerV2, ()>,
    D: Dispatch<ZwpTabletSeatV2, TabletSeatUserData>,
    D: Dispatch<ZwpTabletV2, TabletUserData>,
    D: Dispatch<ZwpTabletToolV2, TabletToolUserData>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        client: &Client,
        _resource: &ZwpTabletManagerV2,
        request: zwp_tablet_manager_v2::Request,
        _data: &(),
        dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwp_tablet_manager_v2::Request::GetTabletSeat { tablet_seat, seat } => {
                // a wl_seat we do not manage gets a tablet seat that never announces anything
                let handle = match Seat::from_resource(&seat) {
                    Some(seat) => seat.tablet_seat(),
                    None => TabletSeatHandle::default(),
                };

                let instance = data_init.init(
                    tablet_seat,
                    TabletSeatUserData {
                        handle: handle.clone(),
                    },
                );
                trace!(tablet_seat = ?instance.id(), seat = ?seat.id(), "Created tablet seat");

                handle.add_instance::<D>(dh, &instance, client);
            }
            zwp_tablet_manager_v2::Request::Destroy => {
                // Nothing to do
            }
            _ => unreachable!(),
        }
    }
}

/// Macro to delegate implementation of wp tablet protocol to [`TabletManagerState`].
///
/// You must also implement [`TabletSeatHandler`] to use this.
#[macro_export]
macro_rules! delegate_tablet_manager {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_protocols::wp::tablet::zv2::server::zwp_tablet_manager_v2::ZwpTabletManagerV2: $crate::wayland::tablet_manager::TabletManagerGlobalData
        ] => $crate::wayland::tablet_manager::TabletManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_protocols::wp::tablet::zv2::server::zwp_tablet_manager_v2::ZwpTabletManagerV2: ()
        ] => $crate::wayland::tablet_manager::TabletManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_protocols::wp::tablet::zv2::server::zwp_tablet_seat_v2::ZwpTabletSeatV2: $crate::wayland::tablet_manager::TabletSeatUserData
        ] => $crate::wayland::tablet_manager::TabletManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_protocols::wp::tablet::zv2::server::zwp_tablet_v2::ZwpTabletV2: $crate::wayland::tablet_manager::TabletUserData
        ] => $crate::wayland::tablet_manager::TabletManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_protocols::wp::tablet::zv2::server::zwp_tablet_tool_v2::ZwpTabletToolV2: $crate::wayland::tablet_manager::TabletToolUserData
        ] => $crate::wayland::tablet_manager::TabletManagerState);
    };
}
