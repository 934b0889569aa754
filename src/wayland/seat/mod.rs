//! Seat global utilities
//!
//! This module provides a minimal `wl_seat` global. It exists so that protocol extensions keyed on
//! a seat, like the tablet protocol, have a seat to attach to: the seat announces its name and no
//! capabilities, and pointer, keyboard or touch objects requested anyway are created inert.
//!
//! ```no_run
//! use trellis::delegate_seat;
//! use trellis::reexports::wayland_server::Display;
//! use trellis::wayland::seat::Seat;
//!
//! struct State {
//!     seat: Seat,
//! }
//!
//! delegate_seat!(State);
//!
//! let display = Display::<State>::new().unwrap();
//! let seat = Seat::new::<State>(&display.handle(), "seat-0");
//! ```
//!
//! Additional per-seat state is stored in the seat's [`user_data`](Seat::user_data).

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use tracing::trace;
use wayland_server::{
    backend::{ClientId, GlobalId},
    protocol::{
        wl_keyboard::WlKeyboard,
        wl_pointer::WlPointer,
        wl_seat::{self, WlSeat},
        wl_surface::WlSurface,
        wl_touch::WlTouch,
    },
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::utils::{user_data::UserDataMap, Logical, Point};

/// Advertised version of `wl_seat`
pub const SEAT_VERSION: u32 = 7;

/// The role of a surface used as a cursor image
pub const CURSOR_IMAGE_ROLE: &str = "cursor_image";

/// Attributes of a cursor image surface, stored in its data map
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CursorImageAttributes {
    /// Location of the hotspot of the pointer in the surface
    pub hotspot: Point<i32, Logical>,
}

/// Possible status of a cursor as requested by clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorImageStatus {
    /// The cursor should be hidden
    Hidden,
    /// The compositor should draw the given surface
    Surface(WlSurface),
}

struct SeatInner {
    name: String,
    global: Mutex<Option<GlobalId>>,
    known_seats: Mutex<Vec<wayland_server::Weak<WlSeat>>>,
    user_data: UserDataMap,
}

/// A Seat handle
///
/// Its `wl_seat` global is created by [`Seat::new`]. This is an handle to the inner logic,
/// it can be cloned.
#[derive(Clone)]
pub struct Seat {
    arc: Arc<SeatInner>,
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seat")
            .field("name", &self.arc.name)
            .field("global", &*self.arc.global.lock().unwrap())
            .field("user_data", &self.arc.user_data)
            .finish()
    }
}

impl PartialEq for Seat {
    fn eq(&self, other: &Seat) -> bool {
        Arc::ptr_eq(&self.arc, &other.arc)
    }
}

impl Eq for Seat {}

/// Global data of the `wl_seat` global
#[derive(Debug)]
pub struct SeatGlobalData {
    seat: Seat,
}

/// User data of `wl_seat` objects
#[derive(Debug)]
pub struct SeatUserData {
    seat: Seat,
}

impl Seat {
    /// Create a new seat global
    ///
    /// The name is sent to clients binding the seat with version 2 or later.
    pub fn new<D>(display: &DisplayHandle, name: impl Into<String>) -> Seat
    where
        D: GlobalDispatch<WlSeat, SeatGlobalData> + 'static,
    {
        let seat = Seat {
            arc: Arc::new(SeatInner {
                name: name.into(),
                global: Mutex::new(None),
                known_seats: Mutex::new(Vec::new()),
                user_data: UserDataMap::new(),
            }),
        };
        let global =
            display.create_global::<D, WlSeat, _>(SEAT_VERSION, SeatGlobalData { seat: seat.clone() });
        *seat.arc.global.lock().unwrap() = Some(global);
        seat
    }

    /// Attempt to retrieve a [`Seat`] from an existing resource
    pub fn from_resource(seat: &WlSeat) -> Option<Seat> {
        seat.data::<SeatUserData>().map(|data| data.seat.clone())
    }

    /// Checks whether a given [`WlSeat`] is associated with this [`Seat`]
    pub fn owns(&self, seat: &WlSeat) -> bool {
        let known_seats = self.arc.known_seats.lock().unwrap();
        known_seats.iter().any(|s| s.id() == seat.id())
    }

    /// Name of this seat
    pub fn name(&self) -> &str {
        &self.arc.name
    }

    /// Access the `UserDataMap` associated with this `Seat`
    pub fn user_data(&self) -> &UserDataMap {
        &self.arc.user_data
    }

    /// Get the id of the `wl_seat` global, if it was not removed
    pub fn global(&self) -> Option<GlobalId> {
        self.arc.global.lock().unwrap().clone()
    }

    /// Remove the `wl_seat` global of this seat
    pub fn remove_global<D: 'static>(&self, display: &DisplayHandle) {
        if let Some(global) = self.arc.global.lock().unwrap().take() {
            display.remove_global::<D>(global);
        }
    }
}

impl<D> GlobalDispatch<WlSeat, SeatGlobalData, D> for Seat
where
    D: GlobalDispatch<WlSeat, SeatGlobalData>,
    D: Dispatch<WlSeat, SeatUserData>,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlSeat>,
        global_data: &SeatGlobalData,
        data_init: &mut DataInit<'_, D>,
    ) {
        let seat = global_data.seat.clone();
        let resource = data_init.init(resource, SeatUserData { seat: seat.clone() });

        if resource.version() >= 2 {
            resource.name(seat.arc.name.clone());
        }
        resource.capabilities(wl_seat::Capability::empty());

        trace!(seat = seat.name(), resource = ?resource.id(), "Bound wl_seat");
        seat.arc.known_seats.lock().unwrap().push(resource.downgrade());
    }
}

impl<D> Dispatch<WlSeat, SeatUserData, D> for Seat
where
    D: Dispatch<WlSeat, SeatUserData>,
    D: Dispatch<WlPointer, ()>,
    D: Dispatch<WlKeyboard, ()>,
    D: Dispatch<WlTouch, ()>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &WlSeat,
        request: wl_seat::Request,
        _data: &SeatUserData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        // no capabilities are advertised, devices requested anyway never receive events
        match request {
            wl_seat::Request::GetPointer { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::GetKeyboard { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::GetTouch { id } => {
                data_init.init(id, ());
            }
            wl_seat::Request::Release => {}
            _ => unreachable!(),
        }
    }

    fn destroyed(_state: &mut D, _client: ClientId, resource: &WlSeat, data: &SeatUserData) {
        data.seat
            .arc
            .known_seats
            .lock()
            .unwrap()
            .retain(|seat| seat.id() != resource.id());
    }
}

macro_rules! inert_device {
    ($($iface:ty),*) => {
        $(
            impl<D> Dispatch<$iface, (), D> for Seat
            where
                D: Dispatch<$iface, ()>,
                D: 'static,
            {
                fn request(
                    _state: &mut D,
                    _client: &Client,
                    _resource: &$iface,
                    _request: <$iface as Resource>::Request,
                    _data: &(),
                    _dhandle: &DisplayHandle,
                    _data_init: &mut DataInit<'_, D>,
                ) {
                }
            }
        )*
    };
}

inert_device!(WlPointer, WlKeyboard, WlTouch);

/// Implements the `wl_seat` global and its device objects on your state type, by delegating to
/// [`Seat`](crate::wayland::seat::Seat)
#[macro_export]
macro_rules! delegate_seat {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_seat::WlSeat: $crate::wayland::seat::SeatGlobalData
        ] => $crate::wayland::seat::Seat);

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_seat::WlSeat: $crate::wayland::seat::SeatUserData
        ] => $crate::wayland::seat::Seat);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_pointer::WlPointer: ()
        ] => $crate::wayland::seat::Seat);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_keyboard::WlKeyboard: ()
        ] => $crate::wayland::seat::Seat);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_touch::WlTouch: ()
        ] => $crate::wayland::seat::Seat);
    };
}
