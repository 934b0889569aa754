//! In-process test fixture: a server `Display` and `wayland-client` connections over socket pairs
#![allow(dead_code)]

use std::os::unix::net::UnixStream;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use trellis::backend::input::TabletToolDescriptor;
use trellis::utils::{Logical, Point};
use trellis::wayland::{
    compositor::{CompositorHandler, CompositorState, SubsurfaceHandle, SubsurfaceMode},
    seat::{CursorImageStatus, Seat},
    tablet_manager::{TabletManagerState, TabletSeatHandler},
};
use trellis::{delegate_compositor, delegate_seat, delegate_tablet_manager};

use wayland_client::{
    backend::{protocol::ProtocolError, ObjectId},
    delegate_noop, event_created_child,
    protocol::{
        wl_callback::{self, WlCallback},
        wl_compositor::WlCompositor,
        wl_registry::{self, WlRegistry},
        wl_seat::WlSeat,
        wl_subcompositor::WlSubcompositor,
        wl_subsurface::WlSubsurface,
        wl_surface::WlSurface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::wp::tablet::zv2::client::{
    zwp_tablet_manager_v2::ZwpTabletManagerV2,
    zwp_tablet_seat_v2::{self, ZwpTabletSeatV2},
    zwp_tablet_tool_v2::{self, ZwpTabletToolV2},
    zwp_tablet_v2::{self, ZwpTabletV2},
};
use wayland_server::{
    backend::{ClientData, ClientId},
    protocol::wl_surface::WlSurface as ServerSurface,
    Display, DisplayHandle, Resource,
};

/*
 * Server side
 */

/// Everything the handlers told the compositor, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewSubsurface(ServerSurface),
    PositionChanged(ServerSurface, Point<i32, Logical>),
    ModeChanged(ServerSurface, SubsurfaceMode),
    SubsurfaceDestroyed(ServerSurface),
    SurfaceDestroyed(ServerSurface),
    ToolImage(TabletToolDescriptor, CursorImageStatus),
}

pub struct ServerState {
    pub compositor: CompositorState,
    pub seat: Seat,
    pub tablet_manager: TabletManagerState,
    pub surfaces: Vec<ServerSurface>,
    pub notifications: Vec<Notification>,
}

impl ServerState {
    /// Removes and returns the notifications received so far
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

impl CompositorHandler for ServerState {
    fn new_surface(&mut self, surface: &ServerSurface) {
        self.surfaces.push(surface.clone());
    }

    fn commit(&mut self, _surface: &ServerSurface) {}

    fn destroyed(&mut self, surface: &ServerSurface) {
        self.surfaces.retain(|s| s != surface);
        self.notifications
            .push(Notification::SurfaceDestroyed(surface.clone()));
    }

    fn new_subsurface(&mut self, subsurface: &SubsurfaceHandle) {
        self.notifications
            .push(Notification::NewSubsurface(subsurface.surface().clone()));
    }

    fn subsurface_position_changed(&mut self, subsurface: &SubsurfaceHandle, position: Point<i32, Logical>) {
        self.notifications
            .push(Notification::PositionChanged(subsurface.surface().clone(), position));
    }

    fn subsurface_mode_changed(&mut self, subsurface: &SubsurfaceHandle, mode: SubsurfaceMode) {
        self.notifications
            .push(Notification::ModeChanged(subsurface.surface().clone(), mode));
    }

    fn subsurface_destroyed(&mut self, subsurface: &SubsurfaceHandle) {
        self.notifications
            .push(Notification::SubsurfaceDestroyed(subsurface.surface().clone()));
    }
}

impl TabletSeatHandler for ServerState {
    fn tablet_tool_image(&mut self, tool: &TabletToolDescriptor, image: CursorImageStatus) {
        self.notifications
            .push(Notification::ToolImage(tool.clone(), image));
    }
}

delegate_compositor!(ServerState);
delegate_seat!(ServerState);
delegate_tablet_manager!(ServerState);

struct TestClientData;

impl ClientData for TestClientData {}

pub struct Fixture {
    pub display: Display<ServerState>,
    pub state: ServerState,
}

impl Fixture {
    pub fn new() -> Fixture {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let display = Display::<ServerState>::new().expect("failed to create the display");
        let dh = display.handle();
        let state = ServerState {
            compositor: CompositorState::new::<ServerState>(&dh),
            seat: Seat::new::<ServerState>(&dh, "seat-0"),
            tablet_manager: TabletManagerState::new::<ServerState>(&dh),
            surfaces: Vec::new(),
            notifications: Vec::new(),
        };

        Fixture { display, state }
    }

    pub fn dh(&self) -> DisplayHandle {
        self.display.handle()
    }

    /// Connects a new client and waits for it to know every global
    pub fn add_client(&mut self) -> TestClient {
        let (server, client) = UnixStream::pair().expect("failed to create a socket pair");
        let mut dh = self.display.handle();
        let server_client = dh
            .insert_client(server, Arc::new(TestClientData))
            .expect("failed to insert the client");

        let conn = Connection::from_socket(client).expect("failed to connect");
        let queue = conn.new_event_queue();
        let qh = queue.handle();
        let registry = conn.display().get_registry(&qh, ());

        let mut client = TestClient {
            conn,
            queue,
            qh,
            registry,
            server_id: server_client.id(),
            state: ClientState::default(),
        };
        self.roundtrip(&mut client);
        client
    }

    /// Processes the pending requests of every client
    ///
    /// Clients that disconnected or were killed by a protocol error are cleaned up on the way, so
    /// per-client failures are not reported.
    pub fn dispatch(&mut self) {
        let _ = self.display.dispatch_clients(&mut self.state);
        let _ = self.display.flush_clients();
    }

    fn exchange(&mut self, client: &mut TestClient, done: &AtomicBool) {
        for _ in 0..20 {
            let _ = client.conn.flush();
            self.dispatch();
            if let Some(guard) = client.conn.prepare_read() {
                let _ = guard.read();
            }
            let _ = client.queue.dispatch_pending(&mut client.state);
            if done.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    /// Sends everything the client queued and processes all the answers
    pub fn roundtrip(&mut self, client: &mut TestClient) {
        let done = Arc::new(AtomicBool::new(false));
        client.conn.display().sync(&client.qh, done.clone());
        self.exchange(client, &done);
        if let Some(err) = client.conn.protocol_error() {
            panic!("unexpected protocol error: {:?}", err);
        }
        assert!(done.load(Ordering::SeqCst), "roundtrip did not complete");
    }

    /// Like [`Fixture::roundtrip`], for requests that must kill the client
    pub fn roundtrip_expect_error(&mut self, client: &mut TestClient) -> ProtocolError {
        let done = Arc::new(AtomicBool::new(false));
        client.conn.display().sync(&client.qh, done.clone());
        self.exchange(client, &done);
        client
            .conn
            .protocol_error()
            .expect("the client was not sent a protocol error")
    }

    /// Server side counterpart of a client surface
    pub fn server_surface(&self, client: &TestClient, surface: &WlSurface) -> ServerSurface {
        self.state
            .surfaces
            .iter()
            .find(|s| {
                s.client().map(|c| c.id()) == Some(client.server_id.clone())
                    && s.id().protocol_id() == surface.id().protocol_id()
            })
            .cloned()
            .expect("unknown surface")
    }
}

/*
 * Client side
 */

pub struct TestClient {
    pub conn: Connection,
    pub queue: EventQueue<ClientState>,
    pub qh: QueueHandle<ClientState>,
    pub registry: WlRegistry,
    pub server_id: ClientId,
    pub state: ClientState,
}

impl TestClient {
    /// Binds the global implementing `I`, at the highest common version
    pub fn bind<I>(&self) -> I
    where
        I: Proxy + 'static,
        ClientState: Dispatch<I, ()>,
    {
        let (name, version) = self
            .state
            .globals
            .iter()
            .find(|(_, interface, _)| interface == I::interface().name)
            .map(|(name, _, version)| (*name, *version))
            .unwrap_or_else(|| panic!("no {} global", I::interface().name));
        self.registry
            .bind::<I, _, _>(name, version.min(I::interface().version), &self.qh, ())
    }

    pub fn create_surface(&self, compositor: &WlCompositor) -> WlSurface {
        compositor.create_surface(&self.qh, ())
    }
}

/// Events of a tablet tool that are part of an interaction, as seen by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    ProximityIn { serial: u32, surface: ObjectId },
    ProximityOut,
    Down(u32),
    Up,
    Motion(f64, f64),
    Pressure(u32),
    Distance(u32),
    Tilt(f64, f64),
    Button { button: u32, pressed: bool },
    Frame(u32),
    Removed,
}

#[derive(Debug)]
pub struct ClientTool {
    pub proxy: ZwpTabletToolV2,
    pub tool_type: Option<zwp_tablet_tool_v2::Type>,
    pub capabilities: Vec<zwp_tablet_tool_v2::Capability>,
    pub done: bool,
    pub events: Vec<ToolEvent>,
}

impl ClientTool {
    pub fn proximity_ins(&self) -> Vec<(u32, ObjectId)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ToolEvent::ProximityIn { serial, surface } => Some((*serial, surface.clone())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct ClientTablet {
    pub proxy: ZwpTabletV2,
    pub name: Option<String>,
    pub id: Option<(u32, u32)>,
    pub paths: Vec<String>,
    pub done: bool,
    pub removed: bool,
}

#[derive(Debug, Default)]
pub struct ClientState {
    pub globals: Vec<(u32, String, u32)>,
    pub tablets: Vec<ClientTablet>,
    pub tools: Vec<ClientTool>,
}

impl Dispatch<WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        _registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => state.globals.push((name, interface, version)),
            wl_registry::Event::GlobalRemove { name } => state.globals.retain(|(n, _, _)| *n != name),
            _ => {}
        }
    }
}

impl Dispatch<WlCallback, Arc<AtomicBool>> for ClientState {
    fn event(
        _state: &mut Self,
        _callback: &WlCallback,
        event: wl_callback::Event,
        done: &Arc<AtomicBool>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            done.store(true, Ordering::SeqCst);
        }
    }
}

delegate_noop!(ClientState: WlCompositor);
delegate_noop!(ClientState: WlSubcompositor);
delegate_noop!(ClientState: WlSubsurface);
delegate_noop!(ClientState: ZwpTabletManagerV2);
delegate_noop!(ClientState: ignore WlSurface);
delegate_noop!(ClientState: ignore WlSeat);

impl Dispatch<ZwpTabletSeatV2, ()> for ClientState {
    fn event(
        state: &mut Self,
        _seat: &ZwpTabletSeatV2,
        event: zwp_tablet_seat_v2::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwp_tablet_seat_v2::Event::TabletAdded { id } => state.tablets.push(ClientTablet {
                proxy: id,
                name: None,
                id: None,
                paths: Vec::new(),
                done: false,
                removed: false,
            }),
            zwp_tablet_seat_v2::Event::ToolAdded { id } => state.tools.push(ClientTool {
                proxy: id,
                tool_type: None,
                capabilities: Vec::new(),
                done: false,
                events: Vec::new(),
            }),
            _ => {}
        }
    }

    event_created_child!(ClientState, ZwpTabletSeatV2, [
        zwp_tablet_seat_v2::EVT_TABLET_ADDED_OPCODE => (ZwpTabletV2, ()),
        zwp_tablet_seat_v2::EVT_TOOL_ADDED_OPCODE => (ZwpTabletToolV2, ()),
    ]);
}

impl Dispatch<ZwpTabletV2, ()> for ClientState {
    fn event(
        state: &mut Self,
        proxy: &ZwpTabletV2,
        event: zwp_tablet_v2::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(tablet) = state.tablets.iter_mut().find(|t| &t.proxy == proxy) else {
            return;
        };
        match event {
            zwp_tablet_v2::Event::Name { name } => tablet.name = Some(name),
            zwp_tablet_v2::Event::Id { vid, pid } => tablet.id = Some((vid, pid)),
            zwp_tablet_v2::Event::Path { path } => tablet.paths.push(path),
            zwp_tablet_v2::Event::Done => tablet.done = true,
            zwp_tablet_v2::Event::Removed => tablet.removed = true,
            _ => {}
        }
    }
}

impl Dispatch<ZwpTabletToolV2, ()> for ClientState {
    fn event(
        state: &mut Self,
        proxy: &ZwpTabletToolV2,
        event: zwp_tablet_tool_v2::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(tool) = state.tools.iter_mut().find(|t| &t.proxy == proxy) else {
            return;
        };
        let recorded = match event {
            zwp_tablet_tool_v2::Event::Type { tool_type } => {
                if let WEnum::Value(tool_type) = tool_type {
                    tool.tool_type = Some(tool_type);
                }
                None
            }
            zwp_tablet_tool_v2::Event::Capability { capability } => {
                if let WEnum::Value(capability) = capability {
                    tool.capabilities.push(capability);
                }
                None
            }
            zwp_tablet_tool_v2::Event::Done => {
                tool.done = true;
                None
            }
            zwp_tablet_tool_v2::Event::ProximityIn { serial, surface, .. } => Some(ToolEvent::ProximityIn {
                serial,
                surface: surface.id(),
            }),
            zwp_tablet_tool_v2::Event::ProximityOut => Some(ToolEvent::ProximityOut),
            zwp_tablet_tool_v2::Event::Down { serial } => Some(ToolEvent::Down(serial)),
            zwp_tablet_tool_v2::Event::Up => Some(ToolEvent::Up),
            zwp_tablet_tool_v2::Event::Motion { x, y } => Some(ToolEvent::Motion(x, y)),
            zwp_tablet_tool_v2::Event::Pressure { pressure } => Some(ToolEvent::Pressure(pressure)),
            zwp_tablet_tool_v2::Event::Distance { distance } => Some(ToolEvent::Distance(distance)),
            zwp_tablet_tool_v2::Event::Tilt { tilt_x, tilt_y } => Some(ToolEvent::Tilt(tilt_x, tilt_y)),
            zwp_tablet_tool_v2::Event::Button { button, state, .. } => Some(ToolEvent::Button {
                button,
                pressed: state == WEnum::Value(zwp_tablet_tool_v2::ButtonState::Pressed),
            }),
            zwp_tablet_tool_v2::Event::Frame { time } => Some(ToolEvent::Frame(time)),
            zwp_tablet_tool_v2::Event::Removed => Some(ToolEvent::Removed),
            _ => None,
        };
        if let Some(event) = recorded {
            tool.events.push(event);
        }
    }
}
