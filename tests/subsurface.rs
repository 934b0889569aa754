mod common;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use common::{Fixture, Notification, ServerState, TestClient};
use trellis::utils::{Logical, Point};
use trellis::wayland::compositor::{
    add_destruction_hook, get_children, get_parent, get_role, get_subsurface, give_role,
    is_effectively_sync, stacking_order, take_frame_callbacks, SubsurfaceError, SubsurfaceMode,
    SUBSURFACE_ROLE,
};
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_subcompositor::WlSubcompositor, wl_subsurface::WlSubsurface,
    wl_surface::WlSurface,
};
use wayland_server::protocol::wl_surface::WlSurface as ServerSurface;

struct Env {
    fixture: Fixture,
    client: TestClient,
    compositor: WlCompositor,
    subcompositor: WlSubcompositor,
}

impl Env {
    fn new() -> Env {
        let mut fixture = Fixture::new();
        let mut client = fixture.add_client();
        let compositor = client.bind::<WlCompositor>();
        let subcompositor = client.bind::<WlSubcompositor>();
        fixture.roundtrip(&mut client);
        Env {
            fixture,
            client,
            compositor,
            subcompositor,
        }
    }

    fn surface(&mut self) -> (WlSurface, ServerSurface) {
        let surface = self.client.create_surface(&self.compositor);
        self.fixture.roundtrip(&mut self.client);
        let server = self.fixture.server_surface(&self.client, &surface);
        (surface, server)
    }

    fn subsurface(&mut self, surface: &WlSurface, parent: &WlSurface) -> WlSubsurface {
        self.subcompositor
            .get_subsurface(surface, parent, &self.client.qh, ())
    }

    fn roundtrip(&mut self) {
        self.fixture.roundtrip(&mut self.client);
    }

    fn expect_bad_surface(&mut self, interface: &str) {
        let err = self.fixture.roundtrip_expect_error(&mut self.client);
        assert_eq!(err.code, 0, "bad_surface is the first error code of {}", interface);
        assert_eq!(err.object_interface, interface);
    }
}

fn position(x: i32, y: i32) -> Point<i32, Logical> {
    (x, y).into()
}

#[test]
fn new_subsurface_is_placed_on_top() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (a, s_a) = env.surface();
    let (b, s_b) = env.surface();

    let _sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    env.roundtrip();

    assert_eq!(get_children(&s_parent), vec![s_a.clone(), s_b.clone()]);
    assert_eq!(stacking_order(&s_parent), vec![s_parent.clone(), s_a.clone(), s_b.clone()]);
    assert_eq!(get_parent(&s_a), Some(s_parent.clone()));
    assert_eq!(get_role(&s_a), Some(SUBSURFACE_ROLE));
    assert_eq!(get_role(&s_parent), None);
    assert_eq!(
        env.fixture.state.take_notifications(),
        vec![Notification::NewSubsurface(s_a), Notification::NewSubsurface(s_b)]
    );
}

#[test]
fn surface_cannot_be_its_own_parent() {
    let mut env = Env::new();
    let (surface, _) = env.surface();

    let _sub = env.subsurface(&surface, &surface);
    env.expect_bad_surface("wl_subcompositor");
    assert!(env.fixture.state.take_notifications().iter().all(|n| !matches!(n, Notification::NewSubsurface(_))));
}

#[test]
fn surface_with_a_role_is_refused() {
    let mut env = Env::new();
    let (p1, _) = env.surface();
    let (p2, _) = env.surface();
    let (child, s_child) = env.surface();

    let _sub = env.subsurface(&child, &p1);
    env.roundtrip();
    assert!(get_subsurface(&s_child).is_some());

    let _second = env.subsurface(&child, &p2);
    env.expect_bad_surface("wl_subcompositor");
}

#[test]
fn surface_with_another_role_is_refused() {
    let mut env = Env::new();
    let (parent, _) = env.surface();
    let (cursor, s_cursor) = env.surface();

    give_role(&s_cursor, "cursor_image").unwrap();
    let _sub = env.subsurface(&cursor, &parent);
    env.expect_bad_surface("wl_subcompositor");
}

#[test]
fn ancestor_cannot_become_a_child() {
    let mut env = Env::new();
    let (root, _) = env.surface();
    let (child, _) = env.surface();
    let (grandchild, _) = env.surface();

    let _sub = env.subsurface(&child, &root);
    let _sub2 = env.subsurface(&grandchild, &child);
    env.roundtrip();

    let _cycle = env.subsurface(&root, &grandchild);
    env.expect_bad_surface("wl_subcompositor");
}

#[test]
fn position_is_applied_on_commit() {
    let mut env = Env::new();
    let (parent, _) = env.surface();
    let (child, s_child) = env.surface();
    let sub = env.subsurface(&child, &parent);
    env.roundtrip();
    env.fixture.state.take_notifications();

    sub.set_position(10, 20);
    env.roundtrip();
    let handle = get_subsurface(&s_child).unwrap();
    assert_eq!(handle.position(), position(0, 0));
    assert_eq!(handle.pending_position(), Some(position(10, 20)));
    assert!(env.fixture.state.take_notifications().is_empty());

    child.commit();
    env.roundtrip();
    assert_eq!(handle.position(), position(10, 20));
    assert_eq!(handle.pending_position(), None);
    assert_eq!(
        env.fixture.state.take_notifications(),
        vec![Notification::PositionChanged(s_child.clone(), position(10, 20))]
    );

    // nothing pending, nothing changes
    child.commit();
    env.roundtrip();
    assert_eq!(handle.position(), position(10, 20));
    assert!(env.fixture.state.take_notifications().is_empty());
}

#[test]
fn parent_commit_does_not_apply_child_position() {
    let mut env = Env::new();
    let (parent, _) = env.surface();
    let (child, s_child) = env.surface();
    let sub = env.subsurface(&child, &parent);
    sub.set_position(5, 5);
    parent.commit();
    env.roundtrip();

    assert_eq!(get_subsurface(&s_child).unwrap().position(), position(0, 0));
}

#[test]
fn siblings_are_restacked() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (a, s_a) = env.surface();
    let (b, s_b) = env.surface();
    let (c, s_c) = env.surface();
    let sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    let sub_c = env.subsurface(&c, &parent);
    env.roundtrip();

    sub_a.place_above(&c);
    env.roundtrip();
    assert_eq!(
        stacking_order(&s_parent),
        vec![s_parent.clone(), s_b.clone(), s_c.clone(), s_a.clone()]
    );

    sub_c.place_below(&b);
    env.roundtrip();
    assert_eq!(
        stacking_order(&s_parent),
        vec![s_parent.clone(), s_c.clone(), s_b.clone(), s_a.clone()]
    );

    sub_a.place_below(&parent);
    env.roundtrip();
    assert_eq!(
        stacking_order(&s_parent),
        vec![s_a.clone(), s_parent.clone(), s_c.clone(), s_b.clone()]
    );
    assert_eq!(get_children(&s_parent), vec![s_a, s_c, s_b]);
}

#[test]
fn placing_relative_to_itself_fails() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (a, s_a) = env.surface();
    let (b, _) = env.surface();
    let sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    env.roundtrip();

    let before = stacking_order(&s_parent);
    let handle = get_subsurface(&s_a).unwrap();
    assert_eq!(handle.place_above(&s_a), Err(SubsurfaceError::NotASibling));
    assert_eq!(stacking_order(&s_parent), before);

    sub_a.place_above(&a);
    env.expect_bad_surface("wl_subsurface");
}

#[test]
fn placing_relative_to_an_unrelated_surface_fails() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (other_parent, _) = env.surface();
    let (a, s_a) = env.surface();
    let (stranger, s_stranger) = env.surface();
    let sub_a = env.subsurface(&a, &parent);
    let _sub_stranger = env.subsurface(&stranger, &other_parent);
    env.roundtrip();

    let before = stacking_order(&s_parent);
    let handle = get_subsurface(&s_a).unwrap();
    assert_eq!(handle.place_below(&s_stranger), Err(SubsurfaceError::NotASibling));
    assert_eq!(stacking_order(&s_parent), before);

    sub_a.place_above(&stranger);
    env.expect_bad_surface("wl_subsurface");
}

#[test]
fn mode_change_is_notified_once() {
    let mut env = Env::new();
    let (parent, _) = env.surface();
    let (child, s_child) = env.surface();
    let sub = env.subsurface(&child, &parent);
    env.roundtrip();
    env.fixture.state.take_notifications();

    // already synchronized
    sub.set_sync();
    sub.set_desync();
    sub.set_desync();
    env.roundtrip();

    assert_eq!(
        env.fixture.state.take_notifications(),
        vec![Notification::ModeChanged(s_child.clone(), SubsurfaceMode::Desynchronized)]
    );
    assert_eq!(get_subsurface(&s_child).unwrap().mode(), SubsurfaceMode::Desynchronized);
}

#[test]
fn synchronization_is_inherited() {
    let mut env = Env::new();
    let (root, s_root) = env.surface();
    let (child, s_child) = env.surface();
    let (grandchild, s_grandchild) = env.surface();
    let sub_child = env.subsurface(&child, &root);
    let sub_grandchild = env.subsurface(&grandchild, &child);
    env.roundtrip();

    assert!(!is_effectively_sync(&s_root));
    assert!(is_effectively_sync(&s_grandchild));

    sub_grandchild.set_desync();
    env.roundtrip();
    assert!(is_effectively_sync(&s_grandchild));

    sub_child.set_desync();
    env.roundtrip();
    assert!(!is_effectively_sync(&s_child));
    assert!(!is_effectively_sync(&s_grandchild));
}

#[test]
fn destroying_the_role_removes_one_child() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (a, s_a) = env.surface();
    let (b, s_b) = env.surface();
    let sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    env.roundtrip();
    env.fixture.state.take_notifications();

    sub_a.destroy();
    env.roundtrip();

    assert_eq!(get_children(&s_parent), vec![s_b]);
    assert_eq!(get_subsurface(&s_a), None);
    assert_eq!(get_parent(&s_a), None);
    assert_eq!(
        env.fixture.state.take_notifications(),
        vec![Notification::SubsurfaceDestroyed(s_a.clone())]
    );

    // the role stays, so the surface can become a subsurface again
    assert_eq!(get_role(&s_a), Some(SUBSURFACE_ROLE));
    let _again = env.subsurface(&a, &parent);
    env.roundtrip();
    assert_eq!(get_parent(&s_a), Some(s_parent));
}

#[test]
fn destroying_the_parent_orphans_children() {
    let mut env = Env::new();
    let (parent, _) = env.surface();
    let (a, s_a) = env.surface();
    let (b, s_b) = env.surface();
    let sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    env.roundtrip();

    parent.destroy();
    env.roundtrip();

    let handle = get_subsurface(&s_a).unwrap();
    assert_eq!(handle.parent(), None);
    assert_eq!(get_parent(&s_b), None);
    assert_eq!(handle.place_above(&s_b), Err(SubsurfaceError::NoParent));

    // the orphan keeps accepting its double-buffered state
    sub_a.set_position(1, 2);
    a.commit();
    env.roundtrip();
    assert_eq!(handle.position(), position(1, 2));
}

#[test]
fn destroying_the_child_surface_detaches_it() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (a, _) = env.surface();
    let (b, s_b) = env.surface();
    let _sub_a = env.subsurface(&a, &parent);
    let _sub_b = env.subsurface(&b, &parent);
    env.roundtrip();

    a.destroy();
    env.roundtrip();

    assert_eq!(get_children(&s_parent), vec![s_b.clone()]);
    assert_eq!(stacking_order(&s_parent), vec![s_parent, s_b]);
}

#[test]
fn disconnect_destroys_everything_once() {
    let mut env = Env::new();
    let (parent, s_parent) = env.surface();
    let (child, s_child) = env.surface();
    let _sub = env.subsurface(&child, &parent);
    env.roundtrip();
    env.fixture.state.take_notifications();

    let Env {
        mut fixture, client, ..
    } = env;
    drop(client);
    // one pass notices the hangup, the next one is guaranteed to see the cleanup
    fixture.dispatch();
    fixture.dispatch();

    let notifications = fixture.state.take_notifications();
    let destroyed_roles = notifications
        .iter()
        .filter(|n| matches!(n, Notification::SubsurfaceDestroyed(_)))
        .count();
    assert_eq!(destroyed_roles, 1);
    assert!(notifications.contains(&Notification::SubsurfaceDestroyed(s_child.clone())));
    assert!(notifications.contains(&Notification::SurfaceDestroyed(s_parent)));
    assert!(notifications.contains(&Notification::SurfaceDestroyed(s_child)));
    assert!(fixture.state.surfaces.is_empty());
}

#[test]
fn frame_callbacks_are_double_buffered() {
    let mut env = Env::new();
    let (surface, s_surface) = env.surface();

    let _callback = surface.frame(&env.client.qh, Arc::new(AtomicBool::new(false)));
    env.roundtrip();
    assert!(take_frame_callbacks(&s_surface).is_empty());

    surface.commit();
    env.roundtrip();
    assert_eq!(take_frame_callbacks(&s_surface).len(), 1);
    assert!(take_frame_callbacks(&s_surface).is_empty());
}

#[test]
fn destruction_hooks_run_once() {
    let mut env = Env::new();
    let (surface, s_surface) = env.surface();

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    add_destruction_hook::<ServerState, _>(&s_surface, move |_state, _surface| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    surface.destroy();
    env.roundtrip();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
