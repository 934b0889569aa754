use wayland_server::{
    backend::ClientId,
    protocol::{
        wl_callback::WlCallback,
        wl_compositor::{self, WlCompositor},
        wl_region::{self, WlRegion},
        wl_subcompositor::{self, WlSubcompositor},
        wl_subsurface::{self, WlSubsurface},
        wl_surface::{self, WlSurface},
    },
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use tracing::{debug, trace};

use super::{
    add_post_commit_hook, get_subsurface, is_in_ancestry,
    subsurface::{SubsurfaceError, SubsurfaceHandle, SubsurfaceMode},
    tree::PrivateSurfaceData,
    CompositorHandler, CompositorState, SubsurfaceUserData, SurfaceUserData,
};

/*
 * wl_compositor
 */

impl<D> GlobalDispatch<WlCompositor, (), D> for CompositorState
where
    D: GlobalDispatch<WlCompositor, ()>,
    D: Dispatch<WlCompositor, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<WlCompositor, (), D> for CompositorState
where
    D: Dispatch<WlCompositor, ()>,
    D: Dispatch<WlSurface, SurfaceUserData>,
    D: Dispatch<WlRegion, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let surface = data_init.init(id, SurfaceUserData::default());
                trace!(surface = ?surface.id(), "Creating a new wl_surface");
                state.new_surface(&surface);
            }
            wl_compositor::Request::CreateRegion { id } => {
                let region = data_init.init(id, ());
                trace!(region = ?region.id(), "Creating a new wl_region");
            }
            _ => unreachable!(),
        }
    }
}

/*
 * wl_surface
 */

impl<D> Dispatch<WlSurface, SurfaceUserData, D> for CompositorState
where
    D: Dispatch<WlSurface, SurfaceUserData>,
    D: Dispatch<WlCallback, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        surface: &WlSurface,
        request: wl_surface::Request,
        _data: &SurfaceUserData,
        handle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                PrivateSurfaceData::add_frame_callback(surface, callback);
            }
            wl_surface::Request::Commit => {
                trace!(surface = ?surface.id(), "Committing surface");
                PrivateSurfaceData::commit(surface);
                PrivateSurfaceData::invoke_post_commit_hooks(state, handle, surface);
                state.commit(surface);
            }
            wl_surface::Request::Destroy => {
                // handled by the destructor
            }
            // buffer, damage, regions and scale are drawing state, which is not tracked here
            _ => {}
        }
    }

    fn destroyed(state: &mut D, _client_id: ClientId, surface: &WlSurface, data: &SurfaceUserData) {
        trace!(surface = ?surface.id(), "Destroying wl_surface");
        PrivateSurfaceData::cleanup(state, data, surface);
        state.destroyed(surface);
    }
}

/*
 * wl_region
 */

impl<D> Dispatch<WlRegion, (), D> for CompositorState
where
    D: Dispatch<WlRegion, ()>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _region: &WlRegion,
        request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_region::Request::Add { .. } | wl_region::Request::Subtract { .. } => {}
            wl_region::Request::Destroy => {}
            _ => unreachable!(),
        }
    }
}

/*
 * wl_callback
 */

impl<D> Dispatch<WlCallback, (), D> for CompositorState
where
    D: Dispatch<WlCallback, ()>,
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &WlCallback,
        _request: <WlCallback as Resource>::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
    }
}

/*
 * wl_subcompositor
 */

impl<D> GlobalDispatch<WlSubcompositor, (), D> for CompositorState
where
    D: GlobalDispatch<WlSubcompositor, ()>,
    D: Dispatch<WlSubcompositor, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlSubcompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

/// Checks that `surface` can become a child of `parent`
fn validate_subsurface(surface: &WlSurface, parent: &WlSurface) -> Result<(), SubsurfaceError> {
    if surface.data::<SurfaceUserData>().is_none() || parent.data::<SurfaceUserData>().is_none() {
        return Err(SubsurfaceError::UnknownSurface);
    }
    if surface == parent {
        return Err(SubsurfaceError::SelfParent);
    }
    if is_in_ancestry(parent, surface) {
        return Err(SubsurfaceError::Cycle);
    }
    Ok(())
}

impl<D> Dispatch<WlSubcompositor, (), D> for CompositorState
where
    D: Dispatch<WlSubcompositor, ()>,
    D: Dispatch<WlSubsurface, SubsurfaceUserData>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        subcompositor: &WlSubcompositor,
        request: wl_subcompositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_subcompositor::Request::GetSubsurface { id, surface, parent } => {
                let handle = SubsurfaceHandle::new(surface.clone(), &parent);
                let attached = validate_subsurface(&surface, &parent)
                    .and_then(|()| PrivateSurfaceData::attach_subsurface(&surface, &handle));
                if let Err(err) = attached {
                    debug!(
                        surface = ?surface.id(),
                        parent = ?parent.id(),
                        "Refusing subsurface: {}", err
                    );
                    subcompositor.post_error(wl_subcompositor::Error::BadSurface, err.to_string());
                    return;
                }

                PrivateSurfaceData::push_child(&parent, &handle);
                let resource = data_init.init(id, SubsurfaceUserData { handle: handle.clone() });
                handle.bind_resource(&resource);

                let hook = add_post_commit_hook::<D, _>(&surface, |state, _dh, surface| {
                    let Some(subsurface) = get_subsurface(surface) else {
                        return;
                    };
                    if let Some(position) = subsurface.commit() {
                        trace!(surface = ?surface.id(), ?position, "Subsurface moved");
                        state.subsurface_position_changed(&subsurface, position);
                    }
                });
                if let Some(hook) = hook {
                    handle.set_commit_hook(hook);
                }

                trace!(surface = ?surface.id(), parent = ?parent.id(), "Created subsurface");
                state.new_subsurface(&handle);
            }
            wl_subcompositor::Request::Destroy => {}
            _ => unreachable!(),
        }
    }
}

/*
 * wl_subsurface
 */

impl<D> Dispatch<WlSubsurface, SubsurfaceUserData, D> for CompositorState
where
    D: Dispatch<WlSubsurface, SubsurfaceUserData>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        subsurface: &WlSubsurface,
        request: wl_subsurface::Request,
        data: &SubsurfaceUserData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let handle = &data.handle;
        match request {
            wl_subsurface::Request::SetPosition { x, y } => {
                handle.set_position((x, y).into());
            }
            wl_subsurface::Request::PlaceAbove { sibling } => {
                if let Err(err) = handle.place_above(&sibling) {
                    debug!(subsurface = ?subsurface.id(), sibling = ?sibling.id(), "Refusing place_above: {}", err);
                    subsurface.post_error(wl_subsurface::Error::BadSurface, err.to_string());
                }
            }
            wl_subsurface::Request::PlaceBelow { sibling } => {
                if let Err(err) = handle.place_below(&sibling) {
                    debug!(subsurface = ?subsurface.id(), sibling = ?sibling.id(), "Refusing place_below: {}", err);
                    subsurface.post_error(wl_subsurface::Error::BadSurface, err.to_string());
                }
            }
            wl_subsurface::Request::SetSync => {
                if handle.set_mode(SubsurfaceMode::Synchronized) {
                    state.subsurface_mode_changed(handle, SubsurfaceMode::Synchronized);
                }
            }
            wl_subsurface::Request::SetDesync => {
                if handle.set_mode(SubsurfaceMode::Desynchronized) {
                    state.subsurface_mode_changed(handle, SubsurfaceMode::Desynchronized);
                }
            }
            wl_subsurface::Request::Destroy => {
                // handled by the destructor
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut D, _client_id: ClientId, subsurface: &WlSubsurface, data: &SubsurfaceUserData) {
        if data.handle.destroy() {
            trace!(subsurface = ?subsurface.id(), "Destroyed subsurface");
            state.subsurface_destroyed(&data.handle);
        }
    }
}
