use crate::coords::Viewport;

use super::backend::{Backend, PresentOutcome, ResourceId, SwapChainDesc};
use super::error::{LifecycleError, RenderError};

/// Swap chain and the render-target view over its back buffer.
#[derive(Debug)]
pub struct PresentationSurface {
    swap_chain: Option<ResourceId>,
    render_target: Option<ResourceId>,
    desc: SwapChainDesc,
}

impl PresentationSurface {
    pub(crate) fn new(swap_chain: ResourceId, desc: SwapChainDesc) -> Self {
        Self {
            swap_chain: Some(swap_chain),
            render_target: None,
            desc,
        }
    }

    pub fn desc(&self) -> &SwapChainDesc {
        &self.desc
    }

    pub fn swap_chain(&self) -> Option<ResourceId> {
        self.swap_chain
    }

    pub fn render_target(&self) -> Option<ResourceId> {
        self.render_target
    }

    /// Makes back buffer 0 the render target of `context`.
    ///
    /// The view is created on first use and reused afterwards. The temporary
    /// back-buffer reference is released whether or not the view could be
    /// created.
    pub fn bind_render_target<B: Backend>(
        &mut self,
        backend: &mut B,
        context: ResourceId,
    ) -> Result<ResourceId, RenderError> {
        if let Some(view) = self.render_target {
            backend.set_render_target(context, view);
            return Ok(view);
        }
        let swap_chain = self.swap_chain.ok_or(LifecycleError::OutOfOrder {
            operation: "bind_render_target",
            requires: "create_device",
        })?;

        let back_buffer = backend.back_buffer(swap_chain, 0)?;
        let view = backend.create_render_target_view(back_buffer);
        backend.release(back_buffer);
        let view = view?;

        backend.set_render_target(context, view);
        self.render_target = Some(view);
        log::debug!("render target {view} bound");
        Ok(view)
    }

    /// Sets a viewport covering the whole back buffer.
    pub fn set_viewport<B: Backend>(
        &self,
        backend: &mut B,
        context: ResourceId,
    ) -> Result<Viewport, LifecycleError> {
        if self.render_target.is_none() {
            return Err(LifecycleError::OutOfOrder {
                operation: "set_viewport",
                requires: "bind_render_target",
            });
        }
        let viewport = Viewport::full(self.desc.width, self.desc.height);
        backend.set_viewport(context, &viewport);
        Ok(viewport)
    }

    /// Shows the back buffer. See [`Backend::present`] for `sync_interval`.
    pub fn present<B: Backend>(
        &self,
        backend: &mut B,
        sync_interval: u32,
    ) -> Result<PresentOutcome, RenderError> {
        let swap_chain = self.swap_chain.ok_or(LifecycleError::OutOfOrder {
            operation: "present",
            requires: "create_device",
        })?;
        Ok(backend.present(swap_chain, sync_interval)?)
    }

    /// Reallocates the back buffer at the new size and binds a fresh view.
    ///
    /// If the buffers cannot be resized the old ones stay in use and the
    /// view over them is bound again before the error is returned.
    pub fn resize<B: Backend>(
        &mut self,
        backend: &mut B,
        context: ResourceId,
        width: u32,
        height: u32,
    ) -> Result<ResourceId, RenderError> {
        let swap_chain = self.swap_chain.ok_or(LifecycleError::OutOfOrder {
            operation: "resize",
            requires: "create_device",
        })?;
        if let Some(view) = self.render_target.take() {
            backend.release(view);
        }
        if let Err(err) = backend.resize_buffers(swap_chain, width, height) {
            if let Err(rebind) = self.bind_render_target(backend, context) {
                log::error!("failed to rebind the render target after a failed resize: {rebind}");
            }
            return Err(err.into());
        }
        if let Some(desc) = backend.swap_chain_desc(swap_chain) {
            self.desc = desc;
        }
        log::info!("swap chain resized to {width}x{height}");
        self.bind_render_target(backend, context)
    }

    /// Leaves full-screen, then releases the view and the swap chain.
    pub fn release<B: Backend>(&mut self, backend: &mut B) {
        if let Some(swap_chain) = self.swap_chain {
            // a full-screen swap chain must not be destroyed
            backend.set_fullscreen_state(swap_chain, false);
        }
        if let Some(view) = self.render_target.take() {
            backend.release(view);
        }
        if let Some(swap_chain) = self.swap_chain.take() {
            backend.release(swap_chain);
        }
    }
}
