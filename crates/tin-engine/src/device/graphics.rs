use super::backend::{Backend, ResourceId};
use super::config::DeviceConfig;
use super::error::DeviceCreationError;
use super::presentation::PresentationSurface;

/// Logical device plus its immediate context.
#[derive(Debug)]
pub struct GraphicsDevice {
    device: Option<ResourceId>,
    context: Option<ResourceId>,
}

impl GraphicsDevice {
    /// Creates device, immediate context and swap chain for `window`.
    ///
    /// Either all three exist afterwards or none do.
    pub fn create<B: Backend>(
        backend: &mut B,
        window: B::Window,
        config: &DeviceConfig,
    ) -> Result<(Self, PresentationSurface), DeviceCreationError> {
        config.validate()?;
        let handles = backend.create_device(window, config)?;

        let Some(desc) = backend.swap_chain_desc(handles.swap_chain) else {
            for id in [handles.swap_chain, handles.context, handles.device] {
                backend.release(id);
            }
            return Err(DeviceCreationError::SwapChain(
                "backend lost track of the swap chain it just created".into(),
            ));
        };

        log::info!(
            "graphics device {} ready: {}x{} {:?}, {}x MSAA, {}",
            handles.device,
            desc.width,
            desc.height,
            desc.format,
            desc.sample_count,
            if desc.windowed { "windowed" } else { "full-screen" }
        );

        Ok((
            Self {
                device: Some(handles.device),
                context: Some(handles.context),
            },
            PresentationSurface::new(handles.swap_chain, desc),
        ))
    }

    pub fn device(&self) -> Option<ResourceId> {
        self.device
    }

    pub fn context(&self) -> Option<ResourceId> {
        self.context
    }

    /// Releases the context, then the device. Safe to call repeatedly.
    pub fn release<B: Backend>(&mut self, backend: &mut B) {
        if let Some(context) = self.context.take() {
            backend.release(context);
        }
        if let Some(device) = self.device.take() {
            backend.release(device);
        }
    }
}
