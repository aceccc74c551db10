//! GPU device, swap chain and the backend seam beneath them.
//!
//! The rendering core talks to a [`Backend`]: [`WgpuBackend`] drives a real
//! window through wgpu, [`HeadlessBackend`] records calls for tests.

mod backend;
mod config;
mod context;
mod error;
mod gpu;
mod graphics;
mod headless;
mod presentation;
mod resources;
mod surface;

pub use backend::{
    Backend, BufferDesc, BufferUsage, DeviceHandles, PresentOutcome, ResourceId, ResourceKind,
    SwapChainDesc,
};
pub use config::DeviceConfig;
pub use error::{
    DeviceCreationError, DeviceLostError, LifecycleError, PresentError, RenderError,
    ResourceCreationError, ShaderCompilationError, SurfaceErrorAction,
};
pub use gpu::WgpuBackend;
pub use graphics::GraphicsDevice;
pub use headless::{Command, DrawCall, FailPoint, HeadlessBackend, HeadlessWindow, VsyncClock};
pub use presentation::PresentationSurface;
