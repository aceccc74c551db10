use std::fmt;

use crate::coords::{Color, Viewport};
use crate::pipeline::{ResolvedElement, ShaderBlob};

use super::config::DeviceConfig;
use super::error::{DeviceCreationError, PresentError, ResourceCreationError};

/// What a [`ResourceId`] refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Context,
    SwapChain,
    BackBuffer,
    RenderTargetView,
    VertexShader,
    PixelShader,
    InputLayout,
    Buffer,
}

/// Handle to a native object owned by a [`Backend`].
///
/// Handles are plain values. Ownership is tracked by whoever stores the handle
/// (always inside an `Option`), and the object only goes away through
/// [`Backend::release`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    index: u64,
    kind: ResourceKind,
}

impl ResourceId {
    pub(crate) const fn new(index: u64, kind: ResourceKind) -> Self {
        Self { index, kind }
    }

    #[inline]
    pub const fn kind(self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub const fn index(self) -> u64 {
        self.index
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.index)
    }
}

/// The three objects produced together by [`Backend::create_device`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceHandles {
    pub device: ResourceId,
    pub context: ResourceId,
    pub swap_chain: ResourceId,
}

/// Swap-chain properties as actually created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    /// Back buffers besides the front buffer.
    pub buffer_count: u32,
    pub sample_count: u32,
    pub windowed: bool,
}

impl SwapChainDesc {
    pub(crate) fn from_config(config: &DeviceConfig, format: wgpu::TextureFormat) -> Self {
        Self {
            width: config.width,
            height: config.height,
            format,
            buffer_count: 1,
            sample_count: config.sample_count,
            windowed: config.windowed,
        }
    }
}

/// CPU/GPU access pattern of a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferUsage {
    /// CPU writes through `map_discard`, GPU reads.
    DynamicWrite,
    /// GPU only; mapping fails.
    Default,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub byte_width: u64,
    pub usage: BufferUsage,
}

/// Result of a successful [`Backend::present`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The surface could not hand out an image this time (reconfigured, timed
    /// out); nothing became visible but the session is still healthy.
    Skipped,
}

/// Immediate-context GPU API the rendering core is written against.
///
/// Creation calls either return a live handle or fail without leaving
/// anything behind. State-setting calls never fail: the core only passes
/// handles it created, and a backend treats anything else as a no-op.
pub trait Backend {
    /// Native window the swap chain presents into.
    type Window: Clone;

    /// Creates device, immediate context and swap chain as one unit.
    fn create_device(
        &mut self,
        window: Self::Window,
        config: &DeviceConfig,
    ) -> Result<DeviceHandles, DeviceCreationError>;

    fn swap_chain_desc(&self, swap_chain: ResourceId) -> Option<SwapChainDesc>;

    fn set_fullscreen_state(&mut self, swap_chain: ResourceId, fullscreen: bool);

    /// Reallocates the back buffers. Every view derived from them must have
    /// been released beforehand.
    fn resize_buffers(
        &mut self,
        swap_chain: ResourceId,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceCreationError>;

    /// Returns a new reference to back buffer `index`; release it when done.
    fn back_buffer(
        &mut self,
        swap_chain: ResourceId,
        index: u32,
    ) -> Result<ResourceId, ResourceCreationError>;

    fn create_render_target_view(
        &mut self,
        texture: ResourceId,
    ) -> Result<ResourceId, ResourceCreationError>;

    fn create_vertex_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError>;

    fn create_pixel_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError>;

    fn create_input_layout(
        &mut self,
        elements: &[ResolvedElement],
        vertex_shader: &ShaderBlob,
    ) -> Result<ResourceId, ResourceCreationError>;

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ResourceId, ResourceCreationError>;

    /// Maps `buffer` for CPU writes. Previous contents are discarded.
    fn map_discard(
        &mut self,
        context: ResourceId,
        buffer: ResourceId,
    ) -> Result<&mut [u8], ResourceCreationError>;

    fn unmap(&mut self, context: ResourceId, buffer: ResourceId);

    fn set_render_target(&mut self, context: ResourceId, view: ResourceId);

    fn set_viewport(&mut self, context: ResourceId, viewport: &Viewport);

    fn clear_render_target(&mut self, context: ResourceId, view: ResourceId, color: Color);

    fn set_shaders(&mut self, context: ResourceId, vertex: ResourceId, pixel: ResourceId);

    fn set_input_layout(&mut self, context: ResourceId, layout: ResourceId);

    fn set_vertex_buffer(
        &mut self,
        context: ResourceId,
        slot: u32,
        buffer: ResourceId,
        stride: u32,
        offset: u32,
    );

    fn set_primitive_topology(&mut self, context: ResourceId, topology: wgpu::PrimitiveTopology);

    fn draw(&mut self, context: ResourceId, vertex_count: u32, start_vertex: u32);

    /// Makes the back buffer visible. `sync_interval == 0` returns at once,
    /// `n >= 1` waits for vertical blanks.
    fn present(
        &mut self,
        swap_chain: ResourceId,
        sync_interval: u32,
    ) -> Result<PresentOutcome, PresentError>;

    /// Drops the backend's reference to `id`. Returns `false` if `id` was not live.
    fn release(&mut self, id: ResourceId) -> bool;
}
