use thiserror::Error;

use super::backend::ResourceId;
use crate::pipeline::ShaderStage;

/// Adapter, device or swap-chain construction failed. Fatal at startup.
#[derive(Debug, Error)]
pub enum DeviceCreationError {
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create presentation surface: {0}")]
    Surface(String),

    #[error("no hardware adapter available: {0}")]
    NoAdapter(String),

    #[error("failed to create logical device: {0}")]
    Device(String),

    #[error("failed to create swap chain: {0}")]
    SwapChain(String),

    #[error("{requested}x multisampling is not supported for {format:?}")]
    UnsupportedSampleCount {
        requested: u32,
        format: wgpu::TextureFormat,
    },
}

/// A view, shader object, layout or buffer could not be created. Fatal.
#[derive(Debug, Error)]
pub enum ResourceCreationError {
    #[error("failed to fetch back buffer {index}: {reason}")]
    BackBuffer { index: u32, reason: String },

    #[error("failed to create render target view: {0}")]
    RenderTargetView(String),

    #[error("failed to create {stage} shader object: {reason}")]
    ShaderStage { stage: ShaderStage, reason: String },

    #[error("input element `{semantic}` is declared at byte {declared}, the vertex field is at byte {expected}")]
    LayoutMismatch {
        semantic: String,
        declared: u32,
        expected: u32,
    },

    #[error("input layout spans {declared} bytes per vertex, the vertex stride is {expected}")]
    StrideMismatch { declared: u32, expected: u32 },

    #[error("input layout does not match the vertex shader signature: {0}")]
    SignatureMismatch(String),

    #[error("failed to create input layout: {0}")]
    InputLayout(String),

    #[error("failed to create buffer: {0}")]
    Buffer(String),

    #[error("failed to map {id}: {reason}")]
    Map { id: ResourceId, reason: String },

    #[error("failed to resize swap chain buffers: {0}")]
    ResizeBuffers(String),

    #[error("{0} is not a live resource")]
    InvalidHandle(ResourceId),
}

/// Shader source failed to load, parse, validate or match its target profile.
#[derive(Debug, Error)]
#[error("failed to compile `{entry_point}` ({profile}) from {source_name}:\n{diagnostics}")]
pub struct ShaderCompilationError {
    pub source_name: String,
    pub entry_point: String,
    pub profile: String,
    pub diagnostics: String,
}

/// The device went away underneath the session.
///
/// Everything created from it is unusable; the session has to be torn down
/// and created again.
#[derive(Debug, Clone, Error)]
#[error("graphics device lost: {reason}")]
pub struct DeviceLostError {
    pub reason: String,
}

/// Failure reported by [`Backend::present`](super::Backend::present).
#[derive(Debug, Error)]
pub enum PresentError {
    #[error(transparent)]
    DeviceLost(#[from] DeviceLostError),

    #[error("out of memory while presenting")]
    OutOfMemory,
}

/// An operation was called before the component it depends on exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("`{operation}` requires `{requires}` first")]
    OutOfOrder {
        operation: &'static str,
        requires: &'static str,
    },

    #[error("`{0}` already exists in this session")]
    AlreadyCreated(&'static str),

    #[error("the frame loop has shut down")]
    ShutDown,
}

/// High-level response after a swap-chain acquisition error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Everything the session and frame loop can fail with.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    DeviceCreation(#[from] DeviceCreationError),

    #[error(transparent)]
    ShaderCompilation(#[from] ShaderCompilationError),

    #[error(transparent)]
    ResourceCreation(#[from] ResourceCreationError),

    #[error(transparent)]
    DeviceLost(#[from] DeviceLostError),

    #[error("out of memory while presenting")]
    OutOfMemory,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl RenderError {
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RenderError::DeviceLost(_))
    }
}

impl From<PresentError> for RenderError {
    fn from(err: PresentError) -> Self {
        match err {
            PresentError::DeviceLost(lost) => RenderError::DeviceLost(lost),
            PresentError::OutOfMemory => RenderError::OutOfMemory,
        }
    }
}
