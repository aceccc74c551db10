//! winit window host.
//!
//! Owns the `winit` EventLoop and Window and feeds their events to a
//! [`FrameLoop`](crate::core::FrameLoop) running on [`WgpuBackend`](crate::device::WgpuBackend).

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
