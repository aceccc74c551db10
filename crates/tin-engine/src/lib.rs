//! Tin engine crate.
//!
//! A minimal real-time rendering bootstrap: device and swap-chain creation,
//! render-target binding, a compiled shader pipeline, a vertex buffer and a
//! frame loop that clears, draws and presents once per tick.
//!
//! Everything below [`window`] talks to the GPU through
//! [`device::Backend`], so the full lifecycle also runs on
//! [`device::HeadlessBackend`] without a display.

pub mod coords;
pub mod core;
pub mod device;
pub mod geometry;
pub mod logging;
pub mod mesh;
pub mod pipeline;
pub mod time;
pub mod window;
