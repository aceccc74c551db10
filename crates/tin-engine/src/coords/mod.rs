//! Plain value types shared by the device layer and the mesh.
//!
//! Viewports are expressed in physical pixels of the render target; vertex
//! positions live in clip space, so no logical-pixel conversion happens here.

mod color;
mod viewport;

pub use color::Color;
pub use viewport::Viewport;
