//! Vertex data living on the GPU.

mod buffer;

pub use buffer::GeometryBuffer;
