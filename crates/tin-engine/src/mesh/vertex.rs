use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use crate::coords::Color;

/// Position plus color, laid out as 7 packed `f32`s.
///
/// The input layout built by the pipeline is checked against [`Vertex::LAYOUT`],
/// so any change to this struct must keep the constants below in sync.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Clip-space position.
    pub position: [f32; 3],
    pub color: Color,
}

/// Byte layout of a vertex type as seen by the input assembler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    /// Offset of each attribute, in declaration order.
    pub offsets: &'static [u32],
}

impl Vertex {
    pub const POSITION_OFFSET: u32 = offset_of!(Vertex, position) as u32;
    pub const COLOR_OFFSET: u32 = offset_of!(Vertex, color) as u32;
    pub const STRIDE: u32 = size_of::<Vertex>() as u32;

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: Self::STRIDE,
        offsets: &[Self::POSITION_OFFSET, Self::COLOR_OFFSET],
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, color: Color) -> Self {
        Self {
            position: [x, y, z],
            color,
        }
    }
}

const _: () = {
    assert!(Vertex::POSITION_OFFSET == 0);
    assert!(Vertex::COLOR_OFFSET == 12);
    assert!(Vertex::STRIDE == 28);
};
