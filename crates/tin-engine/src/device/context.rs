use crate::coords::{Color, Viewport};

use super::backend::ResourceId;

/// Vertex buffer bound to slot 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct VertexBinding {
    pub buffer: ResourceId,
    pub stride: u32,
    pub offset: u32,
}

/// Identifies one compiled render pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub vertex_shader: ResourceId,
    pub pixel_shader: ResourceId,
    pub input_layout: ResourceId,
    pub topology: wgpu::PrimitiveTopology,
    pub stride: u32,
}

impl PipelineKey {
    pub fn references(&self, id: ResourceId) -> bool {
        self.vertex_shader == id || self.pixel_shader == id || self.input_layout == id
    }
}

/// State bound on the immediate context, translated into render passes at
/// draw time.
#[derive(Default)]
pub(crate) struct ImmediateContext {
    pub render_target: Option<ResourceId>,
    pub viewport: Option<Viewport>,
    pub shaders: Option<(ResourceId, ResourceId)>,
    pub input_layout: Option<ResourceId>,
    pub vertex_buffer: Option<VertexBinding>,
    pub topology: Option<wgpu::PrimitiveTopology>,
    /// Applied as the load op of the next pass on that view.
    pub pending_clear: Option<(ResourceId, Color)>,
    /// Commands recorded since the last present.
    pub encoder: Option<wgpu::CommandEncoder>,
}

impl ImmediateContext {
    pub fn pipeline_key(&self) -> Option<PipelineKey> {
        let (vertex_shader, pixel_shader) = self.shaders?;
        Some(PipelineKey {
            vertex_shader,
            pixel_shader,
            input_layout: self.input_layout?,
            topology: self.topology?,
            stride: self.vertex_buffer?.stride,
        })
    }

    /// Unbinds `id` wherever it is bound.
    pub fn forget(&mut self, id: ResourceId) {
        if self.render_target == Some(id) {
            self.render_target = None;
        }
        if self.pending_clear.is_some_and(|(view, _)| view == id) {
            self.pending_clear = None;
        }
        if self.shaders.is_some_and(|(vs, ps)| vs == id || ps == id) {
            self.shaders = None;
        }
        if self.input_layout == Some(id) {
            self.input_layout = None;
        }
        if self.vertex_buffer.is_some_and(|b| b.buffer == id) {
            self.vertex_buffer = None;
        }
    }
}
