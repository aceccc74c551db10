use crate::device::{Backend, RenderError, ResourceCreationError, ResourceId};
use crate::mesh::VertexLayout;

use super::layout::{check_signature, check_vertex_layout, resolve_elements, InputElement};
use super::shader::{compile, ShaderBlob, ShaderProfile, ShaderSource, ShaderStage};
use super::shader::{PIXEL_ENTRY, VERTEX_ENTRY};

/// Vertex shader, pixel shader and input layout of the session.
///
/// Compiled blobs only live for the duration of [`PipelineState::build`].
#[derive(Debug, Default)]
pub struct PipelineState {
    vertex_shader: Option<ResourceId>,
    pixel_shader: Option<ResourceId>,
    input_layout: Option<ResourceId>,
}

impl PipelineState {
    /// Compiles both entry points of `source`, creates the shader objects and
    /// an input layout for `elements`.
    ///
    /// On failure everything created so far is released again.
    pub fn build<B: Backend>(
        backend: &mut B,
        source: &ShaderSource,
        elements: &[InputElement],
        layout: &VertexLayout,
    ) -> Result<Self, RenderError> {
        let mut state = Self::default();
        match state.build_into(backend, source, elements, layout) {
            Ok(()) => Ok(state),
            Err(err) => {
                state.release(backend);
                Err(err)
            }
        }
    }

    fn build_into<B: Backend>(
        &mut self,
        backend: &mut B,
        source: &ShaderSource,
        elements: &[InputElement],
        layout: &VertexLayout,
    ) -> Result<(), RenderError> {
        let (vertex_shader, vertex_blob) =
            Self::compile_stage(backend, source, VERTEX_ENTRY, ShaderProfile::VS_4_0)?;
        self.vertex_shader = Some(vertex_shader);

        let (pixel_shader, _) =
            Self::compile_stage(backend, source, PIXEL_ENTRY, ShaderProfile::PS_4_0)?;
        self.pixel_shader = Some(pixel_shader);

        self.input_layout = Some(Self::build_input_layout(
            backend,
            elements,
            layout,
            &vertex_blob,
        )?);

        log::info!(
            "pipeline built from {}: {} input elements, stride {}",
            source.name(),
            elements.len(),
            layout.stride
        );
        Ok(())
    }

    /// Compiles one entry point and creates the matching shader object.
    pub fn compile_stage<B: Backend>(
        backend: &mut B,
        source: &ShaderSource,
        entry_point: &str,
        profile: ShaderProfile,
    ) -> Result<(ResourceId, ShaderBlob), RenderError> {
        let blob = compile(source, entry_point, profile)?;
        let id = match blob.stage() {
            ShaderStage::Vertex => backend.create_vertex_shader(&blob)?,
            ShaderStage::Pixel => backend.create_pixel_shader(&blob)?,
        };
        Ok((id, blob))
    }

    /// Validates `elements` against the vertex type and the shader signature,
    /// then creates the layout object.
    pub fn build_input_layout<B: Backend>(
        backend: &mut B,
        elements: &[InputElement],
        layout: &VertexLayout,
        vertex_shader: &ShaderBlob,
    ) -> Result<ResourceId, ResourceCreationError> {
        let resolved = resolve_elements(elements)?;
        check_vertex_layout(&resolved, layout)?;
        check_signature(&resolved, vertex_shader)?;
        backend.create_input_layout(&resolved, vertex_shader)
    }

    /// Makes both stages and the input layout current on `context`.
    ///
    /// No-op on an incomplete state.
    pub fn bind_stages<B: Backend>(&self, backend: &mut B, context: ResourceId) {
        if let (Some(vs), Some(ps), Some(layout)) =
            (self.vertex_shader, self.pixel_shader, self.input_layout)
        {
            backend.set_shaders(context, vs, ps);
            backend.set_input_layout(context, layout);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.vertex_shader.is_some() && self.pixel_shader.is_some() && self.input_layout.is_some()
    }

    pub fn vertex_shader(&self) -> Option<ResourceId> {
        self.vertex_shader
    }

    pub fn pixel_shader(&self) -> Option<ResourceId> {
        self.pixel_shader
    }

    pub fn input_layout(&self) -> Option<ResourceId> {
        self.input_layout
    }

    /// Releases layout, pixel shader, vertex shader. Safe to call repeatedly.
    pub fn release<B: Backend>(&mut self, backend: &mut B) {
        for id in [
            self.input_layout.take(),
            self.pixel_shader.take(),
            self.vertex_shader.take(),
        ]
        .into_iter()
        .flatten()
        {
            backend.release(id);
        }
    }
}
