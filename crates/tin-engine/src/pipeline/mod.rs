//! Shader compilation, input layouts and the pipeline state built from them.

mod layout;
mod shader;
mod state;

pub use layout::{
    check_signature, check_vertex_layout, resolve_elements, ElementOffset, InputClassification,
    InputElement, ResolvedElement, VERTEX_ELEMENTS,
};
pub use shader::{
    compile, ScalarKind, ShaderBlob, ShaderInput, ShaderProfile, ShaderSource, ShaderStage,
    DEFAULT_SHADER, PIXEL_ENTRY, VERTEX_ENTRY,
};
pub use state::PipelineState;
