use crate::device::ResourceCreationError;
use crate::mesh::VertexLayout;

use super::shader::{ScalarKind, ShaderBlob};

/// Byte offset of an element inside its vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementOffset {
    Explicit(u32),
    /// Directly after the previous element of the same slot.
    AppendAligned,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputClassification {
    PerVertex,
    /// Only a step rate of 1 can be expressed.
    PerInstance { step_rate: u32 },
}

/// One attribute of the vertex stream as declared by the application.
///
/// The n-th element feeds shader `@location(n)`; `semantic` names it in
/// diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: &'static str,
    pub semantic_index: u32,
    pub format: wgpu::VertexFormat,
    pub input_slot: u32,
    pub offset: ElementOffset,
    pub classification: InputClassification,
}

/// An [`InputElement`] with its offset and shader location worked out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub semantic: &'static str,
    pub semantic_index: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u32,
    pub shader_location: u32,
    pub step_mode: wgpu::VertexStepMode,
}

/// Layout of [`Vertex`](crate::mesh::Vertex): float3 position, then float4 color.
pub const VERTEX_ELEMENTS: [InputElement; 2] = [
    InputElement {
        semantic: "POSITION",
        semantic_index: 0,
        format: wgpu::VertexFormat::Float32x3,
        input_slot: 0,
        offset: ElementOffset::Explicit(0),
        classification: InputClassification::PerVertex,
    },
    InputElement {
        semantic: "COLOR",
        semantic_index: 0,
        format: wgpu::VertexFormat::Float32x4,
        input_slot: 0,
        offset: ElementOffset::AppendAligned,
        classification: InputClassification::PerVertex,
    },
];

/// Assigns offsets and shader locations.
///
/// A single vertex buffer is bound, so every element must use slot 0 and
/// share one step mode.
pub fn resolve_elements(
    elements: &[InputElement],
) -> Result<Vec<ResolvedElement>, ResourceCreationError> {
    let mut resolved = Vec::with_capacity(elements.len());
    let mut cursor = 0u32;
    let mut step_mode = None;

    for (location, element) in (0u32..).zip(elements) {
        if element.input_slot != 0 {
            return Err(ResourceCreationError::InputLayout(format!(
                "`{}` uses input slot {}, only slot 0 is bound",
                element.semantic, element.input_slot
            )));
        }

        let mode = match element.classification {
            InputClassification::PerVertex => wgpu::VertexStepMode::Vertex,
            InputClassification::PerInstance { step_rate: 1 } => wgpu::VertexStepMode::Instance,
            InputClassification::PerInstance { step_rate } => {
                return Err(ResourceCreationError::InputLayout(format!(
                    "`{}` steps every {step_rate} instances, only 1 is supported",
                    element.semantic
                )));
            }
        };
        if *step_mode.get_or_insert(mode) != mode {
            return Err(ResourceCreationError::InputLayout(format!(
                "`{}` mixes per-vertex and per-instance data in one slot",
                element.semantic
            )));
        }

        let out_of_range = || {
            ResourceCreationError::InputLayout(format!(
                "`{}` ends past the largest addressable vertex offset",
                element.semantic
            ))
        };
        let offset = match element.offset {
            ElementOffset::Explicit(offset) => offset,
            // all supported formats are 4-byte multiples
            ElementOffset::AppendAligned => {
                cursor.checked_next_multiple_of(4).ok_or_else(out_of_range)?
            }
        };
        cursor = u32::try_from(element.format.size())
            .ok()
            .and_then(|size| offset.checked_add(size))
            .ok_or_else(out_of_range)?;

        resolved.push(ResolvedElement {
            semantic: element.semantic,
            semantic_index: element.semantic_index,
            format: element.format,
            offset,
            shader_location: location,
            step_mode: mode,
        });
    }

    Ok(resolved)
}

/// Checks resolved offsets against the Rust vertex type they describe.
pub fn check_vertex_layout(
    resolved: &[ResolvedElement],
    layout: &VertexLayout,
) -> Result<(), ResourceCreationError> {
    if resolved.len() != layout.offsets.len() {
        return Err(ResourceCreationError::InputLayout(format!(
            "{} elements declared for a vertex with {} fields",
            resolved.len(),
            layout.offsets.len()
        )));
    }

    for (element, &expected) in resolved.iter().zip(layout.offsets) {
        if element.offset != expected {
            return Err(ResourceCreationError::LayoutMismatch {
                semantic: element.semantic.to_owned(),
                declared: element.offset,
                expected,
            });
        }
    }

    let declared = resolved
        .iter()
        .map(|e| e.offset + e.format.size() as u32)
        .max()
        .unwrap_or(0);
    if declared != layout.stride {
        return Err(ResourceCreationError::StrideMismatch {
            declared,
            expected: layout.stride,
        });
    }

    Ok(())
}

/// Every input of the vertex shader must be fed by an element of matching
/// type and width. Extra elements are allowed.
pub fn check_signature(
    resolved: &[ResolvedElement],
    vertex_shader: &ShaderBlob,
) -> Result<(), ResourceCreationError> {
    for input in vertex_shader.inputs() {
        let Some(element) = resolved.iter().find(|e| e.shader_location == input.location) else {
            return Err(ResourceCreationError::SignatureMismatch(format!(
                "`{}` reads @location({}) but no element feeds it",
                vertex_shader.entry_point(),
                input.location
            )));
        };

        let Some((kind, components)) = format_shape(element.format) else {
            return Err(ResourceCreationError::SignatureMismatch(format!(
                "`{}` uses unsupported format {:?}",
                element.semantic, element.format
            )));
        };

        if kind != input.kind || components != input.components {
            return Err(ResourceCreationError::SignatureMismatch(format!(
                "`{}` provides {components} x {kind:?} at @location({}), `{}` expects {} x {:?}",
                element.semantic,
                input.location,
                vertex_shader.entry_point(),
                input.components,
                input.kind
            )));
        }
    }
    Ok(())
}

fn format_shape(format: wgpu::VertexFormat) -> Option<(ScalarKind, u8)> {
    use wgpu::VertexFormat as F;
    Some(match format {
        F::Float32 => (ScalarKind::Float, 1),
        F::Float32x2 => (ScalarKind::Float, 2),
        F::Float32x3 => (ScalarKind::Float, 3),
        F::Float32x4 => (ScalarKind::Float, 4),
        F::Unorm8x4 | F::Snorm8x4 => (ScalarKind::Float, 4),
        F::Uint32 => (ScalarKind::Uint, 1),
        F::Uint32x2 => (ScalarKind::Uint, 2),
        F::Uint32x3 => (ScalarKind::Uint, 3),
        F::Uint32x4 => (ScalarKind::Uint, 4),
        F::Sint32 => (ScalarKind::Sint, 1),
        F::Sint32x2 => (ScalarKind::Sint, 2),
        F::Sint32x3 => (ScalarKind::Sint, 3),
        F::Sint32x4 => (ScalarKind::Sint, 4),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Vertex;
    use crate::pipeline::{compile, ShaderProfile, DEFAULT_SHADER, VERTEX_ENTRY};

    fn vertex_shader() -> ShaderBlob {
        compile(&DEFAULT_SHADER, VERTEX_ENTRY, ShaderProfile::VS_4_0).unwrap()
    }

    // ── resolve ──────────────────────────────────────────────────────────

    #[test]
    fn append_aligned_follows_previous_element() {
        let resolved = resolve_elements(&VERTEX_ELEMENTS).unwrap();
        assert_eq!(resolved[0].offset, 0);
        assert_eq!(resolved[1].offset, 12);
        assert_eq!(resolved[1].shader_location, 1);
        assert!(check_vertex_layout(&resolved, &Vertex::LAYOUT).is_ok());
    }

    #[test]
    fn second_slot_is_rejected() {
        let mut elements = VERTEX_ELEMENTS;
        elements[1].input_slot = 1;
        assert!(matches!(
            resolve_elements(&elements),
            Err(ResourceCreationError::InputLayout(_))
        ));
    }

    #[test]
    fn mixed_step_modes_are_rejected() {
        let mut elements = VERTEX_ELEMENTS;
        elements[1].classification = InputClassification::PerInstance { step_rate: 1 };
        assert!(resolve_elements(&elements).is_err());
    }

    // ── vertex layout ────────────────────────────────────────────────────

    #[test]
    fn offset_past_the_address_range_is_rejected() {
        let mut elements = VERTEX_ELEMENTS;
        elements[0].offset = ElementOffset::Explicit(u32::MAX - 4);
        assert!(matches!(
            resolve_elements(&elements),
            Err(ResourceCreationError::InputLayout(_))
        ));
    }

    #[test]
    fn wrong_explicit_offset_is_a_layout_mismatch() {
        let mut elements = VERTEX_ELEMENTS;
        elements[1].offset = ElementOffset::Explicit(16);
        let resolved = resolve_elements(&elements).unwrap();
        match check_vertex_layout(&resolved, &Vertex::LAYOUT) {
            Err(ResourceCreationError::LayoutMismatch {
                semantic,
                declared,
                expected,
            }) => {
                assert_eq!(semantic, "COLOR");
                assert_eq!((declared, expected), (16, 12));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_color_is_a_stride_mismatch() {
        let mut elements = VERTEX_ELEMENTS;
        elements[1].format = wgpu::VertexFormat::Float32x3;
        let resolved = resolve_elements(&elements).unwrap();
        assert!(matches!(
            check_vertex_layout(&resolved, &Vertex::LAYOUT),
            Err(ResourceCreationError::StrideMismatch {
                declared: 24,
                expected: 28
            })
        ));
    }

    // ── signature ────────────────────────────────────────────────────────

    #[test]
    fn default_elements_match_default_shader() {
        let resolved = resolve_elements(&VERTEX_ELEMENTS).unwrap();
        assert!(check_signature(&resolved, &vertex_shader()).is_ok());
    }

    #[test]
    fn unfed_shader_input_is_a_signature_mismatch() {
        let resolved = resolve_elements(&VERTEX_ELEMENTS[..1]).unwrap();
        assert!(matches!(
            check_signature(&resolved, &vertex_shader()),
            Err(ResourceCreationError::SignatureMismatch(_))
        ));
    }

    #[test]
    fn integer_color_is_a_signature_mismatch() {
        let mut elements = VERTEX_ELEMENTS;
        elements[1].format = wgpu::VertexFormat::Uint32x4;
        let resolved = resolve_elements(&elements).unwrap();
        assert!(check_signature(&resolved, &vertex_shader()).is_err());
    }
}
