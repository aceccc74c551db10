use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::device::ShaderCompilationError;

/// Vertex entry point of the built-in shader file.
pub const VERTEX_ENTRY: &str = "VShader";

/// Pixel entry point of the built-in shader file.
pub const PIXEL_ENTRY: &str = "PShader";

/// `shaders.wgsl`, compiled into the binary.
pub const DEFAULT_SHADER: ShaderSource = ShaderSource::Embedded {
    name: "shaders.wgsl",
    text: include_str!("shaders/shaders.wgsl"),
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    fn profile_prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        }
    }

    fn matches(self, stage: naga::ShaderStage) -> bool {
        matches!(
            (self, stage),
            (ShaderStage::Vertex, naga::ShaderStage::Vertex)
                | (ShaderStage::Pixel, naga::ShaderStage::Fragment)
        )
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Pixel => "pixel",
        })
    }
}

/// Target profile, e.g. `vs_4_0`.
///
/// WGSL has no shader models; the profile selects the stage and documents the
/// feature level the shader is written against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderProfile {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl ShaderProfile {
    pub const VS_4_0: Self = Self {
        stage: ShaderStage::Vertex,
        major: 4,
        minor: 0,
    };

    pub const PS_4_0: Self = Self {
        stage: ShaderStage::Pixel,
        major: 4,
        minor: 0,
    };

    /// Parses `vs_M_m` / `ps_M_m` for shader models 4.0, 4.1 and 5.0.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('_');
        let stage = match parts.next()? {
            "vs" => ShaderStage::Vertex,
            "ps" => ShaderStage::Pixel,
            _ => return None,
        };
        let major: u8 = parts.next()?.parse().ok()?;
        let minor: u8 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || !matches!((major, minor), (4, 0) | (4, 1) | (5, 0)) {
            return None;
        }
        Some(Self {
            stage,
            major,
            minor,
        })
    }
}

impl fmt::Display for ShaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.stage.profile_prefix(),
            self.major,
            self.minor
        )
    }
}

/// Where WGSL source text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Read from disk at compile time of the pipeline.
    File(PathBuf),
    Embedded {
        name: &'static str,
        text: &'static str,
    },
}

impl ShaderSource {
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            ShaderSource::File(path) => path.to_string_lossy(),
            ShaderSource::Embedded { name, .. } => Cow::Borrowed(name),
        }
    }

    fn load(&self) -> std::io::Result<Cow<'static, str>> {
        match self {
            ShaderSource::File(path) => std::fs::read_to_string(path).map(Cow::Owned),
            ShaderSource::Embedded { text, .. } => Ok(Cow::Borrowed(text)),
        }
    }
}

/// Scalar type of a shader input, as far as input-layout matching cares.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Sint,
    Uint,
    Other,
}

impl From<naga::ScalarKind> for ScalarKind {
    fn from(kind: naga::ScalarKind) -> Self {
        match kind {
            naga::ScalarKind::Float | naga::ScalarKind::AbstractFloat => ScalarKind::Float,
            naga::ScalarKind::Sint | naga::ScalarKind::AbstractInt => ScalarKind::Sint,
            naga::ScalarKind::Uint => ScalarKind::Uint,
            _ => ScalarKind::Other,
        }
    }
}

/// One `@location` input of a vertex entry point.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    pub location: u32,
    pub kind: ScalarKind,
    pub components: u8,
}

/// Validated shader code plus what the pipeline needs to know about it.
///
/// Cheap to clone; the source text is shared.
#[derive(Debug, Clone)]
pub struct ShaderBlob {
    source_name: String,
    code: Arc<str>,
    entry_point: String,
    profile: ShaderProfile,
    inputs: Vec<ShaderInput>,
}

impl ShaderBlob {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn profile(&self) -> ShaderProfile {
        self.profile
    }

    pub fn stage(&self) -> ShaderStage {
        self.profile.stage
    }

    /// Vertex inputs sorted by location. Empty for pixel shaders.
    pub fn inputs(&self) -> &[ShaderInput] {
        &self.inputs
    }
}

/// Loads, parses and validates `source`, then checks that `entry_point`
/// exists with the stage `profile` asks for.
///
/// Diagnostics carry the compiler's annotated source excerpt.
pub fn compile(
    source: &ShaderSource,
    entry_point: &str,
    profile: ShaderProfile,
) -> Result<ShaderBlob, ShaderCompilationError> {
    let fail = |diagnostics: String| ShaderCompilationError {
        source_name: source.name().into_owned(),
        entry_point: entry_point.to_owned(),
        profile: profile.to_string(),
        diagnostics,
    };

    let code = source
        .load()
        .map_err(|e| fail(format!("cannot read shader source: {e}")))?;

    let module = naga::front::wgsl::parse_str(&code).map_err(|e| fail(e.emit_to_string(&code)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| fail(e.emit_to_string(&code)))?;

    let Some(entry) = module.entry_points.iter().find(|ep| ep.name == entry_point) else {
        let available: Vec<&str> = module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
        return Err(fail(format!(
            "entry point `{entry_point}` not found (available: {})",
            available.join(", ")
        )));
    };

    if !profile.stage.matches(entry.stage) {
        return Err(fail(format!(
            "`{entry_point}` is a {:?} entry point, {profile} needs a {} shader",
            entry.stage, profile.stage
        )));
    }

    let inputs = match profile.stage {
        ShaderStage::Vertex => reflect_inputs(&module, &entry.function),
        ShaderStage::Pixel => Vec::new(),
    };

    log::debug!(
        "compiled {entry_point} ({profile}) from {}: {} vertex inputs",
        source.name(),
        inputs.len()
    );

    Ok(ShaderBlob {
        source_name: source.name().into_owned(),
        code: Arc::from(code.as_ref()),
        entry_point: entry_point.to_owned(),
        profile,
        inputs,
    })
}

fn reflect_inputs(module: &naga::Module, function: &naga::Function) -> Vec<ShaderInput> {
    let mut inputs = Vec::new();
    for arg in &function.arguments {
        match &arg.binding {
            Some(binding) => push_input(&mut inputs, module, binding, arg.ty),
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let Some(binding) = &member.binding {
                            push_input(&mut inputs, module, binding, member.ty);
                        }
                    }
                }
            }
        }
    }
    inputs.sort_by_key(|input| input.location);
    inputs
}

fn push_input(
    inputs: &mut Vec<ShaderInput>,
    module: &naga::Module,
    binding: &naga::Binding,
    ty: naga::Handle<naga::Type>,
) {
    // builtins are not fed by the input assembler
    let naga::Binding::Location { location, .. } = binding else {
        return;
    };
    let (kind, components) = match &module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) => (scalar.kind.into(), 1),
        naga::TypeInner::Vector { size, scalar } => (scalar.kind.into(), *size as u8),
        _ => (ScalarKind::Other, 0),
    };
    inputs.push(ShaderInput {
        location: *location,
        kind,
        components,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── profiles ─────────────────────────────────────────────────────────

    #[test]
    fn parses_supported_profiles() {
        assert_eq!(ShaderProfile::parse("vs_4_0"), Some(ShaderProfile::VS_4_0));
        assert_eq!(ShaderProfile::parse("ps_4_0"), Some(ShaderProfile::PS_4_0));
        assert_eq!(
            ShaderProfile::parse("ps_5_0").map(|p| p.to_string()),
            Some("ps_5_0".to_owned())
        );
    }

    #[test]
    fn rejects_unknown_profiles() {
        for text in ["gs_4_0", "vs_3_0", "vs_4", "vs_4_0_1", "vs_x_0", ""] {
            assert_eq!(ShaderProfile::parse(text), None, "{text}");
        }
    }

    // ── compilation ──────────────────────────────────────────────────────

    #[test]
    fn default_vertex_entry_reflects_position_and_color() {
        let blob = compile(&DEFAULT_SHADER, VERTEX_ENTRY, ShaderProfile::VS_4_0).unwrap();
        assert_eq!(blob.stage(), ShaderStage::Vertex);
        assert_eq!(
            blob.inputs(),
            &[
                ShaderInput {
                    location: 0,
                    kind: ScalarKind::Float,
                    components: 3
                },
                ShaderInput {
                    location: 1,
                    kind: ScalarKind::Float,
                    components: 4
                },
            ]
        );
    }

    #[test]
    fn default_pixel_entry_compiles() {
        let blob = compile(&DEFAULT_SHADER, PIXEL_ENTRY, ShaderProfile::PS_4_0).unwrap();
        assert_eq!(blob.entry_point(), "PShader");
        assert!(blob.inputs().is_empty());
    }

    #[test]
    fn syntax_error_carries_diagnostics() {
        let source = ShaderSource::Embedded {
            name: "broken.wgsl",
            text: "@vertex fn VShader( -> @builtin(position) vec4<f32> { }",
        };
        let err = compile(&source, VERTEX_ENTRY, ShaderProfile::VS_4_0).unwrap_err();
        assert_eq!(err.source_name, "broken.wgsl");
        assert_eq!(err.profile, "vs_4_0");
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let err = compile(&DEFAULT_SHADER, "Main", ShaderProfile::VS_4_0).unwrap_err();
        assert!(err.diagnostics.contains("VShader"), "{}", err.diagnostics);
    }

    #[test]
    fn stage_must_match_profile() {
        let err = compile(&DEFAULT_SHADER, PIXEL_ENTRY, ShaderProfile::VS_4_0).unwrap_err();
        assert!(err.diagnostics.contains("vertex shader"), "{}", err.diagnostics);
    }

    #[test]
    fn missing_file_fails_like_a_compile_error() {
        let source = ShaderSource::File(PathBuf::from("/nonexistent/shaders.wgsl"));
        let err = compile(&source, VERTEX_ENTRY, ShaderProfile::VS_4_0).unwrap_err();
        assert!(err.diagnostics.starts_with("cannot read shader source"));
    }
}
