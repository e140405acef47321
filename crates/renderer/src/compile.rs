use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::ambient::{
    CUBE_BANDS, CUBE_BAND_SPAN, CUBE_BASE_SCALE, CUBE_GLITCH_CUTOFF, CUBE_TEAR_THRESHOLD,
};
use crate::fragments::{
    BAND_GLITCH_CUTOFF, BAND_TEAR_AMPLITUDE, BAND_TEAR_THRESHOLD, COVERAGE_BORDER,
    COVERAGE_BORDER_FACTOR, EMBER_THRESHOLD, EXIT_EPSILON, GLITCH_BANDS, GRID_EXTENT,
    POINTER_GRID, VOXEL_SIZE,
};

const PRELUDE: &str = include_str!("../shaders/prelude.glsl");

/// GLSL body of one shader stage, before the prelude is attached.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StageSource {
    pub label: &'static str,
    pub body: &'static str,
    /// Stage-specific declarations placed between the prelude and the body.
    pub header: &'static str,
    pub stage: ShaderStage,
}

impl StageSource {
    const fn vertex(label: &'static str, body: &'static str) -> Self {
        Self {
            label,
            body,
            header: "",
            stage: ShaderStage::Vertex,
        }
    }

    const fn fragment(label: &'static str, body: &'static str) -> Self {
        Self {
            label,
            body,
            header: "",
            stage: ShaderStage::Fragment,
        }
    }

    const fn with_header(self, header: &'static str) -> Self {
        Self { header, ..self }
    }
}

pub(crate) const FULLSCREEN_VERT: StageSource =
    StageSource::vertex("fullscreen vertex", include_str!("../shaders/fullscreen.vert"));
pub(crate) const LIQUID_FRAG: StageSource =
    StageSource::fragment("liquid fragment", include_str!("../shaders/liquid.frag"));
pub(crate) const CUBES_VERT: StageSource =
    StageSource::vertex("cubes vertex", include_str!("../shaders/cubes.vert"));
pub(crate) const CUBES_FRAG: StageSource =
    StageSource::fragment("cubes fragment", include_str!("../shaders/cubes.frag"));
pub(crate) const DUST_VERT: StageSource =
    StageSource::vertex("dust vertex", include_str!("../shaders/dust.vert"));
pub(crate) const DUST_FRAG: StageSource =
    StageSource::fragment("dust fragment", include_str!("../shaders/dust.frag"));
pub(crate) const BASE_VERT: StageSource =
    StageSource::vertex("base plane vertex", include_str!("../shaders/base.vert"));
pub(crate) const BASE_FRAG: StageSource =
    StageSource::fragment("base plane fragment", include_str!("../shaders/base.frag"));
pub(crate) const VOXEL_VERT: StageSource =
    StageSource::vertex("voxel vertex", include_str!("../shaders/voxel.vert"));
pub(crate) const VOXEL_FRAG: StageSource =
    StageSource::fragment("voxel fragment", include_str!("../shaders/voxel.frag"));
pub(crate) const INTERFERENCE_FRAG: StageSource = StageSource::fragment(
    "interference fragment",
    include_str!("../shaders/interference.frag"),
);
pub(crate) const BLOOM_BRIGHT_FRAG: StageSource = StageSource::fragment(
    "bloom bright-pass fragment",
    include_str!("../shaders/bloom_bright.frag"),
);
pub(crate) const BLOOM_BLUR_X_FRAG: StageSource =
    StageSource::fragment("bloom blur x fragment", include_str!("../shaders/bloom_blur.frag"))
        .with_header("const vec2 BLUR_AXIS = vec2(1.0, 0.0);\n");
pub(crate) const BLOOM_BLUR_Y_FRAG: StageSource =
    StageSource::fragment("bloom blur y fragment", include_str!("../shaders/bloom_blur.frag"))
        .with_header("const vec2 BLUR_AXIS = vec2(0.0, 1.0);\n");
pub(crate) const COMPOSITE_FRAG: StageSource =
    StageSource::fragment("composite fragment", include_str!("../shaders/composite.frag"));

/// Wraps a layer shader with the shared prelude and compiles it as GLSL.
pub(crate) fn compile_stage(device: &wgpu::Device, source: StageSource) -> wgpu::ShaderModule {
    tracing::trace!(label = source.label, "compiling layer shader");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrap_layer_source(source.header, source.body)),
            stage: source.stage,
            defines: &[],
        },
    })
}

/// Produces a self-contained GLSL 450 shader from a layer body.
///
/// The generated constants come first, then the prelude with the frame
/// uniform block and the hash and mask helpers. `#line 1` resets numbering
/// so compiler diagnostics point into the layer file rather than the
/// combined source.
fn wrap_layer_source(header: &str, body: &str) -> String {
    let body = body
        .lines()
        .filter(|line| !line.trim_start().starts_with("#version"))
        .collect::<Vec<_>>()
        .join("\n");
    let constants = shared_constants();
    format!("#version 450\n{constants}{PRELUDE}\n{header}#line 1\n{body}\n")
}

/// GLSL declarations for the scene constants owned by the Rust side.
fn shared_constants() -> String {
    let floats = [
        ("EXIT_EPSILON", EXIT_EPSILON),
        ("GLITCH_BANDS", GLITCH_BANDS),
        ("BAND_GLITCH_CUTOFF", BAND_GLITCH_CUTOFF),
        ("BAND_TEAR_THRESHOLD", BAND_TEAR_THRESHOLD),
        ("BAND_TEAR_AMPLITUDE", BAND_TEAR_AMPLITUDE),
        ("COVERAGE_BORDER", COVERAGE_BORDER),
        ("COVERAGE_BORDER_FACTOR", COVERAGE_BORDER_FACTOR),
        ("EMBER_THRESHOLD", EMBER_THRESHOLD),
        ("CUBE_BASE_SCALE", CUBE_BASE_SCALE),
        ("CUBE_BANDS", CUBE_BANDS),
        ("CUBE_BAND_SPAN", CUBE_BAND_SPAN),
        ("CUBE_GLITCH_CUTOFF", CUBE_GLITCH_CUTOFF),
        ("CUBE_TEAR_THRESHOLD", CUBE_TEAR_THRESHOLD),
    ];
    let vectors: [(&str, &[f32]); 3] = [
        ("GRID_EXTENT", &GRID_EXTENT),
        ("VOXEL_SIZE", &VOXEL_SIZE),
        ("POINTER_GRID", &POINTER_GRID),
    ];

    let mut out = String::new();
    for (name, value) in floats {
        out.push_str(&format!("const float {name} = {};\n", glsl_float(value)));
    }
    for (name, values) in vectors {
        let components = values
            .iter()
            .map(|value| glsl_float(*value))
            .collect::<Vec<_>>()
            .join(", ");
        let width = values.len();
        out.push_str(&format!(
            "const vec{width} {name} = vec{width}({components});\n"
        ));
    }
    out
}

/// `Debug` output of an `f32` always carries a decimal point or exponent,
/// which GLSL needs to type the literal as a float.
fn glsl_float(value: f32) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    const ALL: [StageSource; 15] = [
        FULLSCREEN_VERT,
        LIQUID_FRAG,
        CUBES_VERT,
        CUBES_FRAG,
        DUST_VERT,
        DUST_FRAG,
        BASE_VERT,
        BASE_FRAG,
        VOXEL_VERT,
        VOXEL_FRAG,
        INTERFERENCE_FRAG,
        BLOOM_BRIGHT_FRAG,
        BLOOM_BLUR_X_FRAG,
        BLOOM_BLUR_Y_FRAG,
        COMPOSITE_FRAG,
    ];

    #[test]
    fn wrap_prepends_version_and_prelude() {
        let wrapped = wrap_layer_source("", "#version 300 es\nvoid main() {}\n");
        assert!(wrapped.starts_with("#version 450\n"));
        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(wrapped.contains("uniform FrameUniforms"));
        let line_marker = wrapped.find("#line 1").unwrap();
        assert!(wrapped[line_marker..].contains("void main() {}"));
    }

    #[test]
    fn stage_header_precedes_the_line_reset() {
        let wrapped = wrap_layer_source(BLOOM_BLUR_Y_FRAG.header, BLOOM_BLUR_Y_FRAG.body);
        let header = wrapped.find("const vec2 BLUR_AXIS = vec2(0.0, 1.0);").unwrap();
        assert!(header < wrapped.find("#line 1").unwrap());
    }

    #[test]
    fn shared_constants_are_declared_from_rust_values() {
        let constants = shared_constants();
        assert!(constants.contains("const float GLITCH_BANDS = 16.0;"));
        assert!(constants.contains("const float EXIT_EPSILON = 0.01;"));
        assert!(constants.contains("const vec3 VOXEL_SIZE = vec3(0.36, 0.36, 2.76);"));
        assert!(constants.contains("const vec2 POINTER_GRID = vec2(20.0, 13.0);"));
        assert_eq!(glsl_float(1.0), "1.0");
    }

    #[test]
    fn shaders_read_shared_constants_instead_of_literals() {
        assert!(VOXEL_VERT.body.contains("GLITCH_BANDS"));
        assert!(VOXEL_VERT.body.contains("COVERAGE_BORDER"));
        assert!(VOXEL_VERT.body.contains("POINTER_GRID"));
        assert!(!VOXEL_VERT.body.contains("16.0"));
        assert!(!VOXEL_VERT.body.contains("0.82"));
        assert!(VOXEL_FRAG.body.contains("EMBER_THRESHOLD"));
        assert!(VOXEL_FRAG.body.contains("GRID_EXTENT"));
        assert!(CUBES_VERT.body.contains("CUBE_BANDS"));
        assert!(!CUBES_VERT.body.contains("24.0"));
        assert!(PRELUDE.contains("EXIT_EPSILON"));
    }

    #[test]
    fn every_stage_parses_and_validates() {
        for source in ALL {
            let wrapped = wrap_layer_source(source.header, source.body);
            let module = Frontend::default()
                .parse(&Options::from(source.stage), &wrapped)
                .unwrap_or_else(|err| panic!("{} failed to parse: {err:?}", source.label));
            Validator::new(ValidationFlags::all(), Capabilities::all())
                .validate(&module)
                .unwrap_or_else(|err| panic!("{} failed validation: {err:?}", source.label));
        }
    }

    #[test]
    fn every_layer_has_a_single_entry_point() {
        for source in ALL {
            assert_eq!(
                source.body.matches("void main()").count(),
                1,
                "{} should define main once",
                source.label
            );
            assert!(!source.body.contains("#version"), "{}", source.label);
        }
    }

    #[test]
    fn textured_layers_bind_the_slide_at_group_one() {
        for source in [BASE_FRAG, VOXEL_FRAG, BLOOM_BRIGHT_FRAG, BLOOM_BLUR_X_FRAG, COMPOSITE_FRAG] {
            assert!(source.body.contains("set = 1, binding = 0"), "{}", source.label);
            assert!(source.body.contains("set = 1, binding = 1"), "{}", source.label);
        }
        assert!(COMPOSITE_FRAG.body.contains("set = 2, binding = 0"));
        for source in [LIQUID_FRAG, CUBES_FRAG, DUST_FRAG, INTERFERENCE_FRAG] {
            assert!(!source.body.contains("set = 1"), "{}", source.label);
        }
    }
}
