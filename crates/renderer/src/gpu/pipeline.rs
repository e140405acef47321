use crate::ambient::{CubeInstance, DustInstance};
use crate::compile::{compile_stage, StageSource};
use crate::fragments::VoxelInstance;
use crate::mesh::MeshVertex;

use super::context::DEPTH_FORMAT;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const VOXEL_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4, 5 => Float32x4];
const CUBE_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4];
const DUST_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

pub(crate) fn mesh_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }
}

pub(crate) fn voxel_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<VoxelInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &VOXEL_ATTRIBUTES,
    }
}

pub(crate) fn cube_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<CubeInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &CUBE_ATTRIBUTES,
    }
}

pub(crate) fn dust_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<DustInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &DUST_ATTRIBUTES,
    }
}

/// Bind group layouts shared by every layer: the frame uniforms at group 0
/// and, for textured layers, a texture and sampler at group 1. The composite
/// takes a second texture group at group 2.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    plain: wgpu::PipelineLayout,
    textured: wgpu::PipelineLayout,
    composite: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device, texture_layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let plain = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("layer pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let textured = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("textured layer pipeline layout"),
            bind_group_layouts: &[&uniform_layout, texture_layout],
            push_constant_ranges: &[],
        });
        let composite = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite pipeline layout"),
            bind_group_layouts: &[&uniform_layout, texture_layout, texture_layout],
            push_constant_ranges: &[],
        });
        Self {
            uniform_layout,
            plain,
            textured,
            composite,
        }
    }
}

/// Bind groups a layer reads beyond the frame uniforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LayerBindings {
    Plain,
    Textured,
    Composite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LayerBlend {
    Replace,
    Alpha,
    Additive,
}

impl LayerBlend {
    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            LayerBlend::Replace => Some(wgpu::BlendState::REPLACE),
            LayerBlend::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            LayerBlend::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Zero,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LayerDepth {
    /// Drawn over everything before it; leaves depth untouched.
    Ignore,
    /// Occluded by nearer geometry; leaves depth untouched.
    Test,
    TestWrite,
    /// Drawn in a pass without a depth attachment.
    Detached,
}

impl LayerDepth {
    fn state(self) -> Option<wgpu::DepthStencilState> {
        let (depth_write_enabled, depth_compare) = match self {
            LayerDepth::Ignore => (false, wgpu::CompareFunction::Always),
            LayerDepth::Test => (false, wgpu::CompareFunction::LessEqual),
            LayerDepth::TestWrite => (true, wgpu::CompareFunction::LessEqual),
            LayerDepth::Detached => return None,
        };
        Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare,
            stencil: Default::default(),
            bias: Default::default(),
        })
    }
}

pub(crate) struct LayerDescriptor<'a> {
    pub label: &'static str,
    pub vertex: StageSource,
    pub fragment: StageSource,
    pub buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub bindings: LayerBindings,
    pub blend: LayerBlend,
    pub depth: LayerDepth,
}

/// Colour target a layer pipeline renders into.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RenderTargetInfo {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
}

pub(crate) fn build_layer(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    target: RenderTargetInfo,
    descriptor: LayerDescriptor<'_>,
) -> wgpu::RenderPipeline {
    let vertex_module = compile_stage(device, descriptor.vertex);
    let fragment_module = compile_stage(device, descriptor.fragment);
    let layout = match descriptor.bindings {
        LayerBindings::Plain => &layouts.plain,
        LayerBindings::Textured => &layouts.textured,
        LayerBindings::Composite => &layouts.composite,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(descriptor.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: descriptor.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: descriptor.depth.state(),
        multisample: wgpu::MultisampleState {
            count: target.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: descriptor.blend.state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covers(layout: &wgpu::VertexBufferLayout<'_>) -> u64 {
        layout
            .attributes
            .iter()
            .map(|attribute| attribute.offset + attribute.format.size())
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn instance_attributes_span_their_structs() {
        for layout in [
            mesh_layout(),
            voxel_instance_layout(),
            cube_instance_layout(),
            dust_instance_layout(),
        ] {
            assert_eq!(covers(&layout), layout.array_stride);
        }
    }

    #[test]
    fn mesh_and_instance_locations_do_not_overlap() {
        let mesh: Vec<u32> = mesh_layout()
            .attributes
            .iter()
            .map(|attribute| attribute.shader_location)
            .collect();
        for instance in [voxel_instance_layout(), cube_instance_layout()] {
            assert!(instance
                .attributes
                .iter()
                .all(|attribute| !mesh.contains(&attribute.shader_location)));
        }
    }

    #[test]
    fn overlay_layers_leave_depth_alone() {
        let ignore = LayerDepth::Ignore.state().unwrap();
        assert!(!ignore.depth_write_enabled);
        assert_eq!(ignore.depth_compare, wgpu::CompareFunction::Always);
        assert!(LayerDepth::TestWrite.state().unwrap().depth_write_enabled);
        assert!(!LayerDepth::Test.state().unwrap().depth_write_enabled);
        assert!(LayerDepth::Detached.state().is_none());
    }
}
