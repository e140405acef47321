use wgpu::util::DeviceExt;

use crate::assets::ContentState;
use crate::compile::{
    BASE_FRAG, BASE_VERT, CUBES_FRAG, CUBES_VERT, DUST_FRAG, DUST_VERT, FULLSCREEN_VERT,
    INTERFERENCE_FRAG, LIQUID_FRAG, VOXEL_FRAG, VOXEL_VERT,
};
use crate::fragments::VOXEL_SIZE;
use crate::mesh::{box_mesh, plane_mesh, Mesh};
use crate::scene::Scene;
use crate::sync::UniformFrame;

use super::pipeline::{
    build_layer, cube_instance_layout, dust_instance_layout, mesh_layout, voxel_instance_layout,
    LayerBindings, LayerBlend, LayerDepth, LayerDescriptor, PipelineLayouts, RenderTargetInfo,
};

pub(crate) const BASE_PLANE_SIZE: [f32; 2] = [24.0, 15.6];
pub(crate) const BASE_PLANE_SEGMENTS: u32 = 100;
/// Interference strength below which the overlay is not drawn.
pub(crate) const INTERFERENCE_CUTOFF: f32 = 0.01;
const DUST_QUAD_VERTICES: u32 = 6;

/// Which optional layers to draw this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DrawPlan {
    pub base_plane: bool,
    pub voxels: bool,
    pub interference: bool,
}

impl DrawPlan {
    pub fn for_frame(frame: &UniformFrame) -> Self {
        Self {
            base_plane: frame.content == ContentState::Ready,
            voxels: frame.content != ContentState::Pending,
            interference: frame.interference >= INTERFERENCE_CUTOFF,
        }
    }
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn new(device: &wgpu::Device, label: &str, mesh: &Mesh) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        }
    }
}

struct InstanceBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

impl InstanceBuffer {
    fn new<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, instances: &[T]) -> Option<Self> {
        if instances.is_empty() {
            return None;
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(instances),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Some(Self {
            buffer,
            count: instances.len() as u32,
        })
    }
}

/// Every layer pipeline together with its static geometry. Instance data is
/// uploaded once; all per-frame variation comes from the uniform buffer.
pub(crate) struct LayerSet {
    liquid: wgpu::RenderPipeline,
    cubes: wgpu::RenderPipeline,
    dust: wgpu::RenderPipeline,
    base: wgpu::RenderPipeline,
    voxels: wgpu::RenderPipeline,
    interference: wgpu::RenderPipeline,
    cube_mesh: MeshBuffers,
    voxel_mesh: MeshBuffers,
    plane_mesh: MeshBuffers,
    cube_instances: Option<InstanceBuffer>,
    dust_instances: Option<InstanceBuffer>,
    voxel_instances: Option<InstanceBuffer>,
}

impl LayerSet {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        target: RenderTargetInfo,
        scene: &Scene,
    ) -> Self {
        let liquid = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "liquid background",
                vertex: FULLSCREEN_VERT,
                fragment: LIQUID_FRAG,
                buffers: &[],
                bindings: LayerBindings::Plain,
                blend: LayerBlend::Replace,
                depth: LayerDepth::Ignore,
            },
        );
        let cubes = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "floating cubes",
                vertex: CUBES_VERT,
                fragment: CUBES_FRAG,
                buffers: &[mesh_layout(), cube_instance_layout()],
                bindings: LayerBindings::Plain,
                blend: LayerBlend::Alpha,
                depth: LayerDepth::Test,
            },
        );
        let dust = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "ambient dust",
                vertex: DUST_VERT,
                fragment: DUST_FRAG,
                buffers: &[dust_instance_layout()],
                bindings: LayerBindings::Plain,
                blend: LayerBlend::Additive,
                depth: LayerDepth::Test,
            },
        );
        let base = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "base plane",
                vertex: BASE_VERT,
                fragment: BASE_FRAG,
                buffers: &[mesh_layout()],
                bindings: LayerBindings::Textured,
                blend: LayerBlend::Alpha,
                depth: LayerDepth::TestWrite,
            },
        );
        let voxels = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "voxel fragments",
                vertex: VOXEL_VERT,
                fragment: VOXEL_FRAG,
                buffers: &[mesh_layout(), voxel_instance_layout()],
                bindings: LayerBindings::Textured,
                blend: LayerBlend::Alpha,
                depth: LayerDepth::TestWrite,
            },
        );
        let interference = build_layer(
            device,
            layouts,
            target,
            LayerDescriptor {
                label: "interference overlay",
                vertex: FULLSCREEN_VERT,
                fragment: INTERFERENCE_FRAG,
                buffers: &[],
                bindings: LayerBindings::Plain,
                blend: LayerBlend::Additive,
                depth: LayerDepth::Ignore,
            },
        );

        let cube_mesh = MeshBuffers::new(device, "cube", &box_mesh([1.0, 1.0, 1.0]));
        let voxel_mesh = MeshBuffers::new(device, "voxel", &box_mesh(VOXEL_SIZE));
        let plane_mesh = MeshBuffers::new(
            device,
            "base plane",
            &plane_mesh(
                BASE_PLANE_SIZE[0],
                BASE_PLANE_SIZE[1],
                BASE_PLANE_SEGMENTS,
                BASE_PLANE_SEGMENTS,
            ),
        );

        Self {
            liquid,
            cubes,
            dust,
            base,
            voxels,
            interference,
            cube_mesh,
            voxel_mesh,
            plane_mesh,
            cube_instances: InstanceBuffer::new(device, "cube instances", scene.cubes().instances()),
            dust_instances: InstanceBuffer::new(device, "dust instances", scene.dust().instances()),
            voxel_instances: InstanceBuffer::new(
                device,
                "voxel instances",
                scene.voxels().instances(),
            ),
        }
    }

    /// Records every layer, back to front, into `pass`.
    pub fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        uniforms: &wgpu::BindGroup,
        slide: &wgpu::BindGroup,
        plan: DrawPlan,
    ) {
        pass.set_bind_group(0, uniforms, &[]);

        pass.set_pipeline(&self.liquid);
        pass.draw(0..3, 0..1);

        if let Some(instances) = &self.cube_instances {
            pass.set_pipeline(&self.cubes);
            draw_instanced_mesh(pass, &self.cube_mesh, instances);
        }

        if let Some(instances) = &self.dust_instances {
            pass.set_pipeline(&self.dust);
            pass.set_vertex_buffer(0, instances.buffer.slice(..));
            pass.draw(0..DUST_QUAD_VERTICES, 0..instances.count);
        }

        if plan.base_plane || plan.voxels {
            pass.set_bind_group(1, slide, &[]);
        }

        if plan.base_plane {
            pass.set_pipeline(&self.base);
            pass.set_vertex_buffer(0, self.plane_mesh.vertices.slice(..));
            pass.set_index_buffer(self.plane_mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..self.plane_mesh.index_count, 0, 0..1);
        }

        if plan.voxels {
            if let Some(instances) = &self.voxel_instances {
                pass.set_pipeline(&self.voxels);
                draw_instanced_mesh(pass, &self.voxel_mesh, instances);
            }
        }

        if plan.interference {
            pass.set_pipeline(&self.interference);
            pass.draw(0..3, 0..1);
        }
    }
}

fn draw_instanced_mesh(
    pass: &mut wgpu::RenderPass<'_>,
    mesh: &MeshBuffers,
    instances: &InstanceBuffer,
) {
    pass.set_vertex_buffer(0, mesh.vertices.slice(..));
    pass.set_vertex_buffer(1, instances.buffer.slice(..));
    pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..mesh.index_count, 0, 0..instances.count);
}
