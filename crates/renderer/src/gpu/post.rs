use winit::dpi::PhysicalSize;

use crate::compile::{
    BLOOM_BLUR_X_FRAG, BLOOM_BLUR_Y_FRAG, BLOOM_BRIGHT_FRAG, COMPOSITE_FRAG, FULLSCREEN_VERT,
};

use super::context::SCENE_FORMAT;
use super::pipeline::{
    build_layer, LayerBindings, LayerBlend, LayerDepth, LayerDescriptor, PipelineLayouts,
    RenderTargetInfo,
};

/// Bloom targets are this many times smaller than the surface on each axis.
const BLOOM_DOWNSCALE: u32 = 2;

/// Resolved scene or bloom texture, bound as a group 1/2 input.
struct ColorTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

impl ColorTarget {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        size: PhysicalSize<u32>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            _texture: texture,
            view,
            bind_group,
        }
    }
}

fn bloom_size(size: PhysicalSize<u32>) -> PhysicalSize<u32> {
    PhysicalSize::new(
        (size.width / BLOOM_DOWNSCALE).max(1),
        (size.height / BLOOM_DOWNSCALE).max(1),
    )
}

/// Offscreen scene target plus the bloom chain that composites it onto the
/// surface: bright pass, separable blur, then scene + bloom + grain.
pub(crate) struct PostChain {
    bright: wgpu::RenderPipeline,
    blur_x: wgpu::RenderPipeline,
    blur_y: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    scene: ColorTarget,
    bloom: [ColorTarget; 2],
}

impl PostChain {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        texture_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
    ) -> Self {
        let offscreen = RenderTargetInfo {
            format: SCENE_FORMAT,
            sample_count: 1,
        };
        let pass = |label, fragment, bindings, target| {
            build_layer(
                device,
                layouts,
                target,
                LayerDescriptor {
                    label,
                    vertex: FULLSCREEN_VERT,
                    fragment,
                    buffers: &[],
                    bindings,
                    blend: LayerBlend::Replace,
                    depth: LayerDepth::Detached,
                },
            )
        };
        let bright = pass(
            "bloom bright pass",
            BLOOM_BRIGHT_FRAG,
            LayerBindings::Textured,
            offscreen,
        );
        let blur_x = pass(
            "bloom blur x",
            BLOOM_BLUR_X_FRAG,
            LayerBindings::Textured,
            offscreen,
        );
        let blur_y = pass(
            "bloom blur y",
            BLOOM_BLUR_Y_FRAG,
            LayerBindings::Textured,
            offscreen,
        );
        let composite = pass(
            "composite",
            COMPOSITE_FRAG,
            LayerBindings::Composite,
            RenderTargetInfo {
                format: surface_format,
                sample_count: 1,
            },
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("post sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let (scene, bloom) = Self::targets(device, texture_layout, &sampler, size);

        Self {
            bright,
            blur_x,
            blur_y,
            composite,
            sampler,
            scene,
            bloom,
        }
    }

    fn targets(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        size: PhysicalSize<u32>,
    ) -> (ColorTarget, [ColorTarget; 2]) {
        let half = bloom_size(size);
        (
            ColorTarget::new(device, layout, sampler, "scene color", size),
            [
                ColorTarget::new(device, layout, sampler, "bloom ping", half),
                ColorTarget::new(device, layout, sampler, "bloom pong", half),
            ],
        )
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        texture_layout: &wgpu::BindGroupLayout,
        size: PhysicalSize<u32>,
    ) {
        let (scene, bloom) = Self::targets(device, texture_layout, &self.sampler, size);
        self.scene = scene;
        self.bloom = bloom;
    }

    /// Single-sample view the scene pass renders or resolves into.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.scene.view
    }

    /// Records the bloom chain and the composite onto `surface`.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &wgpu::BindGroup,
        surface: &wgpu::TextureView,
    ) {
        let [ping, pong] = &self.bloom;
        fullscreen_pass(
            encoder,
            "bloom bright pass",
            &self.bright,
            &ping.view,
            uniforms,
            &[&self.scene.bind_group],
        );
        fullscreen_pass(
            encoder,
            "bloom blur x",
            &self.blur_x,
            &pong.view,
            uniforms,
            &[&ping.bind_group],
        );
        fullscreen_pass(
            encoder,
            "bloom blur y",
            &self.blur_y,
            &ping.view,
            uniforms,
            &[&pong.bind_group],
        );
        fullscreen_pass(
            encoder,
            "composite",
            &self.composite,
            surface,
            uniforms,
            &[&self.scene.bind_group, &ping.bind_group],
        );
    }
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    target: &wgpu::TextureView,
    uniforms: &wgpu::BindGroup,
    inputs: &[&wgpu::BindGroup],
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, uniforms, &[]);
    for (index, group) in inputs.iter().enumerate() {
        pass.set_bind_group(index as u32 + 1, *group, &[]);
    }
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_targets_are_half_size_and_never_empty() {
        assert_eq!(bloom_size(PhysicalSize::new(1600, 1000)), PhysicalSize::new(800, 500));
        assert_eq!(bloom_size(PhysicalSize::new(1, 3)), PhysicalSize::new(1, 1));
    }
}
