use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::scene::{Scene, SceneFrame};
use crate::types::{AdapterProfile, Antialiasing, ColorSpaceMode};

use super::context::{GpuContext, DEPTH_FORMAT, SCENE_FORMAT};
use super::layers::{DrawPlan, LayerSet};
use super::pipeline::{PipelineLayouts, RenderTargetInfo};
use super::post::PostChain;
use super::textures::SlideTextures;
use super::uniforms::FrameUniforms;

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent(size),
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: extent(size),
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

fn extent(size: PhysicalSize<u32>) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width.max(1),
        height: size.height.max(1),
        depth_or_array_layers: 1,
    }
}

pub(crate) struct GpuState {
    context: GpuContext,
    layers: LayerSet,
    textures: SlideTextures,
    post: PostChain,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    multisample_target: Option<MultisampleTarget>,
    depth_target: DepthTarget,
    background_scale: f32,
    last_stats: Instant,
    frames_since_stats: u32,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
        scene: &Scene,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, antialiasing, color_space)?;
        let device = &context.device;

        let textures = SlideTextures::new(
            device,
            &context.queue,
            scene.config().slides.len(),
            context.color_space,
        );
        let layouts = PipelineLayouts::new(device, textures.layout());
        let layers = LayerSet::new(
            device,
            &layouts,
            RenderTargetInfo {
                format: SCENE_FORMAT,
                sample_count: context.sample_count,
            },
            scene,
        );
        let post = PostChain::new(
            device,
            &layouts,
            textures.layout(),
            context.surface_format,
            context.size,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let multisample_target = (context.sample_count > 1)
            .then(|| MultisampleTarget::new(device, context.size, context.sample_count));
        let depth_target = DepthTarget::new(device, context.size, context.sample_count);

        Ok(Self {
            layers,
            textures,
            post,
            uniform_buffer,
            uniform_bind_group,
            multisample_target,
            depth_target,
            background_scale: scene.config().scene.background_scale,
            last_stats: Instant::now(),
            frames_since_stats: 0,
            context,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.rebuild_targets();
    }

    /// Reconfigures the surface at its current size after it was lost.
    pub(crate) fn recover_surface(&mut self) {
        self.context.reconfigure();
        self.rebuild_targets();
    }

    fn rebuild_targets(&mut self) {
        let device = &self.context.device;
        let size = self.context.size;
        let sample_count = self.context.sample_count;
        self.multisample_target =
            (sample_count > 1).then(|| MultisampleTarget::new(device, size, sample_count));
        self.depth_target = DepthTarget::new(device, size, sample_count);
        self.post.resize(device, self.textures.layout(), size);
    }

    /// Draws one frame: the layers into the offscreen scene target, then the
    /// bloom chain and composite onto the surface. The uniform buffer is
    /// written exactly once.
    pub(crate) fn render(
        &mut self,
        frame: &SceneFrame,
        scene: &Scene,
    ) -> Result<(), wgpu::SurfaceError> {
        let uniforms = &frame.uniforms;
        let active = uniforms.active_index;
        if !self.textures.is_uploaded(active) {
            if let Some(image) = scene.assets().image(active) {
                self.textures
                    .ensure(&self.context.device, &self.context.queue, active, &image);
            }
        }

        let surface_texture = self.context.surface.get_current_texture()?;
        self.record_stats(frame);

        let packed = FrameUniforms::new(
            uniforms,
            self.context.size,
            self.background_scale,
            self.context.color_space,
        );
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&packed));

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        let scene_view = self.post.scene_view();
        let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(scene_view)),
            None => (scene_view, None),
        };
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_target.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.layers.draw(
                &mut render_pass,
                &self.uniform_bind_group,
                self.textures.bind_group(active),
                DrawPlan::for_frame(uniforms),
            );
        }
        self.post.record(&mut encoder, &self.uniform_bind_group, &view);

        self.context.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn record_stats(&mut self, frame: &SceneFrame) {
        let now = Instant::now();
        self.frames_since_stats += 1;
        let elapsed = now.saturating_duration_since(self.last_stats);
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let fps = self.frames_since_stats as f32 / elapsed.as_secs_f32();
        self.frames_since_stats = 0;
        self.last_stats = now;
        let uniforms = &frame.uniforms;
        debug!(
            fps = fps.round(),
            frame = uniforms.frame_index,
            slide = uniforms.active_index,
            progress = uniforms.progress,
            exit = uniforms.exit_progress,
            content = uniforms.content.as_str(),
            "render stats"
        );
        if fps < 20.0 && self.context.sample_count > 1 {
            warn!(
                fps = fps.round(),
                sample_count = self.context.sample_count,
                "frame rate is low; consider --antialias off"
            );
        }
    }
}
