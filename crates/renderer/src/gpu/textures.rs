use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use super::context::SurfaceColorSpace;

/// Slide images resident on the GPU, bound at group 1 by the textured
/// layers. Slides without an upload fall back to a 1×1 placeholder.
pub(crate) struct SlideTextures {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
    placeholder: wgpu::BindGroup,
    slides: Vec<Option<SlideTexture>>,
}

struct SlideTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl SlideTextures {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slide_count: usize,
        color_space: SurfaceColorSpace,
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slide texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("slide sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let format = match color_space {
            SurfaceColorSpace::Gamma => wgpu::TextureFormat::Rgba8Unorm,
            SurfaceColorSpace::Linear => wgpu::TextureFormat::Rgba8UnormSrgb,
        };

        let placeholder_texture =
            upload(device, queue, format, "placeholder slide texture", 1, 1, &[0, 0, 0, 255]);
        let placeholder = bind(device, &layout, &sampler, &placeholder_texture, "placeholder slide");

        Self {
            layout,
            sampler,
            format,
            placeholder,
            slides: (0..slide_count).map(|_| None).collect(),
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn is_uploaded(&self, index: usize) -> bool {
        matches!(self.slides.get(index), Some(Some(_)))
    }

    /// Uploads `image` for slide `index` unless it is already resident.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        index: usize,
        image: &RgbaImage,
    ) {
        let Some(slot) = self.slides.get_mut(index) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        let label = format!("slide texture #{index}");
        let image = fit_within(image, device.limits().max_texture_dimension_2d);
        let pixels = bottom_up_rows(&image);
        let (width, height) = if pixels.len() == 4 {
            (1, 1)
        } else {
            image.dimensions()
        };
        let texture = upload(device, queue, self.format, &label, width, height, &pixels);
        let bind_group = bind(device, &self.layout, &self.sampler, &texture, &label);
        tracing::debug!(
            slide = index,
            width = image.width(),
            height = image.height(),
            "uploaded slide texture"
        );
        *slot = Some(SlideTexture {
            _texture: texture,
            bind_group,
        });
    }

    pub fn bind_group(&self, index: usize) -> &wgpu::BindGroup {
        match self.slides.get(index) {
            Some(Some(slide)) => &slide.bind_group,
            _ => &self.placeholder,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: wgpu::TextureFormat,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    )
}

fn bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    texture: &wgpu::Texture,
    label: &str,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
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
    })
}

/// Downscales `image` when either side exceeds the device texture limit.
fn fit_within(image: &RgbaImage, max_dimension: u32) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return Cow::Borrowed(image);
    }
    let scale = max_dimension as f32 / longest as f32;
    let target_width = ((width as f32 * scale).floor() as u32).clamp(1, max_dimension);
    let target_height = ((height as f32 * scale).floor() as u32).clamp(1, max_dimension);
    tracing::warn!(
        width,
        height,
        max_dimension,
        "slide image exceeds GPU texture limit; downscaling"
    );
    Cow::Owned(imageops::resize(
        image,
        target_width,
        target_height,
        FilterType::Triangle,
    ))
}

/// Pixel rows reordered bottom-first, so texture `v = 0` is the bottom of the
/// image like the layer uv.
fn bottom_up_rows(image: &RgbaImage) -> Vec<u8> {
    if image.width() == 0 || image.height() == 0 {
        return vec![0, 0, 0, 255];
    }
    let row_len = image.width() as usize * 4;
    image
        .as_raw()
        .chunks_exact(row_len)
        .rev()
        .flatten()
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rows_are_flipped_for_upload() {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        image.put_pixel(1, 1, Rgba([0, 0, 255, 255]));

        let rows = bottom_up_rows(&image);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[..4], [0, 0, 255, 255]);
        assert_eq!(rows[12..], [255, 0, 0, 255]);
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let image = RgbaImage::new(64, 16);
        assert!(matches!(fit_within(&image, 64), Cow::Borrowed(_)));
        let fitted = fit_within(&image, 32);
        assert_eq!(fitted.dimensions(), (32, 8));
    }

    #[test]
    fn empty_image_uploads_a_single_texel() {
        let rows = bottom_up_rows(&RgbaImage::new(0, 0));
        assert_eq!(rows, vec![0, 0, 0, 255]);
    }
}
