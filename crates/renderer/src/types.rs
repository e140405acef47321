use std::fmt;
use std::str::FromStr;

use slideconfig::AntialiasSetting;

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain; shader outputs are written as-is.
    #[default]
    Auto,
    /// Treat shader outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and let an sRGB swapchain convert them.
    Linear,
}

impl FromStr for ColorSpaceMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gamma" => Ok(Self::Gamma),
            "linear" => Ok(Self::Linear),
            other => Err(format!(
                "unknown color space '{other}' (expected auto, gamma or linear)"
            )),
        }
    }
}

/// Anti-aliasing policy for the render pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl From<AntialiasSetting> for Antialiasing {
    fn from(setting: AntialiasSetting) -> Self {
        match setting.samples() {
            None => Antialiasing::Auto,
            Some(1) => Antialiasing::Off,
            Some(count) => Antialiasing::Samples(count),
        }
    }
}

impl fmt::Display for Antialiasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antialiasing::Auto => f.write_str("auto"),
            Antialiasing::Off => f.write_str("off"),
            Antialiasing::Samples(count) => write!(f, "{count}x"),
        }
    }
}

/// Immutable configuration passed to the window renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional FPS cap; `None` renders on every redraw callback.
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    /// Seed for instance generation and per-transition glitch seeds.
    pub seed: Option<u64>,
}

impl Default for RendererConfig {
    /// 1280x800 window, uncapped, automatic MSAA.
    fn default() -> Self {
        Self {
            surface_size: (1280, 800),
            target_fps: None,
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            seed: None,
        }
    }
}

/// Subset of the adapter info logged at start-up and used to tune defaults.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}
