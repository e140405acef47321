use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlideshowConfig {
    pub version: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub smoothing: Smoothing,
    #[serde(default)]
    pub scene: SceneParams,
    #[serde(default)]
    pub render: RenderDefaults,
    #[serde(default)]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Slide {
    pub title: String,
    pub image: PathBuf,
}

/// Guard windows for the transition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Timing {
    #[serde(
        default = "default_debounce",
        deserialize_with = "deserialize_duration"
    )]
    pub debounce: Duration,
    #[serde(default = "default_dwell", deserialize_with = "deserialize_duration")]
    pub dwell: Duration,
    #[serde(
        default = "default_texture_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub texture_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            dwell: default_dwell(),
            texture_timeout: default_texture_timeout(),
        }
    }
}

/// Per-frame exponential approach rates, one per smoothed signal.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Smoothing {
    pub progress: f32,
    pub exit: f32,
    pub interference: f32,
    pub accent: f32,
    pub pointer: f32,
    pub camera: f32,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            progress: 0.15,
            exit: 0.18,
            interference: 0.15,
            accent: 0.1,
            pointer: 0.1,
            camera: 0.05,
        }
    }
}

impl Smoothing {
    fn entries(&self) -> [(&'static str, f32); 6] {
        [
            ("progress", self.progress),
            ("exit", self.exit),
            ("interference", self.interference),
            ("accent", self.accent),
            ("pointer", self.pointer),
            ("camera", self.camera),
        ]
    }
}

/// Upper bound on either voxel grid dimension.
pub const MAX_GRID_DIMENSION: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SceneParams {
    pub rows: u32,
    pub cols: u32,
    pub debris: u32,
    pub floating_cubes: u32,
    pub dust: u32,
    /// Oversize factor of the background plane relative to the viewport.
    pub background_scale: f32,
    /// Minimum wheel delta (in pixels) that counts as an advance gesture.
    pub wheel_threshold: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 60,
            debris: 300,
            floating_cubes: 130,
            dust: 4000,
            background_scale: 1.2,
            wheel_threshold: 20.0,
        }
    }
}

impl SceneParams {
    pub fn grid_cells(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RenderDefaults {
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    /// Requested MSAA sample count; `None` lets the renderer pick.
    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

impl std::str::FromStr for AntialiasSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_antialias(raw)
    }
}

fn default_debounce() -> Duration {
    Duration::from_millis(800)
}

fn default_dwell() -> Duration {
    Duration::from_millis(500)
}

fn default_texture_timeout() -> Duration {
    Duration::from_secs(3)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            Some(parse_antialias(&value.to_string()).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl SlideshowConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SlideshowConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file, resolving relative slide images
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            config.resolve_images(base);
        }
        Ok(config)
    }

    pub fn resolve_images(&mut self, base: &Path) {
        for slide in &mut self.slides {
            if slide.image.is_relative() {
                slide.image = base.join(&slide.image);
            }
        }
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.slides.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one slide".into(),
            ));
        }

        for (index, slide) in self.slides.iter().enumerate() {
            if slide.image.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "slide {index} ('{}') has an empty image path",
                    slide.title
                )));
            }
        }

        if self.timing.dwell > self.timing.debounce {
            return Err(ConfigError::Invalid(format!(
                "timing.dwell ({:?}) must not exceed timing.debounce ({:?})",
                self.timing.dwell, self.timing.debounce
            )));
        }

        for (name, rate) in self.smoothing.entries() {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "smoothing.{name} must be in (0, 1]; got {rate}"
                )));
            }
        }

        if self.scene.rows == 0 || self.scene.cols == 0 {
            return Err(ConfigError::Invalid(
                "scene.rows and scene.cols must be greater than zero".into(),
            ));
        }

        if self.scene.rows > MAX_GRID_DIMENSION || self.scene.cols > MAX_GRID_DIMENSION {
            return Err(ConfigError::Invalid(format!(
                "scene.rows and scene.cols must not exceed {MAX_GRID_DIMENSION}; got {}x{}",
                self.scene.rows, self.scene.cols
            )));
        }

        if !(self.scene.background_scale > 0.0) {
            return Err(ConfigError::Invalid(
                "scene.background_scale must be greater than zero".into(),
            ));
        }

        if self.scene.wheel_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "scene.wheel_threshold must be >= 0".into(),
            ));
        }

        if let Some(fps) = self.render.fps {
            if fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }

        Ok(())
    }
}
