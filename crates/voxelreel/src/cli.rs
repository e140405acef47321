use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use renderer::{Antialiasing, ColorSpaceMode};
use sequencer::Direction;

#[derive(Parser, Debug)]
#[command(
    name = "voxelreel",
    author,
    version,
    about = "Glitch-themed voxel image slideshow",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Slide deck TOML; falls back to `$VOXELREEL_CONFIG`, then the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Window size in physical pixels (e.g. `1280x800`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Frame rate cap (0 = uncapped). Overrides `render.fps` from the config.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an MSAA sample count (2/4/8/16).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_color_space,
        default_value = "auto"
    )]
    pub color_space: ColorSpaceMode,

    /// Seed for instance placement and glitch seeds; overrides the config.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the slide deck and print a summary.
    Check,
    /// Run the slideshow headless with a stepped clock, printing one JSON
    /// object per frame.
    Simulate(SimulateArgs),
    /// Print resolved configuration locations.
    Where,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of frames to simulate.
    #[arg(long, value_name = "N")]
    pub frames: u64,

    /// Simulated frames per second.
    #[arg(long, value_name = "HZ", default_value_t = 60.0)]
    pub frame_rate: f32,

    /// Request an advance at a frame, e.g. `30:next` or `90:prev`.
    #[arg(long = "advance", value_name = "FRAME:DIR", value_parser = parse_advance)]
    pub advances: Vec<(u64, Direction)>,

    /// Request a slide index at a frame, e.g. `120:3`.
    #[arg(long = "select", value_name = "FRAME:INDEX", value_parser = parse_select)]
    pub selects: Vec<(u64, i64)>,

    /// Normalised pointer position held for the whole run, e.g. `0.25,0.75`.
    #[arg(long, value_name = "X,Y", value_parser = parse_pointer)]
    pub pointer: Option<(f32, f32)>,

    /// Seed for instance placement and glitch seeds; overrides the config.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

impl Cli {
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.run.config.config.as_ref()
    }
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    parse_size(spec).map_err(|err| err.to_string())
}

fn parse_size(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 1280x800"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size specification"))?;
    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }
    Ok((width, height))
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let setting: slideconfig::AntialiasSetting = value.parse()?;
    Ok(setting.into())
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    value.parse()
}

fn split_frame(value: &str) -> Result<(u64, &str), String> {
    let (frame, rest) = value
        .split_once(':')
        .ok_or_else(|| format!("expected FRAME:VALUE, got '{value}'"))?;
    let frame = frame
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame number '{frame}'"))?;
    Ok((frame, rest.trim()))
}

pub fn parse_advance(value: &str) -> Result<(u64, Direction), String> {
    let (frame, direction) = split_frame(value)?;
    let direction = match direction.to_ascii_lowercase().as_str() {
        "next" | "forward" | "+1" | "1" => Direction::Forward,
        "prev" | "previous" | "backward" | "-1" => Direction::Backward,
        other => return Err(format!("unknown direction '{other}'; expected next or prev")),
    };
    Ok((frame, direction))
}

pub fn parse_select(value: &str) -> Result<(u64, i64), String> {
    let (frame, index) = split_frame(value)?;
    let index = index
        .parse()
        .map_err(|_| format!("invalid slide index '{index}'"))?;
    Ok((frame, index))
}

pub fn parse_pointer(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let parse_axis = |axis: &str| {
        axis.trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid pointer coordinate '{axis}'"))
    };
    Ok((parse_axis(x)?, parse_axis(y)?))
}
