use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::{Antialiasing, RendererConfig};
use slideconfig::SlideshowConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::paths::{AppPaths, ENV_CONFIG, ENV_CONFIG_DIR};
use crate::simulate::run_simulation;

const DEFAULT_SURFACE: (u32, u32) = (1280, 800);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let flag = cli.config_path().cloned();
    match cli.command {
        Some(Command::Where) => {
            print_where(&paths, flag.as_deref());
            Ok(())
        }
        Some(Command::Check) => {
            let config = load_deck(&paths, flag.as_deref())?;
            print_summary(&config);
            Ok(())
        }
        Some(Command::Simulate(args)) => {
            let config = load_deck(&paths, flag.as_deref())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            run_simulation(config, &args, &mut out)
        }
        None => {
            let config = load_deck(&paths, flag.as_deref())?;
            run_window(config, cli.run)
        }
    }
}

fn load_deck(paths: &AppPaths, flag: Option<&Path>) -> Result<SlideshowConfig> {
    let (path, source) = paths.resolve_deck(flag)?;
    let config = SlideshowConfig::load(&path)
        .with_context(|| format!("failed to load slide deck {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        source = source.as_str(),
        slides = config.slides.len(),
        "loaded slide deck"
    );
    Ok(config)
}

fn run_window(config: SlideshowConfig, args: RunArgs) -> Result<()> {
    let renderer = renderer_config(&config, &args);
    tracing::info!(
        width = renderer.surface_size.0,
        height = renderer.surface_size.1,
        antialiasing = %renderer.antialiasing,
        color_space = ?renderer.color_space,
        "starting slideshow window"
    );
    renderer::run_window(config, renderer)
}

/// Merges CLI flags over the deck's `[render]` defaults.
fn renderer_config(config: &SlideshowConfig, args: &RunArgs) -> RendererConfig {
    let antialiasing = args
        .antialias
        .or_else(|| config.render.antialias.map(Antialiasing::from))
        .unwrap_or_default();
    let target_fps = args
        .fps
        .or(config.render.fps)
        .filter(|fps| fps.is_finite() && *fps > 0.0);
    RendererConfig {
        surface_size: args.size.unwrap_or(DEFAULT_SURFACE),
        target_fps,
        antialiasing,
        color_space: args.color_space,
        seed: args.seed,
    }
}

fn print_summary(config: &SlideshowConfig) {
    let timing = &config.timing;
    let scene = &config.scene;
    println!("Slide deck OK: {} slides", config.slides.len());
    for (index, slide) in config.slides.iter().enumerate() {
        let marker = if slide.image.is_file() {
            ""
        } else {
            "  (missing)"
        };
        println!(
            "  {:02} {:<16} {}{}",
            index + 1,
            slide.title,
            slide.image.display(),
            marker
        );
    }
    println!(
        "Timing: debounce {} ms, dwell {} ms, texture timeout {} ms",
        timing.debounce.as_millis(),
        timing.dwell.as_millis(),
        timing.texture_timeout.as_millis()
    );
    println!(
        "Scene: {}x{} voxels + {} debris, {} cubes, {} dust",
        scene.cols, scene.rows, scene.debris, scene.floating_cubes, scene.dust
    );
    match config.seed {
        Some(seed) => println!("Seed: {seed}"),
        None => println!("Seed: random"),
    }
}

fn print_where(paths: &AppPaths, flag: Option<&Path>) {
    let (deck, source) = paths.candidate(flag);
    println!("Configuration locations:");
    println!("  config dir: {}", paths.config_dir().display());
    println!("  deck:       {} ({})", deck.display(), source.as_str());
    println!("Environment overrides:");
    println!("  {ENV_CONFIG_DIR}");
    println!("  {ENV_CONFIG}");
}
