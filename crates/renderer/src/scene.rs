//! Frame orchestration.
//!
//! [`Scene`] owns every piece of mutable slideshow state and advances it in a
//! fixed order each frame: pointer smoothing, the transition controller,
//! asset and palette polling, then uniform derivation. Input handlers only
//! record requests; nothing observable changes until [`Scene::tick`].

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sequencer::{
    AdvanceOutcome, Direction, Phase, SequencerError, TransitionController, TransitionState,
};
use slideconfig::SlideshowConfig;
use tracing::{debug, info};
use winit::dpi::{PhysicalPosition, PhysicalSize};

use crate::ambient::{CubeField, DustField};
use crate::assets::{ContentState, SlideAssets};
use crate::fragments::VoxelField;
use crate::palette::{Palette, PaletteCache, PaletteRequests, WorkStrategy};
use crate::pointer::PointerTracker;
use crate::runtime::TimeSample;
use crate::sync::{UniformFrame, UniformSyncDriver};

#[derive(Debug, Clone, Copy, Default)]
pub struct SceneOptions {
    /// Where image decodes and palette extraction run.
    pub strategy: WorkStrategy,
    /// Overrides the config seed.
    pub seed: Option<u64>,
}

/// Text overlay state for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    pub active_index: usize,
    pub total: usize,
    pub title: String,
    pub loading_progress: f32,
    pub phase: Phase,
    pub content: ContentState,
}

impl HudSnapshot {
    /// `NN/TT TITLE`, followed by the loading percentage until every image
    /// has settled.
    pub fn window_title(&self) -> String {
        let mut title = format!(
            "{:02}/{:02} {}",
            self.active_index + 1,
            self.total,
            self.title
        );
        if self.loading_progress < 100.0 {
            title.push_str(&format!("  LOADING {:.0}%", self.loading_progress));
        }
        title
    }
}

#[derive(Debug, Clone)]
pub struct SceneFrame {
    pub uniforms: UniformFrame,
    pub hud: HudSnapshot,
}

pub struct Scene {
    config: SlideshowConfig,
    controller: TransitionController,
    pointer: PointerTracker,
    assets: SlideAssets,
    palettes: PaletteCache,
    palette_jobs: PaletteRequests,
    driver: UniformSyncDriver,
    voxels: VoxelField,
    cubes: CubeField,
    dust: DustField,
    seed: u64,
}

impl Scene {
    pub fn new(
        config: SlideshowConfig,
        options: SceneOptions,
        now: Instant,
    ) -> Result<Self, SequencerError> {
        let controller = TransitionController::new(config.slides.len(), &config.timing)?;
        let seed = options
            .seed
            .or(config.seed)
            .unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let voxels = VoxelField::generate(&config.scene, &mut rng);
        let cubes = CubeField::generate(&config.scene, &mut rng);
        let dust = DustField::generate(&config.scene, &mut rng);
        let driver = UniformSyncDriver::new(
            config.smoothing,
            &config.scene,
            StdRng::seed_from_u64(rng.gen()),
        );
        let assets = SlideAssets::load(
            &config.slides,
            options.strategy,
            config.timing.texture_timeout,
            now,
        );

        info!(
            slides = config.slides.len(),
            voxels = voxels.len(),
            cubes = cubes.instances().len(),
            dust = dust.instances().len(),
            seed,
            "scene initialised"
        );

        let mut scene = Self {
            pointer: PointerTracker::new(config.smoothing.pointer),
            controller,
            assets,
            palettes: PaletteCache::new(),
            palette_jobs: PaletteRequests::new(options.strategy),
            driver,
            voxels,
            cubes,
            dust,
            seed,
            config,
        };
        for index in 0..scene.assets.len() {
            scene.request_palette(index);
        }
        Ok(scene)
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer.set_raw(x, y);
    }

    pub fn pointer_moved_physical(
        &mut self,
        position: PhysicalPosition<f64>,
        size: PhysicalSize<u32>,
    ) {
        self.pointer.set_physical(position, size);
    }

    pub fn advance(&mut self, direction: Direction, now: Instant) -> AdvanceOutcome {
        let outcome = self.controller.advance(direction, now);
        debug!(?direction, ?outcome, "advance requested");
        outcome
    }

    pub fn select_index(&mut self, index: i64, now: Instant) -> AdvanceOutcome {
        let outcome = self.controller.select_index(index, now);
        debug!(index, ?outcome, "select requested");
        outcome
    }

    /// Positive `delta` advances forward. Returns `None` when the gesture is
    /// below the configured threshold.
    pub fn wheel(&mut self, delta: f32, now: Instant) -> Option<AdvanceOutcome> {
        if !delta.is_finite() || delta.abs() <= self.config.scene.wheel_threshold {
            return None;
        }
        let direction = if delta > 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        Some(self.advance(direction, now))
    }

    pub fn tick(&mut self, time: TimeSample) -> SceneFrame {
        let now = time.instant;
        self.pointer.tick();
        if let Some(change) = self.controller.tick(now) {
            let title = self
                .config
                .slide(change.index)
                .map(|slide| slide.title.as_str())
                .unwrap_or_default();
            info!(
                index = change.index,
                previous = change.previous,
                title,
                "slide changed"
            );
        }

        for index in self.assets.poll() {
            self.request_palette(index);
        }
        for result in self.palette_jobs.poll() {
            debug!(
                slide = result.slide,
                accent = %result.palette.accent(),
                "palette extracted"
            );
            self.palettes.insert(result.image, result.palette);
        }

        let state = self.controller.state();
        let active = state.active_index;
        let content = self.assets.content_state(active, now);
        let palette = self
            .assets
            .path(active)
            .and_then(|path| self.palettes.get(path));
        let uniforms = self
            .driver
            .update(state, &self.pointer.state(), palette, time, content);

        let hud = HudSnapshot {
            active_index: active,
            total: self.controller.slide_count(),
            title: self
                .config
                .slide(active)
                .map(|slide| slide.title.clone())
                .unwrap_or_default(),
            loading_progress: self.assets.loading_progress(),
            phase: state.phase,
            content,
        };
        SceneFrame { uniforms, hud }
    }

    fn request_palette(&mut self, index: usize) {
        let (Some(path), Some(image)) = (self.assets.path(index), self.assets.image(index)) else {
            return;
        };
        if self.palettes.contains(path) || self.palette_jobs.is_pending(path) {
            return;
        }
        let path = path.to_path_buf();
        self.palette_jobs.request(index, path, image);
    }

    pub fn config(&self) -> &SlideshowConfig {
        &self.config
    }

    pub fn transition(&self) -> &TransitionState {
        self.controller.state()
    }

    pub fn assets(&self) -> &SlideAssets {
        &self.assets
    }

    pub fn palette_for(&self, index: usize) -> Option<&Palette> {
        self.assets
            .path(index)
            .and_then(|path| self.palettes.get(path))
    }

    pub fn voxels(&self) -> &VoxelField {
        &self.voxels
    }

    pub fn cubes(&self) -> &CubeField {
        &self.cubes
    }

    pub fn dust(&self) -> &DustField {
        &self.dust
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
