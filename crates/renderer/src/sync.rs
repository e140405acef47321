//! Per-frame uniform derivation.
//!
//! [`UniformSyncDriver`] is the single place where the continuously smoothed
//! signals live. It reads the transition and pointer snapshots once per frame
//! and produces a [`UniformFrame`] value that every render layer consumes
//! unchanged, which keeps the voxel and base-plane CRT masks in lockstep.

use rand::rngs::StdRng;
use rand::Rng;
use sequencer::{Phase, TransitionState};
use slideconfig::{SceneParams, Smoothing};

use crate::ambient::{dust_parallax_target, DUST_PARALLAX_RATE};
use crate::assets::ContentState;
use crate::color::Rgb;
use crate::composite::bloom_intensity;
use crate::fragments::{content_weight, glitch_amount};
use crate::palette::Palette;
use crate::pointer::PointerState;
use crate::runtime::TimeSample;

/// Camera offset range, in world units, across the full pointer range.
const CAMERA_SWING: [f32; 2] = [12.0, -8.0];
/// Scene tilt range, in radians, as `(pitch, yaw)`.
const TILT_SWING: [f32; 2] = [0.4, 0.5];

/// A scalar that moves toward its target by a fixed fraction each frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Smoothed {
    pub value: f32,
}

impl Smoothed {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn approach(&mut self, target: f32, rate: f32) -> f32 {
        self.value += (target - self.value) * rate;
        self.value
    }

    /// Value after `frames` calls to [`Smoothed::approach`] starting at `start`.
    pub fn predicted(start: f32, target: f32, rate: f32, frames: u32) -> f32 {
        target + (start - target) * (1.0 - rate).powi(frames as i32)
    }
}

/// Everything the layer shaders read for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFrame {
    pub time: f32,
    pub delta: f32,
    pub frame_index: u64,
    pub progress: f32,
    pub exit_progress: f32,
    pub interference: f32,
    /// `max(exit_progress, 1 - progress)`.
    pub glitch: f32,
    pub content_weight: f32,
    /// Bloom strength for the composite, dimmed while exiting.
    pub bloom: f32,
    /// `+1` forward, `-1` backward.
    pub direction: f32,
    /// Smoothed pointer in shader space (origin bottom-left).
    pub mouse: [f32; 2],
    /// Pointer remapped onto the oversized background plane.
    pub background_mouse: [f32; 2],
    /// Camera offset from its rest position.
    pub parallax: [f32; 2],
    /// Scene rotation as `(pitch, yaw)`.
    pub tilt: [f32; 2],
    pub dust_offset: [f32; 2],
    pub palette: Palette,
    pub accent: Rgb,
    pub seed: f32,
    pub active_index: usize,
    pub generation: u64,
    pub content: ContentState,
}

pub struct UniformSyncDriver {
    rates: Smoothing,
    background_scale: f32,
    rng: StdRng,
    progress: Smoothed,
    exit: Smoothed,
    interference: Smoothed,
    palette: Palette,
    palette_target: Palette,
    parallax: [Smoothed; 2],
    tilt: [Smoothed; 2],
    dust: [Smoothed; 2],
    seed: f32,
    generation: Option<u64>,
    content: ContentState,
    last_time: Option<f32>,
}

impl UniformSyncDriver {
    pub fn new(rates: Smoothing, scene: &SceneParams, mut rng: StdRng) -> Self {
        let seed = rng.gen::<f32>();
        Self {
            rates,
            background_scale: scene.background_scale,
            rng,
            progress: Smoothed::default(),
            exit: Smoothed::default(),
            interference: Smoothed::default(),
            palette: Palette::default(),
            palette_target: Palette::default(),
            parallax: [Smoothed::default(); 2],
            tilt: [Smoothed::default(); 2],
            dust: [Smoothed::default(); 2],
            seed,
            generation: None,
            content: ContentState::Pending,
            last_time: None,
        }
    }

    /// Advances every smoothed signal by one frame.
    ///
    /// `palette` is the cached palette of the active slide, if extracted; the
    /// previous target is kept otherwise.
    pub fn update(
        &mut self,
        transition: &TransitionState,
        pointer: &PointerState,
        palette: Option<&Palette>,
        time: TimeSample,
        content: ContentState,
    ) -> UniformFrame {
        let slide_changed = self.generation != Some(transition.generation);
        let content_arrived = content == ContentState::Ready && self.content != ContentState::Ready;
        if slide_changed {
            if self.generation.is_some() {
                self.seed = self.rng.gen::<f32>();
            }
            self.generation = Some(transition.generation);
        }
        if slide_changed || content_arrived {
            self.progress = Smoothed::default();
        }
        self.content = content;

        let exiting = if transition.phase == Phase::Exiting {
            1.0
        } else {
            0.0
        };
        let progress = self.progress.approach(1.0, self.rates.progress);
        let exit = self.exit.approach(exiting, self.rates.exit);
        let interference = self
            .interference
            .approach(exiting, self.rates.interference);

        if let Some(target) = palette {
            self.palette_target = *target;
        }
        self.palette = self.palette.lerp(&self.palette_target, self.rates.accent);

        let raw = pointer.raw;
        let parallax_target = [
            (raw[0] - 0.5) * CAMERA_SWING[0],
            (raw[1] - 0.5) * CAMERA_SWING[1],
        ];
        let tilt_target = [(raw[1] - 0.5) * TILT_SWING[0], (raw[0] - 0.5) * TILT_SWING[1]];
        let dust_target = dust_parallax_target(raw);
        for axis in 0..2 {
            self.parallax[axis].approach(parallax_target[axis], self.rates.camera);
            self.tilt[axis].approach(tilt_target[axis], self.rates.camera);
            self.dust[axis].approach(dust_target[axis], DUST_PARALLAX_RATE);
        }

        let mouse = [pointer.smoothed[0], 1.0 - pointer.smoothed[1]];
        let scale = self.background_scale.max(f32::EPSILON);
        let background_mouse = [
            0.5 + (mouse[0] - 0.5) / scale,
            0.5 + (mouse[1] - 0.5) / scale,
        ];

        let delta = self
            .last_time
            .map(|last| (time.seconds - last).max(0.0))
            .unwrap_or(0.0);
        self.last_time = Some(time.seconds);

        UniformFrame {
            time: time.seconds,
            delta,
            frame_index: time.frame_index,
            progress,
            exit_progress: exit,
            interference,
            glitch: glitch_amount(progress, exit),
            content_weight: content_weight(progress, exit),
            bloom: bloom_intensity(transition.phase),
            direction: transition.direction.sign() as f32,
            mouse,
            background_mouse,
            parallax: [self.parallax[0].value, self.parallax[1].value],
            tilt: [self.tilt[0].value, self.tilt[1].value],
            dust_offset: [self.dust[0].value, self.dust[1].value],
            palette: self.palette,
            accent: self.palette.accent(),
            seed: self.seed,
            active_index: transition.active_index,
            generation: transition.generation,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{BLOOM_EXITING, BLOOM_IDLE};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use sequencer::{Direction, TransitionController};
    use slideconfig::Timing;
    use std::time::{Duration, Instant};

    fn driver() -> UniformSyncDriver {
        UniformSyncDriver::new(
            Smoothing::default(),
            &SceneParams::default(),
            StdRng::seed_from_u64(5),
        )
    }

    fn sample(frame: u64, origin: Instant) -> TimeSample {
        let elapsed = Duration::from_millis(16 * frame);
        TimeSample::new(elapsed.as_secs_f32(), frame, origin + elapsed)
    }

    #[test]
    fn smoothing_matches_closed_form() {
        let mut value = Smoothed::new(1.0);
        for _ in 0..20 {
            value.approach(0.0, 0.18);
        }
        assert_abs_diff_eq!(
            value.value,
            Smoothed::predicted(1.0, 0.0, 0.18, 20),
            epsilon = 1e-5
        );
        assert!(value.value < 0.05);
    }

    #[test]
    fn smoothed_settles_within_a_bounded_frame_count() {
        for (rate, expected) in [(0.15_f32, 43_u32), (0.18, 35), (0.1, 66)] {
            let bound = ((1e-3_f32).ln() / (1.0 - rate).ln()).ceil() as u32;
            assert_eq!(bound, expected);

            let mut value = Smoothed::new(1.0);
            let frames = (1..=200_u32)
                .find(|_| value.approach(0.0, rate).abs() < 1e-3)
                .unwrap();
            assert!(frames <= bound, "rate {rate} took {frames} frames");
            assert_abs_diff_eq!(
                value.value,
                Smoothed::predicted(1.0, 0.0, rate, frames),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn exit_rises_while_exiting_and_decays_after_commit() {
        let origin = Instant::now();
        let mut controller = TransitionController::new(3, &Timing::default()).unwrap();
        let mut driver = driver();
        let pointer = PointerState::default();

        let first = driver.update(controller.state(), &pointer, None, sample(0, origin), ContentState::Ready);
        assert_eq!(first.exit_progress, 0.0);
        assert_eq!(first.bloom, BLOOM_IDLE);
        assert_abs_diff_eq!(first.progress, 0.15, epsilon = 1e-6);

        assert!(controller.advance(Direction::Forward, origin).is_accepted());
        let mut frame = first;
        for n in 1..=20 {
            frame = driver.update(controller.state(), &pointer, None, sample(n, origin), ContentState::Ready);
        }
        assert!(frame.exit_progress > 0.95);
        assert!(frame.interference > 0.9);
        assert!(frame.content_weight < 0.2);
        assert_eq!(frame.bloom, BLOOM_EXITING);

        let change = controller.tick(origin + Duration::from_millis(500)).unwrap();
        let seed_before = frame.seed;
        let committed = driver.update(controller.state(), &pointer, None, sample(21, origin), ContentState::Ready);
        assert_eq!(committed.active_index, change.index);
        assert_ne!(committed.seed, seed_before);
        assert_abs_diff_eq!(committed.progress, 0.15, epsilon = 1e-6);
        assert_eq!(committed.bloom, BLOOM_IDLE);

        for n in 22..=41 {
            frame = driver.update(controller.state(), &pointer, None, sample(n, origin), ContentState::Ready);
        }
        assert!(frame.exit_progress < 0.05);
        assert!(frame.progress > 0.9);
    }

    #[test]
    fn seed_is_stable_within_a_slide() {
        let origin = Instant::now();
        let controller = TransitionController::new(2, &Timing::default()).unwrap();
        let mut driver = driver();
        let pointer = PointerState::default();
        let a = driver.update(controller.state(), &pointer, None, sample(0, origin), ContentState::Ready);
        let b = driver.update(controller.state(), &pointer, None, sample(1, origin), ContentState::Ready);
        assert_eq!(a.seed, b.seed);
        assert_abs_diff_eq!(b.delta, 0.016, epsilon = 1e-6);
    }

    #[test]
    fn accent_blends_toward_slide_palette() {
        let origin = Instant::now();
        let controller = TransitionController::new(2, &Timing::default()).unwrap();
        let mut driver = driver();
        let pointer = PointerState::default();
        let target = Palette::uniform(Rgb::new(1.0, 0.0, 0.0));
        let start = Palette::default().accent();

        let frame = driver.update(controller.state(), &pointer, Some(&target), sample(0, origin), ContentState::Ready);
        assert_abs_diff_eq!(frame.accent.r, start.r + (1.0 - start.r) * 0.1, epsilon = 1e-6);

        // Keeps moving toward the last known target when the palette is not cached.
        let next = driver.update(controller.state(), &pointer, None, sample(1, origin), ContentState::Ready);
        assert!(next.accent.r > frame.accent.r);
        assert_eq!(next.accent, next.palette.top_left);
    }

    #[test]
    fn pointer_is_flipped_and_remapped_for_the_background() {
        let origin = Instant::now();
        let controller = TransitionController::new(1, &Timing::default()).unwrap();
        let mut driver = driver();
        let pointer = PointerState {
            raw: [1.0, 0.0],
            smoothed: [1.0, 0.0],
        };
        let frame = driver.update(controller.state(), &pointer, None, sample(0, origin), ContentState::Ready);
        assert_eq!(frame.mouse, [1.0, 1.0]);
        assert_abs_diff_eq!(frame.background_mouse[0], 0.5 + 0.5 / 1.2, epsilon = 1e-6);
        assert_abs_diff_eq!(frame.parallax[0], 6.0 * 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(frame.parallax[1], 4.0 * 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(frame.dust_offset[0], -0.75 * 0.02, epsilon = 1e-6);
    }

    #[test]
    fn late_texture_rearms_progress() {
        let origin = Instant::now();
        let controller = TransitionController::new(2, &Timing::default()).unwrap();
        let mut driver = driver();
        let pointer = PointerState::default();
        for n in 0..30 {
            driver.update(controller.state(), &pointer, None, sample(n, origin), ContentState::Pending);
        }
        let arrived = driver.update(controller.state(), &pointer, None, sample(30, origin), ContentState::Ready);
        assert_abs_diff_eq!(arrived.progress, 0.15, epsilon = 1e-6);
        assert_eq!(arrived.content, ContentState::Ready);
    }
}
