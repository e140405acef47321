//! Bloom and film-grain settings for the final composite.
//!
//! The scene is drawn into an offscreen target, bright areas are blurred at
//! half resolution, and `shaders/composite.frag` adds the glow and an
//! overlay-blended grain on the way to the surface.

use sequencer::Phase;

/// Bloom strength while a slide is shown.
pub const BLOOM_IDLE: f32 = 0.5;
/// Bloom strength while the current slide is exiting.
pub const BLOOM_EXITING: f32 = 0.2;
/// Luminance where the bright pass starts to admit light.
pub const BLOOM_THRESHOLD: f32 = 0.9;
/// Width of the bright-pass ramp above [`BLOOM_THRESHOLD`].
pub const BLOOM_SMOOTHING: f32 = 0.9;
/// Opacity of the film grain overlay.
pub const GRAIN_OPACITY: f32 = 0.04;

pub fn bloom_intensity(phase: Phase) -> f32 {
    match phase {
        Phase::Idle => BLOOM_IDLE,
        Phase::Exiting => BLOOM_EXITING,
    }
}
