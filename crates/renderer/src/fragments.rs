//! Voxel fragment field: instance generation and the constants shared with
//! `shaders/voxel.vert`, `voxel.frag` and the prelude.
//!
//! The constants below are emitted into every shader by `compile.rs`, so the
//! GLSL never hardcodes a value this module owns. The test-only
//! `shader_math` module restates the shader formulas on the CPU over the
//! same constants.

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use slideconfig::SceneParams;

use crate::easing::smoothstep;

/// World-space extent covered by the image grid.
pub const GRID_EXTENT: [f32; 2] = [25.8, 16.2];
/// Dimensions of a single voxel box.
pub const VOXEL_SIZE: [f32; 3] = [0.36, 0.36, 2.76];
/// Grid-space scale applied to the shader-space pointer.
pub const POINTER_GRID: [f32; 2] = [20.0, 13.0];
pub const GLITCH_BANDS: f32 = 16.0;
/// Glitch level at or below which no band tears.
pub const BAND_GLITCH_CUTOFF: f32 = 0.1;
/// Band hash above which a band tears.
pub const BAND_TEAR_THRESHOLD: f32 = 0.4;
/// Peak-to-peak horizontal tear at full glitch, in world units.
pub const BAND_TEAR_AMPLITUDE: f32 = 8.0;
/// Exit progress above which a layer is considered to be in its exit ramp.
pub const EXIT_EPSILON: f32 = 0.01;
/// Normalised distance from the centre beyond which coverage is thinned.
pub const COVERAGE_BORDER: f32 = 0.82;
pub const COVERAGE_BORDER_FACTOR: f32 = 0.6;
/// Debris particles with `random.w` above this ever light up.
pub const EMBER_THRESHOLD: f32 = 0.85;

const DEBRIS_SPREAD: [f32; 3] = [85.0, 65.0, 40.0];
const DEBRIS_DEPTH_OFFSET: f32 = -15.0;
const DEPTH_LAYERS: f32 = 4.0;
const DEPTH_STEP: f32 = 0.5;

pub const KIND_GRID: f32 = 0.0;
pub const KIND_DEBRIS: f32 = 1.0;

/// Per-instance attributes consumed by the voxel pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VoxelInstance {
    pub position: [f32; 3],
    pub kind: f32,
    pub uv: [f32; 2],
    pub _pad: [f32; 2],
    pub random: [f32; 4],
}

impl VoxelInstance {
    pub fn is_debris(&self) -> bool {
        self.kind > 0.5
    }
}

/// Fixed instance arena for the voxel layer. Grid cells come first in
/// row-major order, followed by the debris particles.
#[derive(Debug, Clone)]
pub struct VoxelField {
    instances: Vec<VoxelInstance>,
    grid_len: usize,
    rows: u32,
    cols: u32,
}

impl VoxelField {
    pub fn generate<R: Rng + ?Sized>(params: &SceneParams, rng: &mut R) -> Self {
        let rows = params.rows.max(1);
        let cols = params.cols.max(1);
        let grid_len = rows as usize * cols as usize;
        let mut instances = Vec::with_capacity(grid_len + params.debris as usize);

        for row in 0..rows {
            for col in 0..cols {
                let u = col as f32 / cols as f32;
                let v = row as f32 / rows as f32;
                let depth = (rng.gen::<f32>() * DEPTH_LAYERS).floor() * DEPTH_STEP;
                instances.push(VoxelInstance {
                    position: [(u - 0.5) * GRID_EXTENT[0], (v - 0.5) * GRID_EXTENT[1], depth],
                    kind: KIND_GRID,
                    uv: [u, v],
                    _pad: [0.0; 2],
                    random: random4(rng),
                });
            }
        }

        for _ in 0..params.debris {
            let position = [
                (rng.gen::<f32>() - 0.5) * DEBRIS_SPREAD[0],
                (rng.gen::<f32>() - 0.5) * DEBRIS_SPREAD[1],
                (rng.gen::<f32>() - 0.5) * DEBRIS_SPREAD[2] + DEBRIS_DEPTH_OFFSET,
            ];
            instances.push(VoxelInstance {
                position,
                kind: KIND_DEBRIS,
                uv: [rng.gen(), rng.gen()],
                _pad: [0.0; 2],
                random: random4(rng),
            });
        }

        Self {
            instances,
            grid_len,
            rows,
            cols,
        }
    }

    pub fn instances(&self) -> &[VoxelInstance] {
        &self.instances
    }

    pub fn grid(&self) -> &[VoxelInstance] {
        &self.instances[..self.grid_len]
    }

    pub fn debris(&self) -> &[VoxelInstance] {
        &self.instances[self.grid_len..]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

pub(crate) fn random4<R: Rng + ?Sized>(rng: &mut R) -> [f32; 4] {
    [rng.gen(), rng.gen(), rng.gen(), rng.gen()]
}

/// Transition glitch level: the stronger of the exit ramp and the unrevealed
/// share of the entry.
pub fn glitch_amount(progress: f32, exit: f32) -> f32 {
    exit.max(1.0 - progress)
}

/// How much of the slide image (versus the standby tint) a cell shows.
pub fn content_weight(progress: f32, exit: f32) -> f32 {
    if exit > EXIT_EPSILON {
        1.0 - smoothstep(0.9, 1.0, exit)
    } else {
        smoothstep(0.1, 0.4, progress)
    }
}

/// CPU restatement of the voxel and base-plane shader math.
#[cfg(test)]
mod shader_math {
    use super::*;
    use crate::easing::{clamp01, hash, mix, step};

    /// Probability that a grid cell is drawn: a superellipse falloff toward the
    /// edges, thinned further in the outer border.
    pub(super) fn coverage_probability(uv: [f32; 2]) -> f32 {
        let nx = uv[0] - 0.5;
        let ny = uv[1] - 0.5;
        let dx = (nx * 2.05).abs();
        let dy = (ny * 2.05).abs();
        let dist = dx.powi(6) + dy.powi(6);
        let mut prob = 1.0 - (dist * 0.9).min(1.0);
        if (nx * 2.0).abs().max((ny * 2.0).abs()) > COVERAGE_BORDER {
            prob *= COVERAGE_BORDER_FACTOR;
        }
        prob
    }

    /// Whether a grid cell participates for the given transition seed.
    pub(super) fn cell_active(random_x: f32, seed: f32, uv: [f32; 2]) -> bool {
        hash(random_x * 100.0 + seed) < coverage_probability(uv)
    }

    /// Per-cell reveal progress, staggered by the cell's `random.w`.
    pub(super) fn local_progress(progress: f32, stagger: f32) -> f32 {
        smoothstep(0.0, 1.0, clamp01((progress - stagger * 0.4) / 0.6))
    }

    /// Horizontal tearing offset of the band containing `uv_y`.
    pub(super) fn band_offset(uv_y: f32, time: f32, seed: f32, glitch: f32) -> f32 {
        if glitch <= BAND_GLITCH_CUTOFF {
            return 0.0;
        }
        let band = (uv_y * GLITCH_BANDS).floor();
        if hash(band + seed) > BAND_TEAR_THRESHOLD {
            (hash(band + time * 10.0) - 0.5) * glitch * BAND_TEAR_AMPLITUDE
        } else {
            0.0
        }
    }

    /// Share of bands that tear for `seed`.
    pub(super) fn selected_band_ratio(seed: f32) -> f32 {
        let bands = GLITCH_BANDS as usize;
        let selected = (0..bands)
            .filter(|band| hash(*band as f32 + seed) > BAND_TEAR_THRESHOLD)
            .count();
        selected as f32 / bands as f32
    }

    /// Open extents of the CRT window as `(horizontal, vertical)` half-widths in
    /// normalised distance from the centre.
    ///
    /// Entering, the horizontal line opens first and the picture then expands
    /// vertically; exiting collapses vertically first and then horizontally.
    pub(super) fn crt_extents(progress: f32, exit: f32) -> (f32, f32) {
        if exit > EXIT_EPSILON {
            let vertical = 1.0 - clamp01(exit * 1.43);
            let horizontal = 1.0 - clamp01((exit - 0.7) * 3.33);
            (horizontal, vertical)
        } else {
            let horizontal = clamp01(progress * 3.33);
            let vertical = clamp01((progress - 0.3) * 1.43);
            (horizontal, vertical)
        }
    }

    pub(super) fn crt_mask(uv: [f32; 2], progress: f32, exit: f32) -> f32 {
        let (horizontal, vertical) = crt_extents(progress, exit);
        let dist_x = (uv[0] - 0.5).abs() * 2.0;
        let dist_y = (uv[1] - 0.5).abs() * 2.0;
        step(dist_y, vertical) * step(dist_x, horizontal)
    }

    /// Pointer proximity dimming for grid cells.
    pub(super) fn mouse_alpha(distance: f32) -> f32 {
        mix(0.15, 1.0, smoothstep(1.5, 8.0, distance))
    }

    /// Pointer in grid space from the shader-space (y-up) pointer.
    pub(super) fn grid_pointer(mouse: [f32; 2]) -> [f32; 2] {
        [
            (mouse[0] - 0.5) * POINTER_GRID[0],
            (mouse[1] - 0.5) * POINTER_GRID[1],
        ]
    }

    /// Soft vignette over the image grid.
    pub(super) fn feather(uv: [f32; 2]) -> f32 {
        let axis = |x: f32| smoothstep(0.0, 0.42, x) * (1.0 - smoothstep(0.58, 1.0, x));
        axis(uv[0]) * axis(uv[1])
    }

    /// Ember window of a debris particle, `0` when unlit.
    pub(super) fn debris_window(random: [f32; 4], time: f32) -> f32 {
        if random[3] <= EMBER_THRESHOLD {
            return 0.0;
        }
        let offset = random[0] * 20.0;
        let period = 6.0 + random[1] * 4.0;
        let active = 2.0 + random[2] * 1.5;
        let cycle = (time + offset).rem_euclid(period);
        smoothstep(0.0, 0.8, cycle) * (1.0 - smoothstep(active - 0.8, active, cycle))
    }

    /// Final alpha of a grid cell fragment, excluding the texture's own alpha.
    pub(super) fn cell_alpha(
        uv: [f32; 2],
        random_y: f32,
        mouse_alpha: f32,
        progress: f32,
        exit: f32,
    ) -> f32 {
        let random_alpha = mix(0.7, 1.0, random_y);
        let fade_out = 1.0 - smoothstep(0.8, 1.0, exit);
        let fade_in = smoothstep(0.0, 0.35, progress);
        0.8 * feather(uv) * random_alpha * mouse_alpha * fade_in * fade_out * crt_mask(uv, progress, exit)
    }
}

#[cfg(test)]
mod tests {
    use super::shader_math::*;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn coverage_is_full_at_centre_and_thin_at_edges() {
        assert_eq!(coverage_probability([0.5, 0.5]), 1.0);
        assert_eq!(coverage_probability([0.0, 0.5]), 0.0);
        assert!(coverage_probability([0.02, 0.5]) < 0.2);
        assert_eq!(coverage_probability([0.0, 0.0]), 0.0);
    }

    #[test]
    fn grid_maps_one_to_one_onto_cells() {
        let params = SceneParams::default();
        let mut rng = StdRng::seed_from_u64(7);
        let field = VoxelField::generate(&params, &mut rng);
        assert_eq!(field.len(), params.grid_cells() + params.debris as usize);
        assert_eq!(field.grid().len(), 2_400);
        assert_eq!(field.debris().len(), 300);

        let cell = field.grid()[60 + 3];
        assert_eq!(cell.uv, [3.0 / 60.0, 1.0 / 40.0]);
        assert!(!cell.is_debris());
        assert!(field.debris().iter().all(VoxelInstance::is_debris));
        assert!(field
            .grid()
            .iter()
            .all(|cell| [0.0, 0.5, 1.0, 1.5].contains(&cell.position[2])));
    }

    #[test]
    fn generation_is_seeded() {
        let params = SceneParams::default();
        let a = VoxelField::generate(&params, &mut StdRng::seed_from_u64(3));
        let b = VoxelField::generate(&params, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.instances(), b.instances());
    }

    #[test]
    fn local_progress_is_staggered() {
        assert_eq!(local_progress(0.3, 1.0), 0.0);
        assert!((local_progress(1.0, 1.0) - 1.0).abs() < 1e-5);
        assert!(local_progress(0.3, 0.0) > 0.0);
    }

    #[test]
    fn bands_are_still_without_glitch() {
        for band in 0..16 {
            let y = (band as f32 + 0.5) / 16.0;
            assert_eq!(band_offset(y, 12.5, 0.3, 0.1), 0.0);
        }
    }

    #[test]
    fn band_offsets_stay_within_amplitude() {
        for band in 0..16 {
            let y = (band as f32 + 0.5) / 16.0;
            let offset = band_offset(y, 3.25, 0.77, 1.0);
            assert!(offset.abs() <= 4.0);
        }
    }

    #[test]
    fn roughly_sixty_percent_of_bands_tear() {
        let seeds = 400;
        let mean: f32 = (0..seeds)
            .map(|i| selected_band_ratio(i as f32 * 0.173))
            .sum::<f32>()
            / seeds as f32;
        assert!((0.5..0.7).contains(&mean), "mean ratio {mean}");
    }

    #[test]
    fn crt_opens_horizontally_then_vertically() {
        let centre_row = [0.9, 0.5];
        let tall = [0.5, 0.9];
        assert_eq!(crt_mask(centre_row, 0.0, 0.0), 0.0);
        assert_eq!(crt_mask(centre_row, 0.3, 0.0), 1.0);
        assert_eq!(crt_mask(tall, 0.3, 0.0), 0.0);
        assert_eq!(crt_mask(tall, 1.0, 0.0), 1.0);
        assert_eq!(crt_mask([0.0, 0.0], 1.0, 0.0), 1.0);
    }

    #[test]
    fn crt_collapses_vertically_then_horizontally() {
        assert_eq!(crt_mask([0.5, 0.9], 1.0, 0.5), 0.0);
        assert_eq!(crt_mask([0.9, 0.5], 1.0, 0.5), 1.0);
        assert_eq!(crt_mask([0.9, 0.5], 1.0, 1.0), 0.0);
    }

    #[test]
    fn content_weight_tracks_phase() {
        assert_eq!(content_weight(0.0, 0.0), 0.0);
        assert_eq!(content_weight(1.0, 0.0), 1.0);
        assert_eq!(content_weight(1.0, 0.5), 1.0);
        assert_eq!(content_weight(1.0, 1.0), 0.0);
    }

    #[test]
    fn glitch_uses_the_stronger_signal() {
        assert_eq!(glitch_amount(1.0, 0.0), 0.0);
        assert_eq!(glitch_amount(0.25, 0.1), 0.75);
        assert_eq!(glitch_amount(1.0, 0.6), 0.6);
    }

    #[test]
    fn pointer_dims_nearby_cells() {
        assert!((mouse_alpha(0.0) - 0.15).abs() < 1e-6);
        assert_eq!(mouse_alpha(10.0), 1.0);
        assert_eq!(grid_pointer([0.5, 0.5]), [0.0, 0.0]);
        assert_eq!(grid_pointer([1.0, 0.0]), [10.0, -6.5]);
    }

    #[test]
    fn debris_only_lights_selected_particles() {
        assert_eq!(debris_window([0.1, 0.2, 0.3, 0.5], 1.0), 0.0);
        let lit = [0.0, 0.0, 0.0, 0.9];
        assert_eq!(debris_window(lit, 1.0), 1.0);
        assert_eq!(debris_window(lit, 0.0), 0.0);
        assert_eq!(debris_window(lit, 4.0), 0.0);
    }

    #[test]
    fn border_cells_never_activate() {
        for step in 0..20 {
            let random_x = step as f32 / 20.0;
            assert!(!cell_active(random_x, 0.37, [0.0, 0.5]));
        }
        let active = (0..200)
            .filter(|step| cell_active(*step as f32 / 200.0, 0.37, [0.5, 0.5]))
            .count();
        assert!(active > 150);
    }

    #[test]
    fn cell_alpha_is_zero_before_reveal() {
        assert_eq!(cell_alpha([0.5, 0.5], 1.0, 1.0, 0.0, 0.0), 0.0);
        let shown = cell_alpha([0.5, 0.5], 1.0, 1.0, 1.0, 0.0);
        assert!((shown - 0.8).abs() < 1e-6);
    }
}
