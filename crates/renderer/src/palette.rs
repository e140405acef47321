//! Per-slide ambient palette extraction.
//!
//! A slide's image is reduced to a 20x20 sample grid and four corner
//! windows are averaged into the colours that tint the background, dust and
//! cube layers. Extraction is pure; [`PaletteRequests`] only decides where
//! it runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::color::{Hsl, Rgb};

pub const SAMPLE_GRID: u32 = 20;
/// Quadrant windows as half-open ranges on the sample grid.
const NEAR: (u32, u32) = (0, 7);
const FAR: (u32, u32) = (13, 20);

pub const DEFAULT_CORNER_HEX: &str = "#2a3a2a";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub top_left: Rgb,
    pub top_right: Rgb,
    pub bottom_left: Rgb,
    pub bottom_right: Rgb,
}

impl Palette {
    pub fn uniform(color: Rgb) -> Self {
        Self {
            top_left: color,
            top_right: color,
            bottom_left: color,
            bottom_right: color,
        }
    }

    /// Accent colour shared by the single-colour layers.
    pub fn accent(&self) -> Rgb {
        self.top_left
    }

    pub fn lerp(&self, target: &Palette, t: f32) -> Palette {
        Palette {
            top_left: self.top_left.lerp(target.top_left, t),
            top_right: self.top_right.lerp(target.top_right, t),
            bottom_left: self.bottom_left.lerp(target.bottom_left, t),
            bottom_right: self.bottom_right.lerp(target.bottom_right, t),
        }
    }

    pub fn corners(&self) -> [Rgb; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::uniform(Rgb::new(42.0 / 255.0, 58.0 / 255.0, 42.0 / 255.0))
    }
}

/// Computes the corner palette of `image`. Deterministic for a given bitmap.
pub fn extract(image: &RgbaImage) -> Palette {
    let resized;
    let grid = if image.dimensions() == (SAMPLE_GRID, SAMPLE_GRID) {
        image
    } else {
        resized = imageops::resize(image, SAMPLE_GRID, SAMPLE_GRID, FilterType::Triangle);
        &resized
    };

    Palette {
        top_left: quadrant_color(grid, NEAR, NEAR),
        top_right: quadrant_color(grid, FAR, NEAR),
        bottom_left: quadrant_color(grid, NEAR, FAR),
        bottom_right: quadrant_color(grid, FAR, FAR),
    }
}

fn quadrant_color(grid: &RgbaImage, columns: (u32, u32), rows: (u32, u32)) -> Rgb {
    let mut totals = [0.0f64; 3];
    let mut weight_total = 0.0f64;

    for y in rows.0..rows.1 {
        for x in columns.0..columns.1 {
            let [r, g, b, _] = grid.get_pixel(x, y).0;
            let weight = f64::from(pixel_weight(Rgb::from_u8(r, g, b)));
            totals[0] += f64::from(r) * weight;
            totals[1] += f64::from(g) * weight;
            totals[2] += f64::from(b) * weight;
            weight_total += weight;
        }
    }

    if weight_total <= 0.0 {
        return Rgb::BLACK;
    }

    let average = |total: f64| (total / weight_total).round().clamp(0.0, 255.0) as u8;
    let mean = Rgb::from_u8(average(totals[0]), average(totals[1]), average(totals[2]));
    cinematic_boost(mean)
}

/// Favours saturated pixels and suppresses near-black ones.
pub fn pixel_weight(color: Rgb) -> f32 {
    let hsl = color.to_hsl();
    let lightness_gate = if hsl.l > 0.05 { 1.0 } else { 0.1 };
    (hsl.s * 0.5 + 0.5) * lightness_gate
}

/// Saturate by 1.3 (capped at 0.9) and darken to 60% lightness.
pub fn cinematic_boost(color: Rgb) -> Rgb {
    let hsl = color.to_hsl();
    Rgb::from_hsl(Hsl {
        h: hsl.h,
        s: (hsl.s * 1.3).min(0.9),
        l: hsl.l * 0.6,
    })
}

/// Append-only palette store keyed by image identity.
#[derive(Debug, Default)]
pub struct PaletteCache {
    entries: HashMap<PathBuf, Palette>,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, image: &Path) -> Option<&Palette> {
        self.entries.get(image)
    }

    pub fn contains(&self, image: &Path) -> bool {
        self.entries.contains_key(image)
    }

    /// Stores the first palette seen for `image`; later inserts are ignored.
    pub fn insert(&mut self, image: PathBuf, palette: Palette) -> bool {
        if self.entries.contains_key(&image) {
            return false;
        }
        self.entries.insert(image, palette);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where background work (decode, extraction) runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WorkStrategy {
    /// Run on the calling thread; results are visible on the next poll.
    Inline,
    /// Run on a worker thread and deliver through a one-shot channel.
    #[default]
    Threaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaletteResult {
    pub slide: usize,
    pub image: PathBuf,
    pub palette: Palette,
}

enum PaletteFuture {
    Ready(Palette),
    Threaded { receiver: Receiver<Palette> },
}

struct PaletteJob {
    slide: usize,
    image: PathBuf,
    future: PaletteFuture,
}

/// In-flight extraction jobs. Each job resolves at most once; a worker that
/// dies without answering is dropped and never retried.
#[derive(Default)]
pub struct PaletteRequests {
    strategy: WorkStrategy,
    jobs: Vec<PaletteJob>,
}

impl PaletteRequests {
    pub fn new(strategy: WorkStrategy) -> Self {
        Self {
            strategy,
            jobs: Vec::new(),
        }
    }

    pub fn is_pending(&self, image: &Path) -> bool {
        self.jobs.iter().any(|job| job.image == image)
    }

    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    pub fn request(&mut self, slide: usize, image: PathBuf, bitmap: Arc<RgbaImage>) {
        let future = match self.strategy {
            WorkStrategy::Inline => PaletteFuture::Ready(extract(&bitmap)),
            WorkStrategy::Threaded => {
                let (sender, receiver) = bounded(1);
                let spawned = thread::Builder::new()
                    .name("palette-extract".into())
                    .spawn(move || {
                        let _ = sender.send(extract(&bitmap));
                    });
                if let Err(err) = spawned {
                    warn!(slide, error = %err, "failed to spawn palette worker");
                    return;
                }
                PaletteFuture::Threaded { receiver }
            }
        };
        debug!(slide, image = %image.display(), "palette extraction requested");
        self.jobs.push(PaletteJob {
            slide,
            image,
            future,
        });
    }

    /// Drains completed jobs without blocking.
    pub fn poll(&mut self) -> Vec<PaletteResult> {
        let mut finished = Vec::new();
        self.jobs.retain_mut(|job| match &job.future {
            PaletteFuture::Ready(palette) => {
                finished.push(PaletteResult {
                    slide: job.slide,
                    image: job.image.clone(),
                    palette: *palette,
                });
                false
            }
            PaletteFuture::Threaded { receiver } => match receiver.try_recv() {
                Ok(palette) => {
                    finished.push(PaletteResult {
                        slide: job.slide,
                        image: job.image.clone(),
                        palette,
                    });
                    false
                }
                Err(TryRecvError::Empty) => true,
                Err(TryRecvError::Disconnected) => {
                    warn!(
                        slide = job.slide,
                        image = %job.image.display(),
                        "palette worker exited without a result"
                    );
                    false
                }
            },
        });
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgba;
    use std::time::{Duration, Instant};

    fn quadrant_image(tl: [u8; 3], tr: [u8; 3], bl: [u8; 3], br: [u8; 3]) -> RgbaImage {
        RgbaImage::from_fn(SAMPLE_GRID, SAMPLE_GRID, |x, y| {
            let [r, g, b] = match (x < 10, y < 10) {
                (true, true) => tl,
                (false, true) => tr,
                (true, false) => bl,
                (false, false) => br,
            };
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn extraction_is_deterministic() {
        let image = RgbaImage::from_fn(64, 48, |x, y| {
            Rgba([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8, 255])
        });
        assert_eq!(extract(&image), extract(&image));
    }

    #[test]
    fn black_quadrant_stays_black_and_red_is_boosted() {
        let image = quadrant_image([0, 0, 0], [255, 0, 0], [0, 0, 0], [0, 0, 0]);
        let palette = extract(&image);

        assert_eq!(palette.top_left.to_u8(), [0, 0, 0]);

        let red = palette.top_right;
        let hsl = red.to_hsl();
        assert_abs_diff_eq!(hsl.s, 0.9, epsilon = 1e-3);
        assert_abs_diff_eq!(hsl.l, 0.3, epsilon = 1e-3);
        assert_abs_diff_eq!(red.r, 0.57, epsilon = 1e-3);
        assert_abs_diff_eq!(red.g, 0.03, epsilon = 1e-3);
        assert_abs_diff_eq!(red.b, 0.03, epsilon = 1e-3);
    }

    #[test]
    fn dark_pixels_barely_pull_the_average() {
        // left half of the top-left window is near-black, right half is gray
        let image = RgbaImage::from_fn(SAMPLE_GRID, SAMPLE_GRID, |x, _| {
            if x < 3 {
                Rgba([5, 5, 5, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        let palette = extract(&image);
        let plain_mean = (3.0 * 5.0 + 4.0 * 200.0) / 7.0 / 255.0;
        let boosted_plain = cinematic_boost(Rgb::new(plain_mean, plain_mean, plain_mean));
        assert!(palette.top_left.r > boosted_plain.r);
    }

    #[test]
    fn weight_formula_matches_reference_points() {
        assert_abs_diff_eq!(pixel_weight(Rgb::BLACK), 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(pixel_weight(Rgb::new(1.0, 0.0, 0.0)), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pixel_weight(Rgb::new(0.5, 0.5, 0.5)), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn cache_is_append_only() {
        let mut cache = PaletteCache::new();
        let key = PathBuf::from("one.png");
        assert!(cache.insert(key.clone(), Palette::uniform(Rgb::WHITE)));
        assert!(!cache.insert(key.clone(), Palette::uniform(Rgb::BLACK)));
        assert_eq!(cache.get(&key), Some(&Palette::uniform(Rgb::WHITE)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn inline_requests_resolve_on_next_poll() {
        let mut requests = PaletteRequests::new(WorkStrategy::Inline);
        let image = Arc::new(quadrant_image([255, 0, 0], [255, 0, 0], [255, 0, 0], [255, 0, 0]));
        requests.request(3, PathBuf::from("red.png"), image);
        assert!(requests.is_pending(Path::new("red.png")));

        let results = requests.poll();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].slide, 3);
        assert_eq!(requests.pending(), 0);
        assert!(requests.poll().is_empty());
    }

    #[test]
    fn threaded_requests_resolve_exactly_once() {
        let mut requests = PaletteRequests::new(WorkStrategy::Threaded);
        let image = Arc::new(quadrant_image([0, 0, 255], [0, 0, 255], [0, 0, 255], [0, 0, 255]));
        requests.request(0, PathBuf::from("blue.png"), image);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut results = Vec::new();
        while results.is_empty() && Instant::now() < deadline {
            results = requests.poll();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(results.len(), 1);
        assert!(requests.poll().is_empty());
    }

    #[test]
    fn default_palette_matches_hex() {
        let expected = Rgb::from_hex(DEFAULT_CORNER_HEX).unwrap();
        assert_eq!(Palette::default().top_left.to_u8(), expected.to_u8());
    }
}
