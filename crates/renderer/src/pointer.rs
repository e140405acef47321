use winit::dpi::{PhysicalPosition, PhysicalSize};

/// Raw and smoothed pointer position, both normalised to `[0, 1]` with the
/// origin at the top-left of the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub raw: [f32; 2],
    pub smoothed: [f32; 2],
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            raw: [0.5, 0.5],
            smoothed: [0.5, 0.5],
        }
    }
}

/// Owns pointer input; the only writer of [`PointerState`].
#[derive(Debug, Clone)]
pub struct PointerTracker {
    state: PointerState,
    rate: f32,
}

impl PointerTracker {
    pub fn new(rate: f32) -> Self {
        Self {
            state: PointerState::default(),
            rate: rate.clamp(0.0, 1.0),
        }
    }

    pub fn set_raw(&mut self, x: f32, y: f32) {
        self.state.raw = [sanitize(x), sanitize(y)];
    }

    pub fn set_physical(&mut self, position: PhysicalPosition<f64>, size: PhysicalSize<u32>) {
        let [x, y] = normalize_physical(position, size);
        self.set_raw(x, y);
    }

    /// Moves the smoothed copy one exponential step toward the raw value.
    pub fn tick(&mut self) {
        for axis in 0..2 {
            let current = self.state.smoothed[axis];
            self.state.smoothed[axis] = current + (self.state.raw[axis] - current) * self.rate;
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

pub fn normalize_physical(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> [f32; 2] {
    let width = f64::from(size.width.max(1));
    let height = f64::from(size.height.max(1));
    [
        (position.x / width) as f32,
        (position.y / height) as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_input_is_clamped() {
        let mut tracker = PointerTracker::new(0.1);
        tracker.set_raw(-2.0, 4.0);
        assert_eq!(tracker.state().raw, [0.0, 1.0]);
        tracker.set_raw(f32::NAN, 0.25);
        assert_eq!(tracker.state().raw, [0.5, 0.25]);
    }

    #[test]
    fn smoothed_lags_behind_raw() {
        let mut tracker = PointerTracker::new(0.1);
        tracker.set_raw(1.0, 0.0);
        tracker.tick();
        let state = tracker.state();
        assert!((state.smoothed[0] - 0.55).abs() < 1e-6);
        assert!((state.smoothed[1] - 0.45).abs() < 1e-6);
        assert_ne!(state.smoothed, state.raw);

        for _ in 0..200 {
            tracker.tick();
        }
        let settled = tracker.state();
        assert!((settled.smoothed[0] - 1.0).abs() < 1e-3);
        assert!(settled.smoothed[1].abs() < 1e-3);
    }

    #[test]
    fn physical_positions_normalise_against_window() {
        let size = PhysicalSize::new(800, 400);
        let mut tracker = PointerTracker::new(0.1);
        tracker.set_physical(PhysicalPosition::new(200.0, 300.0), size);
        assert_eq!(tracker.state().raw, [0.25, 0.75]);
    }
}
