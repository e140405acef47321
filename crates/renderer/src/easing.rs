//! GLSL scalar built-ins and the prelude hash, restated for the CPU.
//!
//! Only `smoothstep` feeds runtime state; the rest back the test-only shader
//! restatements in `fragments` and `ambient`.

/// Hermite smoothstep. Edges may be given in descending order to produce the
/// mirrored ramp.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let span = edge1 - edge0;
    if span.abs() <= f32::EPSILON {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / span).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// GLSL `step(edge, x)`.
#[cfg(test)]
pub fn step(edge: f32, x: f32) -> f32 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

#[cfg(test)]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Sine hash used by every layer for per-instance pseudo-randomness.
#[cfg(test)]
pub fn hash(n: f32) -> f32 {
    fract(n.sin() * 43_758.547)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_matches_expected_values() {
        assert!((smoothstep(0.0, 1.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((smoothstep(0.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
        assert_eq!(smoothstep(0.2, 0.4, -3.0), 0.0);
        assert_eq!(smoothstep(0.2, 0.4, 3.0), 1.0);
    }

    #[test]
    fn descending_edges_mirror_the_ramp() {
        for step in 0..=10 {
            let x = step as f32 / 10.0;
            let mirrored = smoothstep(1.0, 0.9, x);
            let expected = 1.0 - smoothstep(0.9, 1.0, x);
            assert!((mirrored - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn hash_stays_in_unit_interval() {
        for i in 0..1_000 {
            let value = hash(i as f32 * 0.37 - 40.0);
            assert!((0.0..1.0).contains(&value), "hash({i}) = {value}");
        }
    }

    #[test]
    fn step_is_inclusive_at_edge() {
        assert_eq!(step(0.5, 0.5), 1.0);
        assert_eq!(step(0.5, 0.49), 0.0);
    }
}
