//! Core types shared by the geometry solver

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A 2D point on the formboard layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate this point around the origin by an angle in degrees.
    ///
    /// Uses the standard counter-clockwise rotation matrix:
    /// ```text
    /// x' = x * cos(θ) - y * sin(θ)
    /// y' = x * sin(θ) + y * cos(θ)
    /// ```
    pub fn rotated_deg(&self, degrees: f64) -> Point {
        let radians = degrees.to_radians();
        let cos_a = radians.cos();
        let sin_a = radians.sin();
        Point {
            x: self.x * cos_a - self.y * sin_a,
            y: self.x * sin_a + self.y * cos_a,
        }
    }
}

/// An absolute placement on the master layout: position plus rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees, normalized to [0, 360) by the resolver
    pub rotation: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }

    /// The fixed global root frame (0, 0, 0°)
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Normalize an angle in degrees to the [0, 360) range
pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Round a value to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Per-pass mutable state threaded through the topology builder: the
/// sequence behind auto-generated segment names and the seedable rng
/// behind placeholder geometry.
///
/// A fresh context is created at the start of every solve pass, so no
/// process-wide counters or global rng state survive between passes.
#[derive(Debug)]
pub struct BuildContext {
    rng: StdRng,
    sequences: HashMap<String, u32>,
}

impl BuildContext {
    /// Create a context with a deterministic rng seed.
    ///
    /// Seeded runs make the builder's placeholder geometry reproducible,
    /// which tests rely on.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sequences: HashMap::new(),
        }
    }

    /// Placeholder length for an auto-generated segment. A degenerate
    /// range (min >= max) falls back to min rather than sampling an
    /// empty interval.
    pub fn random_length(&mut self, range: (f64, f64)) -> f64 {
        if range.1 <= range.0 {
            return range.0;
        }
        self.rng.random_range(range.0..range.1)
    }

    /// Placeholder angle in degrees for an auto-generated segment
    pub fn random_angle(&mut self) -> f64 {
        self.rng.random_range(0.0..360.0)
    }

    /// Next free name of the form `{prefix}{n}`, skipping names the
    /// caller reports as taken. Each prefix gets its own sequence.
    pub fn next_name(&mut self, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
        let seq = self.sequences.entry(prefix.to_string()).or_insert(1);
        loop {
            let candidate = format!("{}{}", prefix, *seq);
            *seq += 1;
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_rotated_deg_quarter_turn() {
        let p = Point::new(1.0, 0.0).rotated_deg(90.0);
        assert!(approx_eq(p.x, 0.0), "x: expected 0.0, got {}", p.x);
        assert!(approx_eq(p.y, 1.0), "y: expected 1.0, got {}", p.y);
    }

    #[test]
    fn test_rotated_deg_identity() {
        let p = Point::new(3.0, 4.0).rotated_deg(0.0);
        assert!(approx_eq(p.x, 3.0));
        assert!(approx_eq(p.y, 4.0));
    }

    #[test]
    fn test_normalize_degrees() {
        assert!(approx_eq(normalize_degrees(0.0), 0.0));
        assert!(approx_eq(normalize_degrees(360.0), 0.0));
        assert!(approx_eq(normalize_degrees(-90.0), 270.0));
        assert!(approx_eq(normalize_degrees(450.0), 90.0));
    }

    #[test]
    fn test_round_to_two_places() {
        assert!(approx_eq(round_to(1.004999, 2), 1.0));
        assert!(approx_eq(round_to(1.005001, 2), 1.01));
        assert!(approx_eq(round_to(-2.676, 2), -2.68));
    }

    #[test]
    fn test_build_context_deterministic() {
        let mut a = BuildContext::new(42);
        let mut b = BuildContext::new(42);
        assert_eq!(a.random_angle(), b.random_angle());
        assert_eq!(a.random_length((1.0, 20.0)), b.random_length((1.0, 20.0)));
    }

    #[test]
    fn test_random_length_degenerate_range_does_not_panic() {
        let mut ctx = BuildContext::new(0);
        assert_eq!(ctx.random_length((5.0, 5.0)), 5.0);
        assert_eq!(ctx.random_length((20.0, 1.0)), 20.0);
    }

    #[test]
    fn test_next_name_skips_taken() {
        let mut ctx = BuildContext::new(0);
        let name = ctx.next_name("S", |n| n == "S1" || n == "S2");
        assert_eq!(name, "S3");
        let name = ctx.next_name("S", |_| false);
        assert_eq!(name, "S4");
    }
}
