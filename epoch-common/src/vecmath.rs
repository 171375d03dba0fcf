use std::ops::{Add, Mul, Sub};

/// A point or displacement in the transverse (x, y) plane, in metres.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Creates a new Vec2.
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Creates a zero vector.
    pub fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    /// Calculates the squared distance to another point.
    pub fn distance_squared(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

/// Straight-line projection of a particle at `position` (on the z = 0 plane)
/// to the plane at `distance` along z.
///
/// Evaluated as `x + (distance * px) / pz`. `pz` must be non-zero; callers
/// are expected to have rejected or filtered such particles.
#[inline(always)]
pub fn ballistic_projection(position: Vec2, px: f64, py: f64, pz: f64, distance: f64) -> Vec2 {
    Vec2 {
        x: position.x + distance * px / pz,
        y: position.y + distance * py / pz,
    }
}
