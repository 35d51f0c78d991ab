//! Common geometric types for containment checks.
//!
//! All coordinates are centimeters in a right-handed frame with `y` pointing up.
//! The horizontal plane is spanned by `x` (width) and `z` (depth).

use std::ops::{Add, Mul, Sub};

/// Tolerance for boundary comparisons.
///
/// Absorbs rounding from trigonometric rotation so that a point sitting exactly on
/// a wall still counts as contained.
pub const EPSILON_BOUNDARY: f64 = 1e-9;

/// Tolerance for general numerical comparisons in tests and diagnostics.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Represents an immutable point or vector in 3D space.
///
/// # Examples
/// ```
/// use fit_check::types::Point3;
///
/// let position = Point3::new(1.0, 2.0, 3.0);
/// let offset = Point3::new(10.0, 0.0, -3.0);
/// assert_eq!(position + offset, Point3::new(11.0, 2.0, 0.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    ///
    /// # Parameters
    /// * `x` - X component (width axis)
    /// * `y` - Y component (vertical axis)
    /// * `z` - Z component (depth axis)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates the origin.
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Rotates the point about the vertical axis through the origin.
    ///
    /// Uses `x' = x·cos θ − z·sin θ` and `z' = x·sin θ + z·cos θ`, so the local
    /// +x axis ends up at `(cos θ, sin θ)` in the horizontal plane. `y` is untouched.
    #[inline]
    pub fn rotated_about_y(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(
            self.x * cos - self.z * sin,
            self.y,
            self.x * sin + self.z * cos,
        )
    }

    /// Calculates the distance to another point in the horizontal (XZ) plane.
    #[inline]
    pub fn horizontal_distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Checks if all components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Point3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Point3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Point3> for (f64, f64, f64) {
    #[inline]
    fn from(point: Point3) -> Self {
        point.as_tuple()
    }
}

/// Axis-aligned rectangle in the horizontal plane.
///
/// Describes the usable floor of a container. Bounds are inclusive on every side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HorizontalBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl HorizontalBounds {
    /// Creates new bounds.
    #[inline]
    pub const fn new(min_x: f64, max_x: f64, min_z: f64, max_z: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_z,
            max_z,
        }
    }

    /// Moves all four walls inward by `margin`.
    ///
    /// A margin larger than half an extent inverts the bounds; inverted bounds
    /// contain nothing.
    #[inline]
    pub fn shrunk(&self, margin: f64) -> Self {
        Self::new(
            self.min_x + margin,
            self.max_x - margin,
            self.min_z + margin,
            self.max_z - margin,
        )
    }

    /// Checks whether the XZ projection of `point` lies inside the bounds.
    #[inline]
    pub fn contains_xz(&self, point: &Point3, tolerance: f64) -> bool {
        point.x >= self.min_x - tolerance
            && point.x <= self.max_x + tolerance
            && point.z >= self.min_z - tolerance
            && point.z <= self.max_z + tolerance
    }

    /// Returns the center in the horizontal plane as `(x, z)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    /// Half of the extent along x.
    #[inline]
    pub fn half_width(&self) -> f64 {
        (self.max_x - self.min_x) / 2.0
    }

    /// Half of the extent along z.
    #[inline]
    pub fn half_depth(&self) -> f64 {
        (self.max_z - self.min_z) / 2.0
    }
}
