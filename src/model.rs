//! Data models for the containment check.
//!
//! This module defines the fundamental data structures:
//! - `Pose`: Placement of a rigid body (translation plus yaw)
//! - `RigidBody`: Local-frame vertices and extents of the body to check
//! - `Container`: The open-topped box with its origin convention
//! - `ClearanceMargin`: Required gap between body and walls
//! - `ContainmentVerdict`: The result handed to the display layer
//!
//! Invalid configuration is rejected when the values are constructed, so the
//! evaluator only ever sees well-formed containers and margins.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{HorizontalBounds, Point3};

/// Validation error for configuration data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid margin: {0}")]
    InvalidMargin(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Validates a single extent: positive and finite.
pub(crate) fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Placement of a rigid body in the world.
///
/// The rotation is a yaw angle about the vertical axis in radians. It is kept
/// unbounded; only [`Pose::rotation_degrees`] normalizes it for display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Point3,
    pub rotation: f64,
}

impl Pose {
    /// Creates a new pose.
    #[inline]
    pub const fn new(position: Point3, rotation: f64) -> Self {
        Self { position, rotation }
    }

    /// Creates an unrotated pose at `position`.
    #[inline]
    pub const fn at(position: Point3) -> Self {
        Self::new(position, 0.0)
    }

    /// Creates a pose from a rotation given in degrees, as entered in the UI.
    pub fn from_degrees(position: Point3, degrees: f64) -> Self {
        Self::new(position, degrees.to_radians())
    }

    /// Returns the rotation in degrees, normalized into `[0, 360)`.
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees().rem_euclid(360.0)
    }

    /// Returns a copy with a different position.
    pub fn with_position(self, position: Point3) -> Self {
        Self { position, ..self }
    }

    /// Returns a copy with a different rotation (radians).
    pub fn with_rotation(self, rotation: f64) -> Self {
        Self { rotation, ..self }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Point3::zero())
    }
}

/// Where the container's coordinate origin sits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OriginConvention {
    /// x ∈ [−W/2, W/2], z ∈ [−D/2, D/2], y ∈ [0, H].
    #[default]
    Centered,
    /// x ∈ [0, W], z ∈ [0, D], y ∈ [0, H].
    CornerAnchored,
}

impl OriginConvention {
    pub fn code(&self) -> &'static str {
        match self {
            OriginConvention::Centered => "centered",
            OriginConvention::CornerAnchored => "corner_anchored",
        }
    }
}

/// Open-topped, axis-aligned container.
///
/// # Fields
/// * `width` - Extent along x
/// * `height` - Extent along y (wall height)
/// * `depth` - Extent along z
/// * `origin` - Origin convention used to place the walls
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Container {
    width: f64,
    height: f64,
    depth: f64,
    origin: OriginConvention,
}

impl Container {
    /// Creates a container after validating its extents.
    ///
    /// # Parameters
    /// * `dims` - Extents as (width, height, depth)
    /// * `origin` - Origin convention
    ///
    /// # Examples
    /// ```
    /// use fit_check::model::{Container, OriginConvention};
    ///
    /// assert!(Container::new((15.0, 10.0, 15.0), OriginConvention::Centered).is_ok());
    /// assert!(Container::new((15.0, 0.0, 15.0), OriginConvention::Centered).is_err());
    /// ```
    pub fn new(dims: (f64, f64, f64), origin: OriginConvention) -> Result<Self, ValidationError> {
        validate_dimension(dims.0, "Container width")?;
        validate_dimension(dims.1, "Container height")?;
        validate_dimension(dims.2, "Container depth")?;
        Ok(Self {
            width: dims.0,
            height: dims.1,
            depth: dims.2,
            origin,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn origin(&self) -> OriginConvention {
        self.origin
    }

    /// Extents as (width, height, depth).
    pub fn dims(&self) -> (f64, f64, f64) {
        (self.width, self.height, self.depth)
    }

    /// Returns a container with the same origin convention and new extents.
    pub fn resized(&self, dims: (f64, f64, f64)) -> Result<Self, ValidationError> {
        Self::new(dims, self.origin)
    }

    /// Horizontal floor bounds in world coordinates.
    pub fn bounds(&self) -> HorizontalBounds {
        match self.origin {
            OriginConvention::Centered => HorizontalBounds::new(
                -self.width / 2.0,
                self.width / 2.0,
                -self.depth / 2.0,
                self.depth / 2.0,
            ),
            OriginConvention::CornerAnchored => {
                HorizontalBounds::new(0.0, self.width, 0.0, self.depth)
            }
        }
    }

    /// Center of the floor in world coordinates.
    pub fn floor_center(&self) -> Point3 {
        let (x, z) = self.bounds().center();
        Point3::new(x, 0.0, z)
    }
}

/// Required clearance between a body and the container walls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClearanceMargin(f64);

impl ClearanceMargin {
    pub const ZERO: Self = Self(0.0);

    /// Creates a margin; negative or non-finite values are rejected.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value < 0.0 || !value.is_finite() {
            return Err(ValidationError::InvalidMargin(format!(
                "Clearance margin must be zero or positive, got: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Handle of a cup-like body, described by its outermost point.
///
/// # Fields
/// * `offset` - Horizontal distance from the body axis to the handle tip along local +x
/// * `half_thickness` - Half of the handle's thickness around the tip
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleProfile {
    pub offset: f64,
    pub half_thickness: f64,
}

/// Closed-form footprint of a body: a vertical cylinder plus an optional handle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyProfile {
    pub radius: f64,
    pub handle: Option<HandleProfile>,
}

/// Rigid body with a fixed local vertex set.
///
/// The vertex set never changes after construction; only the body's `Pose` does.
/// An empty vertex set means the geometry is not ready yet and always yields a
/// negative verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    vertices: Vec<Point3>,
    height: f64,
    profile: Option<BodyProfile>,
}

impl RigidBody {
    /// Creates a body from local vertices and its overall height.
    pub fn new(vertices: Vec<Point3>, height: f64) -> Result<Self, ValidationError> {
        validate_dimension(height, "Body height")?;
        Ok(Self {
            vertices,
            height,
            profile: None,
        })
    }

    /// Skips validation for heights already checked by the caller.
    pub(crate) fn from_validated(vertices: Vec<Point3>, height: f64) -> Self {
        Self {
            vertices,
            height,
            profile: None,
        }
    }

    /// Attaches the analytic footprint used by the closed-form evaluation.
    pub fn with_profile(mut self, profile: BodyProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn local_vertices(&self) -> &[Point3] {
        &self.vertices
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn profile(&self) -> Option<&BodyProfile> {
        self.profile.as_ref()
    }

    /// `false` while the body has no sampled vertices.
    pub fn is_ready(&self) -> bool {
        !self.vertices.is_empty()
    }
}

/// Why a verdict came out the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitReason {
    Fits,
    Inactive,
    TooTall,
    NoGeometry,
    BodyOutOfBounds,
    HandleOutOfBounds,
    PointOutOfBounds,
    BelowFloorOrAboveRim,
}

impl FitReason {
    pub fn code(&self) -> &'static str {
        match self {
            FitReason::Fits => "fits",
            FitReason::Inactive => "inactive",
            FitReason::TooTall => "too_tall",
            FitReason::NoGeometry => "no_geometry",
            FitReason::BodyOutOfBounds => "body_out_of_bounds",
            FitReason::HandleOutOfBounds => "handle_out_of_bounds",
            FitReason::PointOutOfBounds => "point_out_of_bounds",
            FitReason::BelowFloorOrAboveRim => "below_floor_or_above_rim",
        }
    }

    #[inline]
    pub fn fits(&self) -> bool {
        matches!(self, FitReason::Fits)
    }
}

impl std::fmt::Display for FitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitReason::Fits => write!(f, "Body fits inside the container"),
            FitReason::Inactive => write!(f, "Containment check is not active"),
            FitReason::TooTall => write!(f, "Body is taller than the container walls"),
            FitReason::NoGeometry => write!(f, "No body geometry available yet"),
            FitReason::BodyOutOfBounds => {
                write!(f, "Body footprint crosses a container wall")
            }
            FitReason::HandleOutOfBounds => write!(f, "Handle crosses a container wall"),
            FitReason::PointOutOfBounds => {
                write!(f, "At least one surface point lies outside the container")
            }
            FitReason::BelowFloorOrAboveRim => {
                write!(f, "Body reaches below the floor or above the rim")
            }
        }
    }
}

/// Containment verdict as shown by the display layer.
///
/// # Fields
/// * `fits` - `true` only for [`FitReason::Fits`]
/// * `reason` - Diagnostic reason
/// * `evaluated_at` - Milliseconds since the Unix epoch of the evaluation that produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainmentVerdict {
    pub fits: bool,
    pub reason: FitReason,
    pub evaluated_at: u64,
}

impl ContainmentVerdict {
    pub fn new(reason: FitReason, evaluated_at: u64) -> Self {
        Self {
            fits: reason.fits(),
            reason,
            evaluated_at,
        }
    }

    /// The verdict before anything has been evaluated.
    pub fn unknown() -> Self {
        Self::new(FitReason::NoGeometry, 0)
    }
}
