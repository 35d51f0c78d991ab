//! Geometrische Abtastung starrer Körper.
//!
//! Dieses Modul erzeugt die lokale Punktmenge eines Körpers (exakt als dichtes Netz
//! oder analytisch über wenige charakteristische Punkte) und bildet sie mit einer
//! `Pose` in Weltkoordinaten ab. Alle Funktionen sind frei von Seiteneffekten.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::model::{
    BodyProfile, HandleProfile, Pose, RigidBody, ValidationError, validate_dimension,
};
use crate::types::Point3;

/// Kleinste erlaubte Anzahl an Winkelschritten pro Kreis.
pub const MIN_SEGMENTS: usize = 4;

const WALL_LEVELS: usize = 8;
const HANDLE_ARC_STEPS: usize = 12;
const HANDLE_TUBE_STEPS: usize = 8;

/// Art der Abtastung eines Körpers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// Jeder Vertex eines dichten Oberflächennetzes.
    Exact,
    /// Randkreise oben und unten plus Griffspitze.
    #[default]
    Analytic,
}

impl SamplingStrategy {
    pub fn code(&self) -> &'static str {
        match self {
            SamplingStrategy::Exact => "exact",
            SamplingStrategy::Analytic => "analytic",
        }
    }
}

/// Transformiert einen lokalen Punkt in Weltkoordinaten.
///
/// Erst Drehung um die Hochachse um `pose.rotation`, danach Verschiebung um
/// `pose.position` auf allen drei Achsen.
///
/// # Beispiel
/// ```
/// use fit_check::geometry::transform_point;
/// use fit_check::model::Pose;
/// use fit_check::types::Point3;
///
/// let pose = Pose::new(Point3::new(4.0, 0.0, 0.0), 0.0);
/// assert_eq!(transform_point(Point3::new(1.0, 2.0, 0.0), pose), Point3::new(5.0, 2.0, 0.0));
/// ```
#[inline]
pub fn transform_point(local: Point3, pose: Pose) -> Point3 {
    local.rotated_about_y(pose.rotation) + pose.position
}

/// Liefert die Weltpunkte eines Körpers für eine Pose.
///
/// Die Sequenz ist lazy, endlich und kann beliebig oft neu gestartet werden
/// (`Clone`). Ein Körper ohne Vertices ergibt eine leere Sequenz.
pub fn world_points(body: &RigidBody, pose: Pose) -> impl Iterator<Item = Point3> + Clone + '_ {
    body.local_vertices()
        .iter()
        .map(move |vertex| transform_point(*vertex, pose))
}

/// Wie [`world_points`], aber als fertiger Vektor (z. B. für Debug-Overlays).
pub fn collect_world_points(body: &RigidBody, pose: Pose) -> Vec<Point3> {
    world_points(body, pose).collect()
}

/// Beschreibung einer Tasse: Zylinder mit optionalem Henkel.
///
/// # Felder
/// * `radius` - Radius des Zylinders
/// * `height` - Gesamthöhe
/// * `handle` - Henkel, gemessen von der Zylinderachse entlang lokal +x
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CupProfile {
    radius: f64,
    height: f64,
    handle: Option<HandleProfile>,
}

impl CupProfile {
    pub const DEFAULT_RADIUS: f64 = 4.0;
    pub const DEFAULT_HEIGHT: f64 = 9.5;
    pub const DEFAULT_HANDLE_OFFSET: f64 = 4.25;
    pub const DEFAULT_HANDLE_HALF_THICKNESS: f64 = 0.5;

    /// Erstellt ein Profil nach Validierung der Maße.
    ///
    /// Die Griffspitze darf nicht innerhalb des Zylinders liegen.
    pub fn new(
        radius: f64,
        height: f64,
        handle: Option<HandleProfile>,
    ) -> Result<Self, ValidationError> {
        validate_dimension(radius, "Cup radius")?;
        validate_dimension(height, "Cup height")?;
        if let Some(handle) = handle {
            validate_dimension(handle.offset, "Handle offset")?;
            validate_dimension(handle.half_thickness, "Handle half thickness")?;
            if handle.offset < radius {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "Handle offset {} lies inside the cup radius {}",
                    handle.offset, radius
                )));
            }
        }
        Ok(Self {
            radius,
            height,
            handle,
        })
    }

    /// Zylinder ohne Henkel.
    pub fn cylinder(radius: f64, height: f64) -> Result<Self, ValidationError> {
        Self::new(radius, height, None)
    }

    /// Analytischer Fußabdruck für die geschlossene Auswertung.
    pub fn body_profile(&self) -> BodyProfile {
        BodyProfile {
            radius: self.radius,
            handle: self.handle,
        }
    }

    /// Tastet die Tasse ab und liefert einen starren Körper.
    ///
    /// Der Körper trägt immer auch das analytische Profil, unabhängig von der
    /// gewählten Abtastung.
    pub fn sample(&self, strategy: SamplingStrategy, segments: usize) -> RigidBody {
        let segments = segments.max(MIN_SEGMENTS);
        let vertices = match strategy {
            SamplingStrategy::Exact => self.exact_vertices(segments),
            SamplingStrategy::Analytic => self.analytic_vertices(segments),
        };
        RigidBody::from_validated(vertices, self.height).with_profile(self.body_profile())
    }

    fn handle_mid_height(&self) -> f64 {
        self.height / 2.0
    }

    /// Wand als Ringe auf mehreren Höhen, Bodenmitte und Henkel als Halbtorus.
    fn exact_vertices(&self, segments: usize) -> Vec<Point3> {
        let mut vertices = Vec::with_capacity(
            segments * (WALL_LEVELS + 1) + 1 + (HANDLE_ARC_STEPS + 1) * HANDLE_TUBE_STEPS,
        );

        for level in 0..=WALL_LEVELS {
            let y = self.height * level as f64 / WALL_LEVELS as f64;
            vertices.extend(circle(Point3::new(0.0, y, 0.0), self.radius, segments));
        }
        vertices.push(Point3::zero());

        if let Some(handle) = self.handle {
            let ring_radius = handle.offset - self.radius;
            let mid = self.handle_mid_height();
            for step in 0..=HANDLE_ARC_STEPS {
                // Äußere Hälfte des Rings, von unten nach oben.
                let phi = -FRAC_PI_2 + PI * step as f64 / HANDLE_ARC_STEPS as f64;
                let (sin_phi, cos_phi) = phi.sin_cos();
                let ring = Point3::new(
                    self.radius + ring_radius * cos_phi,
                    mid + ring_radius * sin_phi,
                    0.0,
                );
                for tube in 0..HANDLE_TUBE_STEPS {
                    let psi = TAU * tube as f64 / HANDLE_TUBE_STEPS as f64;
                    let (sin_psi, cos_psi) = psi.sin_cos();
                    let t = handle.half_thickness;
                    vertices.push(
                        ring + Point3::new(t * cos_psi * cos_phi, t * cos_psi * sin_phi, t * sin_psi),
                    );
                }
            }
        }

        vertices
    }

    /// Randkreise oben und unten plus Kreis um die Griffspitze.
    fn analytic_vertices(&self, segments: usize) -> Vec<Point3> {
        let mut vertices = Vec::with_capacity(segments * 3);
        vertices.extend(circle(Point3::zero(), self.radius, segments));
        vertices.extend(circle(Point3::new(0.0, self.height, 0.0), self.radius, segments));

        if let Some(handle) = self.handle {
            let tip = Point3::new(handle.offset, self.handle_mid_height(), 0.0);
            vertices.extend(circle(tip, handle.half_thickness, segments));
        }

        vertices
    }
}

impl Default for CupProfile {
    fn default() -> Self {
        Self {
            radius: Self::DEFAULT_RADIUS,
            height: Self::DEFAULT_HEIGHT,
            handle: Some(HandleProfile {
                offset: Self::DEFAULT_HANDLE_OFFSET,
                half_thickness: Self::DEFAULT_HANDLE_HALF_THICKNESS,
            }),
        }
    }
}

/// Horizontaler Kreis um `center`, beginnend bei lokal +x.
///
/// Bei einer durch 4 teilbaren Schrittzahl liegen die Achsenextreme exakt auf dem Kreis.
fn circle(center: Point3, radius: f64, segments: usize) -> impl Iterator<Item = Point3> {
    (0..segments).map(move |i| {
        let angle = TAU * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        center + Point3::new(radius * cos, 0.0, radius * sin)
    })
}
