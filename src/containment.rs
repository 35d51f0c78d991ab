//! Containment verification.
//!
//! Decides whether a body lies entirely inside an open-topped container while keeping
//! the required clearance to every wall. Two evaluation strategies exist:
//! - `PointSet`: every sampled world point is checked against the shrunk floor
//!   bounds. This is the reference semantics.
//! - `ClosedForm`: O(1) checks on the body radius and the handle tip. Bodies
//!   without an analytic profile fall back to `PointSet`.
//!
//! `ThrottledEvaluator` wraps the evaluator with a minimum interval between commits
//! so that bursts of intermediate states do not make the verdict flicker.

use std::time::Duration;

use tracing::{debug, trace};

use crate::geometry::world_points;
use crate::model::{
    BodyProfile, ClearanceMargin, Container, ContainmentVerdict, FitReason, OriginConvention,
    Pose, RigidBody,
};
use crate::throttle::RateLimiter;
use crate::types::{EPSILON_BOUNDARY, Point3};

/// How the verdict is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvaluationStrategy {
    PointSet,
    #[default]
    ClosedForm,
}

impl EvaluationStrategy {
    pub fn code(&self) -> &'static str {
        match self {
            EvaluationStrategy::PointSet => "point_set",
            EvaluationStrategy::ClosedForm => "closed_form",
        }
    }
}

/// Configuration for the containment check.
///
/// Selects one of the evaluation variants at construction time.
#[derive(Copy, Clone, Debug)]
pub struct ContainmentConfig {
    /// Origin convention used for containers built from this configuration
    pub origin: OriginConvention,
    /// Clearance subtracted from every horizontal wall
    pub margin: ClearanceMargin,
    pub strategy: EvaluationStrategy,
    /// Minimum time between two committed evaluations
    pub min_interval: Duration,
    /// Additionally require every point to stay within [0, H]
    pub check_vertical: bool,
}

impl ContainmentConfig {
    pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_CHECK_VERTICAL: bool = true;

    pub fn builder() -> ContainmentConfigBuilder {
        ContainmentConfigBuilder::default()
    }
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self {
            origin: OriginConvention::default(),
            margin: ClearanceMargin::ZERO,
            strategy: EvaluationStrategy::default(),
            min_interval: Duration::from_millis(Self::DEFAULT_MIN_INTERVAL_MS),
            check_vertical: Self::DEFAULT_CHECK_VERTICAL,
        }
    }
}

/// Builder for `ContainmentConfig`.
#[derive(Clone, Debug, Default)]
pub struct ContainmentConfigBuilder {
    config: ContainmentConfig,
}

impl ContainmentConfigBuilder {
    pub fn origin(mut self, origin: OriginConvention) -> Self {
        self.config.origin = origin;
        self
    }

    pub fn margin(mut self, margin: ClearanceMargin) -> Self {
        self.config.margin = margin;
        self
    }

    pub fn strategy(mut self, strategy: EvaluationStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.config.min_interval = interval;
        self
    }

    pub fn check_vertical(mut self, enabled: bool) -> Self {
        self.config.check_vertical = enabled;
        self
    }

    pub fn build(self) -> ContainmentConfig {
        self.config
    }
}

#[inline]
fn exceeds_height(body_height: f64, container: &Container) -> bool {
    // Exact comparison; a NaN height is rejected as well.
    !(body_height <= container.height())
}

#[inline]
fn within_vertical(y: f64, container: &Container) -> bool {
    y >= -EPSILON_BOUNDARY && y <= container.height() + EPSILON_BOUNDARY
}

/// Checks a world-space point set against the container.
///
/// The body fits only if every single point lies inside the floor bounds shrunk
/// by `margin`; bounds are inclusive. A body taller than the walls or an empty
/// point set never fits.
///
/// # Parameters
/// * `points` - World-space points of the body
/// * `container` - Target container
/// * `margin` - Required clearance to the walls
/// * `body_height` - Overall height of the body
/// * `check_vertical` - Also require every `y` to lie within `[0, H]`
pub fn check_points<I>(
    points: I,
    container: &Container,
    margin: ClearanceMargin,
    body_height: f64,
    check_vertical: bool,
) -> FitReason
where
    I: IntoIterator<Item = Point3>,
{
    if exceeds_height(body_height, container) {
        return FitReason::TooTall;
    }

    let bounds = container.bounds().shrunk(margin.value());
    let mut seen_any = false;
    for point in points {
        seen_any = true;
        if !bounds.contains_xz(&point, EPSILON_BOUNDARY) {
            return FitReason::PointOutOfBounds;
        }
        if check_vertical && !within_vertical(point.y, container) {
            return FitReason::BelowFloorOrAboveRim;
        }
    }

    if seen_any {
        FitReason::Fits
    } else {
        FitReason::NoGeometry
    }
}

/// Closed-form check for a cylinder with an optional handle.
///
/// Body: `|x − cx| + r ≤ W/2 − margin` and `|z − cz| + r ≤ D/2 − margin`.
/// Handle tip at `(x + h·cos θ, z + h·sin θ)` with half-thickness `t`:
/// `|hx − cx| + t ≤ W/2 − margin` and `|hz − cz| + t ≤ D/2 − margin`.
/// `(cx, cz)` is the floor center of the container's origin convention.
pub fn check_closed_form(
    pose: Pose,
    profile: &BodyProfile,
    body_height: f64,
    container: &Container,
    margin: ClearanceMargin,
    check_vertical: bool,
) -> FitReason {
    if exceeds_height(body_height, container) {
        return FitReason::TooTall;
    }

    let bounds = container.bounds().shrunk(margin.value());
    let (cx, cz) = bounds.center();
    let half_width = bounds.half_width();
    let half_depth = bounds.half_depth();
    let inside = |x: f64, z: f64, extent: f64| {
        (x - cx).abs() + extent <= half_width + EPSILON_BOUNDARY
            && (z - cz).abs() + extent <= half_depth + EPSILON_BOUNDARY
    };

    let Point3 { x, y, z } = pose.position;
    if !inside(x, z, profile.radius) {
        return FitReason::BodyOutOfBounds;
    }

    if let Some(handle) = profile.handle {
        let (sin, cos) = pose.rotation.sin_cos();
        let handle_x = x + handle.offset * cos;
        let handle_z = z + handle.offset * sin;
        if !inside(handle_x, handle_z, handle.half_thickness) {
            return FitReason::HandleOutOfBounds;
        }
    }

    if check_vertical
        && !(within_vertical(y, container) && within_vertical(y + body_height, container))
    {
        return FitReason::BelowFloorOrAboveRim;
    }

    FitReason::Fits
}

/// Stateless evaluator configured with one `ContainmentConfig`.
#[derive(Clone, Debug, Default)]
pub struct ContainmentEvaluator {
    config: ContainmentConfig,
}

impl ContainmentEvaluator {
    pub fn new(config: ContainmentConfig) -> Self {
        Self { config }
    }

    /// Computes the reason for the given configuration without any throttling.
    ///
    /// An inactive check never reports a fit.
    pub fn assess(
        &self,
        body: &RigidBody,
        pose: Pose,
        container: &Container,
        active: bool,
    ) -> FitReason {
        if !active {
            return FitReason::Inactive;
        }
        if exceeds_height(body.height(), container) {
            return FitReason::TooTall;
        }
        if !body.is_ready() {
            return FitReason::NoGeometry;
        }

        let margin = self.config.margin;
        let check_vertical = self.config.check_vertical;
        match (self.config.strategy, body.profile()) {
            (EvaluationStrategy::ClosedForm, Some(profile)) => {
                check_closed_form(pose, profile, body.height(), container, margin, check_vertical)
            }
            _ => check_points(
                world_points(body, pose),
                container,
                margin,
                body.height(),
                check_vertical,
            ),
        }
    }

    /// Like [`ContainmentEvaluator::assess`], stamped with `now`.
    pub fn evaluate(
        &self,
        body: &RigidBody,
        pose: Pose,
        container: &Container,
        active: bool,
        now: u64,
    ) -> ContainmentVerdict {
        ContainmentVerdict::new(self.assess(body, pose, container, active), now)
    }
}

/// Outcome of a throttled submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The request was evaluated and its verdict is now current.
    Committed(ContainmentVerdict),
    /// The request arrived too early and was dropped; the previous verdict stays current.
    Suppressed(ContainmentVerdict),
}

impl Submission {
    pub fn verdict(&self) -> ContainmentVerdict {
        match self {
            Submission::Committed(verdict) | Submission::Suppressed(verdict) => *verdict,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Submission::Committed(_))
    }
}

/// Evaluator with a minimum interval between committed evaluations.
///
/// Holds the only mutable state of the engine: the timestamp of the last commit
/// and the verdict it produced. Assumes a single writer.
#[derive(Clone, Debug)]
pub struct ThrottledEvaluator {
    evaluator: ContainmentEvaluator,
    limiter: RateLimiter,
    current: ContainmentVerdict,
}

impl ThrottledEvaluator {
    pub fn new(config: ContainmentConfig) -> Self {
        Self {
            evaluator: ContainmentEvaluator::new(config),
            limiter: RateLimiter::new(config.min_interval),
            current: ContainmentVerdict::unknown(),
        }
    }

    /// The verdict currently shown.
    pub fn current(&self) -> ContainmentVerdict {
        self.current
    }

    /// Time left until the next submission would be evaluated.
    pub fn remaining(&self, now: u64) -> Duration {
        self.limiter.remaining(now)
    }

    /// Submits the latest configuration.
    ///
    /// Inactive submissions resolve to `Inactive` immediately and leave the interval
    /// untouched. Active submissions inside the interval are dropped.
    pub fn submit(
        &mut self,
        body: &RigidBody,
        pose: Pose,
        container: &Container,
        active: bool,
        now: u64,
    ) -> Submission {
        if !active {
            self.current = ContainmentVerdict::new(FitReason::Inactive, now);
            return Submission::Committed(self.current);
        }

        if !self.limiter.try_acquire(now) {
            trace!(
                now,
                remaining_ms = self.limiter.remaining(now).as_millis() as u64,
                "containment evaluation suppressed"
            );
            return Submission::Suppressed(self.current);
        }

        self.current = self.evaluator.evaluate(body, pose, container, true, now);
        debug!(
            fits = self.current.fits,
            reason = self.current.reason.code(),
            now,
            "containment evaluation committed"
        );
        Submission::Committed(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CupProfile, SamplingStrategy};
    use crate::model::HandleProfile;

    fn centered(dims: (f64, f64, f64)) -> Container {
        Container::new(dims, OriginConvention::Centered).unwrap()
    }

    fn cylinder() -> RigidBody {
        CupProfile::cylinder(4.0, 9.5)
            .unwrap()
            .sample(SamplingStrategy::Exact, 32)
    }

    fn cup() -> RigidBody {
        CupProfile::default().sample(SamplingStrategy::Exact, 32)
    }

    fn evaluator(strategy: EvaluationStrategy) -> ContainmentEvaluator {
        ContainmentEvaluator::new(ContainmentConfig::builder().strategy(strategy).build())
    }

    const STRATEGIES: [EvaluationStrategy; 2] =
        [EvaluationStrategy::PointSet, EvaluationStrategy::ClosedForm];

    #[test]
    fn scenario_a_centered_cylinder_fits() {
        for strategy in STRATEGIES {
            let reason = evaluator(strategy).assess(
                &cylinder(),
                Pose::default(),
                &centered((15.0, 10.0, 15.0)),
                true,
            );
            assert_eq!(reason, FitReason::Fits, "{:?}", strategy);
        }
    }

    #[test]
    fn scenario_b_low_walls_reject_by_height() {
        for strategy in STRATEGIES {
            let reason = evaluator(strategy).assess(
                &cylinder(),
                Pose::default(),
                &centered((15.0, 9.0, 15.0)),
                true,
            );
            assert_eq!(reason, FitReason::TooTall, "{:?}", strategy);
        }
    }

    #[test]
    fn scenario_c_offset_body_crosses_wall() {
        let pose = Pose::at(Point3::new(6.0, 0.0, 0.0));
        let container = centered((15.0, 10.0, 15.0));

        assert_eq!(
            evaluator(EvaluationStrategy::ClosedForm).assess(&cylinder(), pose, &container, true),
            FitReason::BodyOutOfBounds
        );
        assert_eq!(
            evaluator(EvaluationStrategy::PointSet).assess(&cylinder(), pose, &container, true),
            FitReason::PointOutOfBounds
        );
    }

    #[test]
    fn scenario_d_handle_pointing_at_wall_does_not_fit() {
        // At x = 4 the rim already reaches 8 > 7.5, so the body is rejected before
        // the handle is looked at.
        let pose = Pose::at(Point3::new(4.0, 0.0, 0.0));
        let container = centered((15.0, 10.0, 15.0));

        assert_eq!(
            evaluator(EvaluationStrategy::ClosedForm).assess(&cup(), pose, &container, true),
            FitReason::BodyOutOfBounds
        );
        assert_eq!(
            evaluator(EvaluationStrategy::PointSet).assess(&cup(), pose, &container, true),
            FitReason::PointOutOfBounds
        );
    }

    #[test]
    fn height_check_has_no_tolerance() {
        let container = centered((15.0, 10.0, 15.0));
        let body = CupProfile::cylinder(4.0, 10.0 + 5e-10)
            .unwrap()
            .sample(SamplingStrategy::Exact, 32);
        let lenient = ContainmentConfig::builder().check_vertical(false);
        for strategy in STRATEGIES {
            let evaluator = ContainmentEvaluator::new(lenient.clone().strategy(strategy).build());
            assert_eq!(
                evaluator.assess(&body, Pose::default(), &container, true),
                FitReason::TooTall,
                "{:?}",
                strategy
            );
        }
        assert_eq!(
            check_points(
                vec![Point3::zero()],
                &container,
                ClearanceMargin::ZERO,
                10.0 + 5e-10,
                false
            ),
            FitReason::TooTall
        );

        let exact = CupProfile::cylinder(4.0, 10.0)
            .unwrap()
            .sample(SamplingStrategy::Exact, 32);
        assert!(evaluator(EvaluationStrategy::PointSet)
            .assess(&exact, Pose::default(), &container, true)
            .fits());
    }

    #[test]
    fn handle_alone_can_reject_a_fitting_body() {
        // Body rim at 3 + 4 = 7 stays inside, handle at 3 + 4.25 + 0.5 = 7.75 does not.
        let pose = Pose::at(Point3::new(3.0, 0.0, 0.0));
        let container = centered((15.0, 10.0, 15.0));

        assert_eq!(
            evaluator(EvaluationStrategy::ClosedForm).assess(&cup(), pose, &container, true),
            FitReason::HandleOutOfBounds
        );
        assert_eq!(
            evaluator(EvaluationStrategy::PointSet).assess(&cup(), pose, &container, true),
            FitReason::PointOutOfBounds
        );
        for strategy in STRATEGIES {
            assert!(evaluator(strategy).assess(&cylinder(), pose, &container, true).fits());
        }
    }

    #[test]
    fn boundary_contact_counts_as_contained() {
        // Rim touches the wall exactly: 3.5 + 4.0 = 7.5.
        let pose = Pose::at(Point3::new(3.5, 0.0, 0.0));
        let container = centered((15.0, 10.0, 15.0));
        for strategy in STRATEGIES {
            assert!(
                evaluator(strategy).assess(&cylinder(), pose, &container, true).fits(),
                "{:?}",
                strategy
            );
        }
    }

    #[test]
    fn margin_removes_boundary_contact() {
        let pose = Pose::at(Point3::new(3.5, 0.0, 0.0));
        let container = centered((15.0, 10.0, 15.0));
        let config = ContainmentConfig::builder()
            .margin(ClearanceMargin::new(0.1).unwrap())
            .strategy(EvaluationStrategy::PointSet)
            .build();
        let reason = ContainmentEvaluator::new(config).assess(&cylinder(), pose, &container, true);
        assert_eq!(reason, FitReason::PointOutOfBounds);
    }

    #[test]
    fn corner_anchored_container_uses_its_own_center() {
        let container = Container::new((15.0, 10.0, 15.0), OriginConvention::CornerAnchored).unwrap();
        let centered_pose = Pose::at(container.floor_center());
        for strategy in STRATEGIES {
            let evaluator = evaluator(strategy);
            assert!(evaluator.assess(&cylinder(), centered_pose, &container, true).fits());
            assert!(!evaluator
                .assess(&cylinder(), Pose::default(), &container, true)
                .fits());
        }
    }

    #[test]
    fn empty_geometry_never_fits() {
        let body = RigidBody::new(Vec::new(), 5.0)
            .unwrap()
            .with_profile(BodyProfile {
                radius: 1.0,
                handle: None,
            });
        let container = centered((15.0, 10.0, 15.0));
        for strategy in STRATEGIES {
            assert_eq!(
                evaluator(strategy).assess(&body, Pose::default(), &container, true),
                FitReason::NoGeometry
            );
        }
        assert_eq!(
            check_points(Vec::new(), &container, ClearanceMargin::ZERO, 1.0, true),
            FitReason::NoGeometry
        );
    }

    #[test]
    fn inactive_never_fits() {
        let reason = evaluator(EvaluationStrategy::PointSet).assess(
            &cylinder(),
            Pose::default(),
            &centered((15.0, 10.0, 15.0)),
            false,
        );
        assert_eq!(reason, FitReason::Inactive);
    }

    #[test]
    fn nan_points_resolve_negative() {
        let container = centered((15.0, 10.0, 15.0));
        let points = vec![Point3::new(f64::NAN, 0.0, 0.0)];
        assert!(!check_points(points, &container, ClearanceMargin::ZERO, 1.0, false).fits());
        assert_eq!(
            check_points(
                vec![Point3::zero()],
                &container,
                ClearanceMargin::ZERO,
                f64::NAN,
                false
            ),
            FitReason::TooTall
        );
    }

    #[test]
    fn vertical_check_rejects_lifted_body() {
        let container = centered((15.0, 10.0, 15.0));
        let pose = Pose::at(Point3::new(0.0, 1.0, 0.0));
        for strategy in STRATEGIES {
            assert_eq!(
                evaluator(strategy).assess(&cylinder(), pose, &container, true),
                FitReason::BelowFloorOrAboveRim
            );
        }

        let lenient = ContainmentEvaluator::new(
            ContainmentConfig::builder().check_vertical(false).build(),
        );
        assert!(lenient.assess(&cylinder(), pose, &container, true).fits());
    }

    #[test]
    fn closed_form_handle_along_depth_axis() {
        let profile = BodyProfile {
            radius: 4.0,
            handle: Some(HandleProfile {
                offset: 4.25,
                half_thickness: 0.5,
            }),
        };
        let container = centered((20.0, 10.0, 9.0));
        let facing_depth = Pose::new(Point3::zero(), std::f64::consts::FRAC_PI_2);
        let facing_width = Pose::new(Point3::zero(), 0.0);

        assert_eq!(
            check_closed_form(facing_depth, &profile, 9.5, &container, ClearanceMargin::ZERO, true),
            FitReason::HandleOutOfBounds
        );
        assert_eq!(
            check_closed_form(facing_width, &profile, 9.5, &container, ClearanceMargin::ZERO, true),
            FitReason::Fits
        );
    }

    #[test]
    fn closed_form_falls_back_without_profile() {
        let body = RigidBody::new(vec![Point3::new(8.0, 0.0, 0.0)], 1.0).unwrap();
        let reason = evaluator(EvaluationStrategy::ClosedForm).assess(
            &body,
            Pose::default(),
            &centered((15.0, 10.0, 15.0)),
            true,
        );
        assert_eq!(reason, FitReason::PointOutOfBounds);
    }

    #[test]
    fn throttle_keeps_first_verdict_inside_interval() {
        let mut throttled = ThrottledEvaluator::new(ContainmentConfig::default());
        let container = centered((15.0, 10.0, 15.0));
        let body = cylinder();

        let first = throttled.submit(&body, Pose::default(), &container, true, 1_000);
        assert!(first.is_committed());
        assert!(first.verdict().fits);

        let moved = Pose::at(Point3::new(6.0, 0.0, 0.0));
        let second = throttled.submit(&body, moved, &container, true, 1_050);
        assert_eq!(second, Submission::Suppressed(first.verdict()));
        assert_eq!(throttled.current(), first.verdict());

        let third = throttled.submit(&body, moved, &container, true, 1_100);
        assert!(third.is_committed());
        assert!(!third.verdict().fits);
        assert_eq!(third.verdict().evaluated_at, 1_100);
    }

    #[test]
    fn inactive_submission_bypasses_interval() {
        let mut throttled = ThrottledEvaluator::new(ContainmentConfig::default());
        let container = centered((15.0, 10.0, 15.0));
        let body = cylinder();

        throttled.submit(&body, Pose::default(), &container, true, 1_000);
        let inactive = throttled.submit(&body, Pose::default(), &container, false, 1_010);
        assert_eq!(
            inactive,
            Submission::Committed(ContainmentVerdict::new(FitReason::Inactive, 1_010))
        );
        // The interval still runs from the last real evaluation.
        assert!(!throttled
            .submit(&body, Pose::default(), &container, true, 1_020)
            .is_committed());
        assert_eq!(throttled.remaining(1_020), Duration::from_millis(80));
    }

    #[test]
    fn current_verdict_starts_negative() {
        let throttled = ThrottledEvaluator::new(ContainmentConfig::default());
        assert_eq!(throttled.current(), ContainmentVerdict::unknown());
    }
}
