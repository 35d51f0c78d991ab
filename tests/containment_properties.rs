use std::time::Duration;

use fit_check::containment::{
    ContainmentConfig, ContainmentEvaluator, EvaluationStrategy, ThrottledEvaluator,
};
use fit_check::geometry::{CupProfile, SamplingStrategy};
use fit_check::model::{ClearanceMargin, Container, OriginConvention, Pose, RigidBody};
use fit_check::types::Point3;
use proptest::prelude::*;

const STRATEGIES: [EvaluationStrategy; 2] =
    [EvaluationStrategy::PointSet, EvaluationStrategy::ClosedForm];

fn evaluator(strategy: EvaluationStrategy, margin: f64) -> ContainmentEvaluator {
    let margin = ClearanceMargin::new(margin).expect("generated margins are valid");
    ContainmentEvaluator::new(
        ContainmentConfig::builder()
            .strategy(strategy)
            .margin(margin)
            .build(),
    )
}

fn cylinder(radius: f64, height: f64) -> RigidBody {
    CupProfile::cylinder(radius, height)
        .expect("generated cylinders are valid")
        .sample(SamplingStrategy::Exact, 32)
}

fn origin_strategy() -> impl Strategy<Value = OriginConvention> {
    prop_oneof![
        Just(OriginConvention::Centered),
        Just(OriginConvention::CornerAnchored)
    ]
}

fn extent() -> impl Strategy<Value = f64> {
    1.0f64..50.0
}

fn rotation() -> impl Strategy<Value = f64> {
    0.0f64..std::f64::consts::TAU
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn taller_body_never_fits(
        width in extent(),
        height in 1.0f64..9.0,
        depth in extent(),
        x in -30.0f64..30.0,
        z in -30.0f64..30.0,
        angle in rotation(),
        origin in origin_strategy(),
    ) {
        let container = Container::new((width, height, depth), origin).unwrap();
        let body = CupProfile::default().sample(SamplingStrategy::Exact, 16);
        let pose = Pose::new(Point3::new(x, 0.0, z), angle);
        for strategy in STRATEGIES {
            prop_assert!(!evaluator(strategy, 0.0).assess(&body, pose, &container, true).fits());
        }
    }

    #[test]
    fn repeated_evaluation_is_stable(
        dims in (extent(), extent(), extent()),
        x in -10.0f64..10.0,
        z in -10.0f64..10.0,
        angle in rotation(),
        margin in 0.0f64..2.0,
    ) {
        let container = Container::new(dims, OriginConvention::Centered).unwrap();
        let body = CupProfile::default().sample(SamplingStrategy::Analytic, 32);
        let pose = Pose::new(Point3::new(x, 0.0, z), angle);
        let config = ContainmentConfig::builder()
            .margin(ClearanceMargin::new(margin).unwrap())
            .build();
        let mut throttled = ThrottledEvaluator::new(config);

        let first = throttled.submit(&body, pose, &container, true, 10_000);
        let second = throttled.submit(&body, pose, &container, true, 10_500);
        prop_assert!(first.is_committed() && second.is_committed());
        prop_assert_eq!(first.verdict().reason, second.verdict().reason);
    }

    #[test]
    fn larger_margin_never_turns_a_miss_into_a_fit(
        dims in (extent(), extent(), extent()),
        x in -10.0f64..10.0,
        z in -10.0f64..10.0,
        angle in rotation(),
        margin in 0.0f64..3.0,
        extra in 0.0f64..3.0,
    ) {
        let container = Container::new(dims, OriginConvention::Centered).unwrap();
        let body = CupProfile::default().sample(SamplingStrategy::Exact, 32);
        let pose = Pose::new(Point3::new(x, 0.0, z), angle);
        for strategy in STRATEGIES {
            let tight = evaluator(strategy, margin).assess(&body, pose, &container, true);
            let tighter = evaluator(strategy, margin + extra).assess(&body, pose, &container, true);
            if !tight.fits() {
                prop_assert!(!tighter.fits(), "{:?}: {:?} became {:?}", strategy, tight, tighter);
            }
        }
    }

    #[test]
    fn suppressed_request_returns_first_verdict(
        first_x in -10.0f64..10.0,
        second_x in -10.0f64..10.0,
        gap in 0u64..100,
    ) {
        let container = Container::new((15.0, 10.0, 15.0), OriginConvention::Centered).unwrap();
        let body = CupProfile::default().sample(SamplingStrategy::Analytic, 32);
        let mut throttled = ThrottledEvaluator::new(
            ContainmentConfig::builder().min_interval(Duration::from_millis(100)).build(),
        );

        let first = throttled.submit(&body, Pose::at(Point3::new(first_x, 0.0, 0.0)), &container, true, 5_000);
        let second = throttled.submit(
            &body,
            Pose::at(Point3::new(second_x, 0.0, 0.0)),
            &container,
            true,
            5_000 + gap,
        );
        prop_assert!(!second.is_committed());
        prop_assert_eq!(second.verdict(), first.verdict());
    }

    #[test]
    fn centered_cylinder_fit_ignores_rotation(
        dims in (extent(), 6.0f64..50.0, extent()),
        radius in 0.5f64..20.0,
        margin in 0.0f64..3.0,
        angle in rotation(),
        origin in origin_strategy(),
    ) {
        let (width, _, depth) = dims;
        let slack = width.min(depth) - 2.0 * margin - 2.0 * radius;
        prop_assume!(slack.abs() > 1e-6);

        let container = Container::new(dims, origin).unwrap();
        let body = cylinder(radius, 5.0);
        let pose = Pose::new(container.floor_center(), angle);
        let reason = evaluator(EvaluationStrategy::ClosedForm, margin)
            .assess(&body, pose, &container, true);
        prop_assert_eq!(reason.fits(), slack > 0.0);

        // Sampled rims may miss the extreme point after rotation, so only a clear
        // verdict is required from the point set.
        if slack.abs() > 0.05 * radius {
            let reason = evaluator(EvaluationStrategy::PointSet, margin)
                .assess(&body, pose, &container, true);
            prop_assert_eq!(reason.fits(), slack > 0.0);
        }
    }

    #[test]
    fn closed_form_fit_implies_analytic_point_fit(
        dims in (extent(), extent(), extent()),
        x in -10.0f64..10.0,
        z in -10.0f64..10.0,
        angle in rotation(),
        margin in 0.0f64..2.0,
        origin in origin_strategy(),
    ) {
        let container = Container::new(dims, origin).unwrap();
        let body = CupProfile::default().sample(SamplingStrategy::Analytic, 32);
        let center = container.floor_center();
        let pose = Pose::new(Point3::new(center.x + x, 0.0, center.z + z), angle);

        let closed = evaluator(EvaluationStrategy::ClosedForm, margin + 1e-7)
            .assess(&body, pose, &container, true);
        if closed.fits() {
            let points = evaluator(EvaluationStrategy::PointSet, margin)
                .assess(&body, pose, &container, true);
            prop_assert!(points.fits(), "closed form fits but point set reports {:?}", points);
        }
    }
}
