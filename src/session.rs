//! Caller-side state of one fit check.
//!
//! `FitSession` owns the "current configuration" the display layer edits: the
//! body, its pose, the container and whether the two are engaged. Every edit
//! replaces a whole value and is pushed through the throttled evaluator.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::containment::{ContainmentConfig, Submission, ThrottledEvaluator};
use crate::geometry::collect_world_points;
use crate::model::{Container, ContainmentVerdict, Pose, RigidBody};
use crate::types::Point3;

/// Whether the body is placed into the container.
///
/// Containment is only checked while engaged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    #[default]
    Separated,
    Engaged,
}

impl Engagement {
    pub fn is_active(&self) -> bool {
        matches!(self, Engagement::Engaged)
    }

    pub fn toggled(&self) -> Self {
        match self {
            Engagement::Separated => Engagement::Engaged,
            Engagement::Engaged => Engagement::Separated,
        }
    }
}

/// Current configuration plus its throttled verdict.
#[derive(Clone, Debug)]
pub struct FitSession {
    body: RigidBody,
    pose: Pose,
    container: Container,
    engagement: Engagement,
    rest_position: Point3,
    throttled: ThrottledEvaluator,
    pending: bool,
}

impl FitSession {
    pub const DEFAULT_REST_POSITION: Point3 = Point3::new(-15.0, 0.0, 0.0);

    /// Creates a separated session with the body resting at `rest_position`.
    pub fn new(
        body: RigidBody,
        container: Container,
        config: ContainmentConfig,
        rest_position: Point3,
    ) -> Self {
        Self {
            body,
            pose: Pose::at(rest_position),
            container,
            engagement: Engagement::Separated,
            rest_position,
            throttled: ThrottledEvaluator::new(config),
            pending: false,
        }
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn engagement(&self) -> Engagement {
        self.engagement
    }

    pub fn verdict(&self) -> ContainmentVerdict {
        self.throttled.current()
    }

    /// `true` if the latest edit was suppressed and has not been evaluated yet.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Time until a pending edit can be evaluated by [`FitSession::flush`].
    pub fn retry_after(&self, now: u64) -> Option<Duration> {
        self.pending.then(|| self.throttled.remaining(now))
    }

    /// World-space points of the body at its current pose.
    pub fn world_points(&self) -> Vec<Point3> {
        collect_world_points(&self.body, self.pose)
    }

    pub fn set_pose(&mut self, pose: Pose, now: u64) -> Submission {
        self.pose = pose;
        self.submit(now)
    }

    pub fn set_position(&mut self, position: Point3, now: u64) -> Submission {
        self.set_pose(self.pose.with_position(position), now)
    }

    pub fn set_rotation_degrees(&mut self, degrees: f64, now: u64) -> Submission {
        self.set_pose(self.pose.with_rotation(degrees.to_radians()), now)
    }

    pub fn set_container(&mut self, container: Container, now: u64) -> Submission {
        self.container = container;
        self.submit(now)
    }

    /// Engages or separates body and container.
    ///
    /// Engaging moves the body to the center of the container floor; separating
    /// moves it back to its rest position. The rotation is kept either way.
    pub fn toggle_engagement(&mut self, now: u64) -> Submission {
        self.engagement = self.engagement.toggled();
        let position = match self.engagement {
            Engagement::Engaged => self.container.floor_center(),
            Engagement::Separated => self.rest_position,
        };
        self.pose = self.pose.with_position(position);
        debug!(engagement = ?self.engagement, "engagement toggled");
        self.submit(now)
    }

    /// Re-submits the current configuration if the last edit was suppressed and
    /// the interval has reopened.
    pub fn flush(&mut self, now: u64) -> Option<Submission> {
        if !self.pending || self.throttled.remaining(now) > Duration::ZERO {
            return None;
        }
        Some(self.submit(now))
    }

    fn submit(&mut self, now: u64) -> Submission {
        let submission = self.throttled.submit(
            &self.body,
            self.pose,
            &self.container,
            self.engagement.is_active(),
            now,
        );
        self.pending = !submission.is_committed();
        submission
    }
}
