//! REST API for the fit check service.
//!
//! Provides HTTP endpoints for the display layer: a stateless one-shot evaluation,
//! a shared session that applies the evaluation interval, and a Server-Sent-Events
//! stream of committed verdicts. Uses Axum as the web framework and supports CORS.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tokio::sync::{Mutex, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::config::{ApiConfig, ContainmentSettings};
use crate::containment::{ContainmentEvaluator, Submission};
use crate::geometry::collect_world_points;
use crate::model::{
    Container, ContainmentVerdict, OriginConvention, Pose, RigidBody, ValidationError,
};
use crate::session::{Engagement, FitSession};
use crate::throttle::now_millis;
use crate::types::Point3;

#[derive(Clone)]
struct ApiState {
    settings: ContainmentSettings,
    evaluator: ContainmentEvaluator,
    body: Arc<RigidBody>,
    session: Arc<Mutex<FitSession>>,
    verdicts: Arc<watch::Sender<VerdictResponse>>,
    flush_scheduled: Arc<AtomicBool>,
}

impl ApiState {
    fn new(settings: ContainmentSettings, session: FitSession) -> Self {
        let (verdicts, _) = watch::channel(VerdictResponse::from(session.verdict()));
        Self {
            evaluator: ContainmentEvaluator::new(settings.containment_config()),
            body: Arc::new(session.body().clone()),
            settings,
            session: Arc::new(Mutex::new(session)),
            verdicts: Arc::new(verdicts),
            flush_scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn publish(&self, verdict: ContainmentVerdict) {
        self.verdicts.send_replace(VerdictResponse::from(verdict));
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// Pinned to swagger-ui-dist 5.17.14; the SRI hashes must change with the version.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>fit_check API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Container extents as (width, height, depth) in centimeters.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ContainerRequest {
    #[schema(value_type = [f64; 3], example = json!([15.0, 10.0, 15.0]))]
    pub dims: (f64, f64, f64),
}

impl ContainerRequest {
    fn into_container(
        self,
        origin: OriginConvention,
        extent_range: (f64, f64),
    ) -> Result<Container, ValidationError> {
        let (min, max) = extent_range;
        let names = ["width", "height", "depth"];
        let values = [self.dims.0, self.dims.1, self.dims.2];
        for (name, value) in names.iter().zip(values) {
            if !(min..=max).contains(&value) {
                return Err(ValidationError::InvalidDimension(format!(
                    "Container {} must lie within {}..={} cm, got: {}",
                    name, min, max, value
                )));
            }
        }
        Container::new(self.dims, origin)
    }
}

/// Body placement with the rotation in degrees, as entered in the UI.
#[derive(Deserialize, Clone, ToSchema)]
pub struct PoseRequest {
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub position: (f64, f64, f64),
    #[serde(default)]
    pub rotation_degrees: f64,
}

impl PoseRequest {
    fn into_pose(self) -> Result<Pose, ValidationError> {
        let position = Point3::from_tuple(self.position);
        if !position.is_finite() || !self.rotation_degrees.is_finite() {
            return Err(ValidationError::InvalidConfiguration(
                "Pose values must be finite numbers".to_string(),
            ));
        }
        Ok(Pose::from_degrees(position, self.rotation_degrees))
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "dims": [15.0, 10.0, 15.0] },
        "pose": { "position": [0.0, 0.0, 0.0], "rotation_degrees": 45.0 },
        "include_points": false
    })
)]
pub struct EvaluateRequest {
    pub container: ContainerRequest,
    pub pose: PoseRequest,
    /// Defaults to `true`; an inactive check never fits.
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub include_points: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// Include the body's world-space points for debug overlays.
    #[serde(default)]
    pub include_points: bool,
}

/// Verdict as sent to the display layer.
#[derive(Serialize, Clone, Debug, PartialEq, ToSchema)]
pub struct VerdictResponse {
    pub fits: bool,
    pub reason_code: String,
    pub reason: String,
    /// Milliseconds since the Unix epoch of the evaluation that produced the verdict
    pub evaluated_at: u64,
}

impl From<ContainmentVerdict> for VerdictResponse {
    fn from(verdict: ContainmentVerdict) -> Self {
        Self {
            fits: verdict.fits,
            reason_code: verdict.reason.code().to_string(),
            reason: verdict.reason.to_string(),
            evaluated_at: verdict.evaluated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub verdict: VerdictResponse,
    #[schema(value_type = Option<Vec<[f64; 3]>>)]
    pub points: Option<Vec<(f64, f64, f64)>>,
}

#[derive(Serialize, ToSchema)]
pub struct PoseResponse {
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub position: (f64, f64, f64),
    /// Rotation normalized into [0, 360)
    pub rotation_degrees: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ContainerResponse {
    #[schema(value_type = [f64; 3], example = json!([15.0, 10.0, 15.0]))]
    pub dims: (f64, f64, f64),
    pub origin: OriginConvention,
}

/// Snapshot of the shared session.
///
/// # Fields
/// * `committed` - `false` if the triggering edit was dropped by the evaluation interval
/// * `pending` - An edit is waiting for the interval to reopen
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub engagement: Engagement,
    pub pose: PoseResponse,
    pub container: ContainerResponse,
    pub verdict: VerdictResponse,
    pub committed: bool,
    pub pending: bool,
    #[schema(value_type = Option<Vec<[f64; 3]>>)]
    pub points: Option<Vec<(f64, f64, f64)>>,
}

impl SessionResponse {
    fn from_session(session: &FitSession, committed: bool, include_points: bool) -> Self {
        let pose = session.pose();
        let container = session.container();
        Self {
            engagement: session.engagement(),
            pose: PoseResponse {
                position: pose.position.as_tuple(),
                rotation_degrees: pose.rotation_degrees(),
            },
            container: ContainerResponse {
                dims: container.dims(),
                origin: container.origin(),
            },
            verdict: VerdictResponse::from(session.verdict()),
            committed,
            pending: session.is_pending(),
            points: include_points.then(|| points_as_tuples(session.world_points())),
        }
    }
}

fn points_as_tuples(points: Vec<Point3>) -> Vec<(f64, f64, f64)> {
    points.into_iter().map(Point3::as_tuple).collect()
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(err: ValidationError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        err.to_string(),
    )
}

fn container_config_error(err: ValidationError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        err.to_string(),
    )
}

fn unwrap_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(err) => Err(json_deserialize_error(err)),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_evaluate,
        handle_get_session,
        handle_set_pose,
        handle_set_container,
        handle_toggle,
        handle_session_stream
    ),
    components(
        schemas(
            EvaluateRequest,
            EvaluateResponse,
            ContainerRequest,
            PoseRequest,
            VerdictResponse,
            SessionResponse,
            PoseResponse,
            ContainerResponse,
            ErrorResponse,
            Engagement,
            OriginConvention
        )
    ),
    tags(
        (name = "evaluation", description = "Stateless containment checks"),
        (name = "session", description = "Shared, rate-limited fit session")
    )
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/evaluate", post(handle_evaluate))
        .route("/session", get(handle_get_session))
        .route("/session/pose", put(handle_set_pose))
        .route("/session/container", put(handle_set_container))
        .route("/session/toggle", post(handle_toggle))
        .route("/session/stream", get(handle_session_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(
    config: ApiConfig,
    settings: ContainmentSettings,
    session: FitSession,
) -> std::io::Result<()> {
    let app = router(ApiState::new(settings, session));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API Endpoints: POST /evaluate, GET /session, PUT /session/pose, PUT /session/container, POST /session/toggle, GET /session/stream");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /evaluate.
///
/// Evaluates one pose against one container without touching the shared session
/// and without any rate limiting.
#[utoipa::path(
    post,
    path = "/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Containment verdict", body = EvaluateResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "evaluation"
)]
async fn handle_evaluate(
    State(state): State<ApiState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let origin = state.settings.containment_config().origin;
    let container = match request
        .container
        .into_container(origin, state.settings.extent_range())
    {
        Ok(container) => container,
        Err(err) => return container_config_error(err),
    };
    let pose = match request.pose.into_pose() {
        Ok(pose) => pose,
        Err(err) => return validation_error(err),
    };

    let active = request.active.unwrap_or(true);
    let verdict = state
        .evaluator
        .evaluate(&state.body, pose, &container, active, now_millis());
    info!(
        "📥 Evaluate: {:?} at {:?} → {}",
        container.dims(),
        pose.position.as_tuple(),
        verdict.reason.code()
    );

    let points = request
        .include_points
        .then(|| points_as_tuples(collect_world_points(&state.body, pose)));
    let response = EvaluateResponse {
        verdict: VerdictResponse::from(verdict),
        points,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for GET /session.
#[utoipa::path(
    get,
    path = "/session",
    params(SessionQuery),
    responses((status = 200, description = "Current session state", body = SessionResponse)),
    tag = "session"
)]
async fn handle_get_session(
    State(state): State<ApiState>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let session = state.session.lock().await;
    let response = SessionResponse::from_session(&session, true, query.include_points);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for PUT /session/pose.
#[utoipa::path(
    put,
    path = "/session/pose",
    request_body = PoseRequest,
    responses(
        (status = 200, description = "Pose replaced", body = SessionResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid pose", body = ErrorResponse)
    ),
    tag = "session"
)]
async fn handle_set_pose(
    State(state): State<ApiState>,
    payload: Result<Json<PoseRequest>, JsonRejection>,
) -> Response {
    let pose = match unwrap_json(payload).map(PoseRequest::into_pose) {
        Ok(Ok(pose)) => pose,
        Ok(Err(err)) => return validation_error(err),
        Err(response) => return response,
    };

    apply_edit(&state, |session, now| session.set_pose(pose, now)).await
}

/// Handler for PUT /session/container.
#[utoipa::path(
    put,
    path = "/session/container",
    request_body = ContainerRequest,
    responses(
        (status = 200, description = "Container replaced", body = SessionResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid container configuration",
            body = ErrorResponse
        )
    ),
    tag = "session"
)]
async fn handle_set_container(
    State(state): State<ApiState>,
    payload: Result<Json<ContainerRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let origin = state.settings.containment_config().origin;
    let container = match request.into_container(origin, state.settings.extent_range()) {
        Ok(container) => container,
        Err(err) => return container_config_error(err),
    };

    apply_edit(&state, |session, now| session.set_container(container, now)).await
}

/// Handler for POST /session/toggle.
///
/// Engages body and container (the body moves to the container center) or
/// separates them again.
#[utoipa::path(
    post,
    path = "/session/toggle",
    responses((status = 200, description = "Engagement toggled", body = SessionResponse)),
    tag = "session"
)]
async fn handle_toggle(State(state): State<ApiState>) -> Response {
    apply_edit(&state, |session, now| session.toggle_engagement(now)).await
}

/// Handler for GET /session/stream (SSE).
///
/// Sends the current verdict immediately and every committed verdict afterwards.
#[utoipa::path(
    get,
    path = "/session/stream",
    responses((
        status = 200,
        description = "Streams committed verdicts",
        content_type = "text/event-stream",
        body = String
    )),
    tag = "session"
)]
async fn handle_session_stream(State(state): State<ApiState>) -> Response {
    let stream = WatchStream::new(state.verdicts.subscribe())
        .map(|verdict| Event::default().json_data(verdict));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn apply_edit(
    state: &ApiState,
    edit: impl FnOnce(&mut FitSession, u64) -> Submission,
) -> Response {
    let mut session = state.session.lock().await;
    let now = now_millis();
    let submission = edit(&mut *session, now);

    if submission.is_committed() {
        state.publish(submission.verdict());
    } else if state.settings.trailing_evaluation() {
        if let Some(delay) = session.retry_after(now) {
            schedule_flush(state.clone(), delay);
        }
    }

    let response = SessionResponse::from_session(&session, submission.is_committed(), false);
    (StatusCode::OK, Json(response)).into_response()
}

/// Re-evaluates the session once the interval reopens, so that the last edit of a
/// burst is never left unevaluated.
fn schedule_flush(state: ApiState, delay: Duration) {
    if state
        .flush_scheduled
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }

    tokio::spawn(async move {
        let mut delay = delay;
        loop {
            tokio::time::sleep(delay).await;
            let mut session = state.session.lock().await;
            let now = now_millis();
            if let Some(submission) = session.flush(now) {
                if submission.is_committed() {
                    debug!(
                        reason = submission.verdict().reason.code(),
                        "trailing evaluation committed"
                    );
                    state.publish(submission.verdict());
                }
            }
            match session.retry_after(now) {
                Some(remaining) => delay = remaining.max(Duration::from_millis(1)),
                None => {
                    // Must be cleared while the session lock is held.
                    state.flush_scheduled.store(false, Ordering::Release);
                    break;
                }
            }
        }
    });
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
