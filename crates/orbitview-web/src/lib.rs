//! Orbitview Web - viewer backend for submitted simulations
//!
//! Features:
//! - Initial-conditions form with debounced edits
//! - Simulation submit/fetch through the configured service
//! - Position and velocity chart traces
//! - Initial-conditions table
//! - Host-driven playback controls

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use orbitview_client::{
    params, run_simulation, CancelFlag, FetchError, ParamSpec, Session, SessionError,
    SimulationClient,
};
use orbitview_core::{
    build, ChannelSchema, Debouncer, InitialConditionRow, PlaybackController, PlaybackError,
    PlaybackMode, PlaybackState, RawForm, RawValue, Series, ValidationError, DEFAULT_FRAME_RATE,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Configuration & state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub service_url: String,
    pub frame_rate: f64,
    pub debounce: Duration,
    pub schema: ChannelSchema,
    pub static_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            service_url: params::DEFAULT_SERVICE_URL.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            debounce: orbitview_core::debounce::DEFAULT_WINDOW,
            schema: ChannelSchema::Planar,
            static_dir: PathBuf::from("crates/orbitview-web/static"),
        }
    }
}

struct Viewer {
    session: Session,
    form: RawForm,
    edits: Debouncer<RawForm>,
    inflight: Option<CancelFlag>,
}

impl Viewer {
    /// Commit a quiet pending edit.
    fn settle(&mut self, now: Instant) {
        if let Some(form) = self.edits.poll(now) {
            self.form = form;
        }
    }

    fn latest_form(&self) -> &RawForm {
        self.edits.peek().unwrap_or(&self.form)
    }
}

pub struct AppState<C> {
    client: Arc<C>,
    config: Arc<ViewerConfig>,
    viewer: Arc<Mutex<Viewer>>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            viewer: self.viewer.clone(),
        }
    }
}

impl<C: SimulationClient + Send + Sync + 'static> AppState<C> {
    pub fn new(client: C, config: ViewerConfig) -> Result<Self, PlaybackError> {
        let viewer = Viewer {
            session: Session::new(config.frame_rate)?,
            form: params::default_form(),
            edits: Debouncer::new(config.debounce),
            inflight: None,
        };
        Ok(Self {
            client: Arc::new(client),
            config: Arc::new(config),
            viewer: Arc::new(Mutex::new(viewer)),
        })
    }
}

/// Creates the Axum router with all routes
pub fn create_router<C: SimulationClient + Send + Sync + 'static>(state: AppState<C>) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/api/form", get(handle_get_form::<C>).post(handle_edit_form::<C>))
        .route("/api/simulate", post(handle_simulate::<C>))
        .route("/api/session", axum::routing::delete(handle_teardown::<C>))
        .route("/api/charts", get(handle_charts::<C>))
        .route("/api/initial", get(handle_initial::<C>))
        .route("/api/playback", get(handle_playback::<C>))
        .route(
            "/api/playback/play",
            post(|s: State<AppState<C>>| control(s, PlaybackController::play)),
        )
        .route(
            "/api/playback/pause",
            post(|s: State<AppState<C>>| control(s, PlaybackController::pause)),
        )
        .route(
            "/api/playback/toggle",
            post(|s: State<AppState<C>>| control(s, PlaybackController::toggle)),
        )
        .route(
            "/api/playback/reset",
            post(|s: State<AppState<C>>| control(s, PlaybackController::reset)),
        )
        .route("/api/playback/speed", post(handle_speed::<C>))
        .route("/api/playback/tick", post(handle_tick::<C>))
        .nest_service("/static", ServeDir::new(static_dir.join("assets")))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    field: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl ToString) -> Self {
        Self {
            status,
            message: message.to_string(),
            field: None,
        }
    }

    fn not_loaded() -> Self {
        Self::new(StatusCode::NOT_FOUND, "no trajectory loaded")
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            field: self.field,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self {
            field: err.field(),
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, &err)
        }
    }
}

impl From<PlaybackError> for ApiError {
    fn from(err: PlaybackError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err)
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err)
    }
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FormResponse {
    form: RawForm,
    pending: bool,
    schema: ChannelSchema,
    fields: Vec<FieldSpec>,
    speed: ParamSpec,
}

#[derive(Serialize)]
struct FieldSpec {
    channel: &'static str,
    spec: Option<ParamSpec>,
}

#[derive(Deserialize)]
struct FieldEdit {
    field: String,
    value: Option<RawValue>,
}

fn form_response(viewer: &Viewer, schema: ChannelSchema) -> FormResponse {
    FormResponse {
        form: viewer.latest_form().clone(),
        pending: viewer.edits.is_pending(),
        schema,
        fields: schema
            .channels()
            .iter()
            .map(|&channel| FieldSpec {
                channel,
                spec: params::channel_spec(channel),
            })
            .collect(),
        speed: params::playback::SPEED,
    }
}

async fn handle_get_form<C>(State(state): State<AppState<C>>) -> Json<FormResponse> {
    let mut viewer = state.viewer.lock().await;
    viewer.settle(Instant::now());
    Json(form_response(&viewer, state.config.schema))
}

async fn handle_edit_form<C>(
    State(state): State<AppState<C>>,
    Json(edit): Json<FieldEdit>,
) -> Result<Json<FormResponse>, ApiError> {
    let mut viewer = state.viewer.lock().await;
    let now = Instant::now();
    viewer.settle(now);

    let mut draft = viewer.latest_form().clone();
    draft.set_field(&edit.field, edit.value)?;
    viewer.edits.write(draft, now);
    Ok(Json(form_response(&viewer, state.config.schema)))
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Chart-ready trace for one agent.
#[derive(Serialize)]
struct Trace {
    agent: String,
    name: String,
    color: &'static str,
    x: Vec<f64>,
    y: Vec<f64>,
}

#[derive(Serialize)]
struct ChartsResponse {
    frames: usize,
    position: Vec<Trace>,
    velocity: Vec<Trace>,
}

const POSITION_COLORS: [&str; 2] = ["#3b82f6", "#10b981"];
const VELOCITY_COLORS: [&str; 2] = ["#06b6d4", "#f43f5e"];

fn traces<'a>(
    series: impl Iterator<Item = (&'a String, &'a Series)>,
    palette: &[&'static str],
) -> Vec<Trace> {
    series
        .enumerate()
        .map(|(idx, (agent, s))| Trace {
            agent: agent.clone(),
            name: format!("Body{}", idx + 1),
            color: palette[idx % palette.len()],
            x: s.xs.clone(),
            y: s.ys.clone(),
        })
        .collect()
}

fn charts_response(session: &Session) -> Option<ChartsResponse> {
    let series = session.series()?;
    Some(ChartsResponse {
        frames: series.frame_count(),
        position: traces(series.position.iter(), &POSITION_COLORS),
        velocity: traces(series.velocity.iter(), &VELOCITY_COLORS),
    })
}

/// Handle simulation request
async fn handle_simulate<C: SimulationClient + Send + Sync + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Response, ApiError> {
    let (request, cancel) = {
        let mut viewer = state.viewer.lock().await;
        if let Some(form) = viewer.edits.flush() {
            viewer.form = form;
        }
        let request = build(&viewer.form, state.config.schema)?;

        // a newer submit supersedes any outstanding one
        let cancel = CancelFlag::new();
        if let Some(previous) = viewer.inflight.replace(cancel.clone()) {
            previous.cancel();
        }
        (request, cancel)
    };

    info!(bodies = request.len(), schema = state.config.schema.label(), "submitting simulation");
    let outcome = run_simulation(state.client.as_ref(), &request, &cancel).await;

    let mut viewer = state.viewer.lock().await;
    if viewer.inflight.as_ref().is_some_and(|f| f.same_as(&cancel)) {
        viewer.inflight = None;
    }
    // a teardown or newer submit may have taken the lock first
    if cancel.is_cancelled() {
        warn!("simulation cancelled while waiting for the session, discarding");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    match outcome {
        Ok(Some(trajectory)) => {
            viewer.session.replace(trajectory)?;
            let charts = charts_response(&viewer.session).ok_or_else(ApiError::not_loaded)?;
            Ok(Json(charts).into_response())
        }
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(err) => {
            warn!(error = %err, "simulation failed, keeping previous trajectory");
            Err(err.into())
        }
    }
}

/// Navigation away: cancel anything in flight and drop the session.
async fn handle_teardown<C>(State(state): State<AppState<C>>) -> StatusCode {
    let mut viewer = state.viewer.lock().await;
    if let Some(flag) = viewer.inflight.take() {
        flag.cancel();
    }
    viewer.session.reset();
    StatusCode::NO_CONTENT
}

async fn handle_charts<C>(State(state): State<AppState<C>>) -> Result<Json<ChartsResponse>, ApiError> {
    let viewer = state.viewer.lock().await;
    charts_response(&viewer.session)
        .map(Json)
        .ok_or_else(ApiError::not_loaded)
}

async fn handle_initial<C>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<InitialConditionRow>>, ApiError> {
    let viewer = state.viewer.lock().await;
    if !viewer.session.is_loaded() {
        return Err(ApiError::not_loaded());
    }
    Ok(Json(viewer.session.initial_rows()))
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PlaybackResponse {
    state: PlaybackState,
    mode: PlaybackMode,
    frame_count: usize,
    t0: f64,
    t1: f64,
}

#[derive(Deserialize)]
struct SpeedRequest {
    speed: f64,
}

#[derive(Deserialize)]
struct TickRequest {
    dt: f64,
}

fn playback_response(session: &Session) -> Result<PlaybackResponse, ApiError> {
    let pc = session.playback().ok_or_else(ApiError::not_loaded)?;
    let frame = session.current_frame().ok_or_else(ApiError::not_loaded)?;
    Ok(PlaybackResponse {
        state: pc.state(),
        mode: pc.mode(),
        frame_count: pc.frame_count(),
        t0: frame.t0,
        t1: frame.t1,
    })
}

async fn with_playback<C, F>(state: &AppState<C>, f: F) -> Result<Json<PlaybackResponse>, ApiError>
where
    F: FnOnce(&mut PlaybackController) -> Result<PlaybackState, PlaybackError>,
{
    let mut viewer = state.viewer.lock().await;
    let pc = viewer.session.playback_mut().ok_or_else(ApiError::not_loaded)?;
    f(pc)?;
    playback_response(&viewer.session).map(Json)
}

async fn control<C>(
    State(state): State<AppState<C>>,
    action: fn(&mut PlaybackController) -> PlaybackState,
) -> Result<Json<PlaybackResponse>, ApiError> {
    with_playback(&state, |pc| Ok(action(pc))).await
}

async fn handle_playback<C>(State(state): State<AppState<C>>) -> Result<Json<PlaybackResponse>, ApiError> {
    let viewer = state.viewer.lock().await;
    playback_response(&viewer.session).map(Json)
}

async fn handle_speed<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<SpeedRequest>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    with_playback(&state, |pc| pc.set_speed(req.speed)).await
}

async fn handle_tick<C>(
    State(state): State<AppState<C>>,
    Json(req): Json<TickRequest>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    with_playback(&state, |pc| Ok(pc.tick(req.dt))).await
}
