//! Owned viewer session: the loaded trajectory, its series and playback.
//!
//! Lifecycle: [`Session::new`] at start, [`Session::replace`] after each
//! successful fetch, [`Session::reset`] when the viewer is torn down.
//! A fetch that fails, or that is cancelled while in flight, never reaches
//! `replace`, so the previously loaded trajectory stays on display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use orbitview_core::playback::DEFAULT_SPEED;
use orbitview_core::{
    extract_initial, reshape, AgentId, AgentState, Frame, InitialConditionRow, PlaybackController,
    PlaybackError, PlaybackState, Reshaped, SimulationRequest, Trajectory, TrajectoryError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::transport::{FetchError, SimulationClient};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Set at teardown; checked as soon as a suspended fetch resumes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same flag.
    pub fn same_as(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct Loaded {
    trajectory: Arc<Trajectory>,
    series: Reshaped,
    playback: PlaybackController,
}

pub struct Session {
    frame_rate: f64,
    loaded: Option<Loaded>,
}

impl Session {
    /// Start an empty session. Fails if `frame_rate` is unusable.
    pub fn new(frame_rate: f64) -> Result<Self, PlaybackError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(PlaybackError::InvalidFrameRate(frame_rate));
        }
        Ok(Self {
            frame_rate,
            loaded: None,
        })
    }

    /// Swap in a freshly fetched trajectory.
    ///
    /// The trajectory is reshaped before anything is touched; a malformed one
    /// leaves the session as it was. Playback restarts at frame 0 and keeps
    /// the current speed.
    pub fn replace(&mut self, trajectory: Trajectory) -> Result<(), SessionError> {
        let series = reshape(&trajectory)?;
        let mut playback = PlaybackController::new(trajectory.len(), self.frame_rate)?;
        if let Some(old) = &self.loaded {
            playback.set_speed(old.playback.state().speed)?;
        }

        info!(
            frames = trajectory.len(),
            agents = series.position.len(),
            "loaded trajectory"
        );
        self.loaded = Some(Loaded {
            trajectory: Arc::new(trajectory),
            series,
            playback,
        });
        Ok(())
    }

    /// Drop everything loaded.
    pub fn reset(&mut self) {
        self.loaded = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn trajectory(&self) -> Option<Arc<Trajectory>> {
        self.loaded.as_ref().map(|l| l.trajectory.clone())
    }

    pub fn series(&self) -> Option<&Reshaped> {
        self.loaded.as_ref().map(|l| &l.series)
    }

    pub fn initial(&self) -> Option<&IndexMap<AgentId, AgentState>> {
        let loaded = self.loaded.as_ref()?;
        extract_initial(&loaded.trajectory).ok()
    }

    pub fn initial_rows(&self) -> Vec<InitialConditionRow> {
        self.initial()
            .map(InitialConditionRow::from_initial)
            .unwrap_or_default()
    }

    pub fn playback(&self) -> Option<&PlaybackController> {
        self.loaded.as_ref().map(|l| &l.playback)
    }

    pub fn playback_mut(&mut self) -> Option<&mut PlaybackController> {
        self.loaded.as_mut().map(|l| &mut l.playback)
    }

    /// Playback snapshot; the start-of-session state when nothing is loaded.
    pub fn playback_state(&self) -> PlaybackState {
        self.playback().map_or(
            PlaybackState {
                cursor: 0,
                playing: false,
                speed: DEFAULT_SPEED,
            },
            PlaybackController::state,
        )
    }

    /// Frame under the playback cursor.
    pub fn current_frame(&self) -> Option<&Frame> {
        let loaded = self.loaded.as_ref()?;
        loaded.trajectory.get(loaded.playback.cursor())
    }
}

/// Submit `request` and fetch the resulting trajectory.
///
/// Returns `Ok(None)` when `cancel` was set while either exchange was
/// outstanding; the result is then dropped without being looked at.
pub async fn run_simulation<C: SimulationClient>(
    client: &C,
    request: &SimulationRequest,
    cancel: &CancelFlag,
) -> Result<Option<Trajectory>, FetchError> {
    let started = client.start(request).await;
    if cancel.is_cancelled() {
        warn!("simulation start resumed after cancellation, discarding");
        return Ok(None);
    }
    started?;
    fetch_trajectory(client, cancel).await
}

/// Fetch the latest trajectory, honouring `cancel` on resumption.
pub async fn fetch_trajectory<C: SimulationClient>(
    client: &C,
    cancel: &CancelFlag,
) -> Result<Option<Trajectory>, FetchError> {
    let fetched = client.fetch().await;
    if cancel.is_cancelled() {
        warn!("trajectory fetch resumed after cancellation, discarding");
        return Ok(None);
    }
    match fetched {
        Ok(trajectory) => Ok(Some(trajectory)),
        Err(err) => {
            warn!(error = %err, "trajectory fetch failed");
            Err(err)
        }
    }
}
