use serde::Serialize;
use tracing::debug;

use crate::error::PlaybackError;

// ---------------------------------------------------------------------------
// Enums & Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Idle = 0,    // Cursor parked at frame 0
    Playing = 1, // Advancing on tick
    Paused = 2,  // Holding the cursor
}

impl PlaybackMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Nominal frames per second at speed 1.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Snapshot handed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackState {
    pub cursor: usize,
    pub playing: bool,
    pub speed: f64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Cursor over an already-fetched trajectory.
///
/// Ticks come from the host's scheduling loop; the controller owns no timer.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    frame_count: usize,
    frame_rate: f64,
    mode: PlaybackMode,
    cursor: usize,
    speed: f64,
}

impl PlaybackController {
    pub fn new(frame_count: usize, frame_rate: f64) -> Result<Self, PlaybackError> {
        if frame_count == 0 {
            return Err(PlaybackError::EmptyTrajectory);
        }
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(PlaybackError::InvalidFrameRate(frame_rate));
        }

        Ok(Self {
            frame_count,
            frame_rate,
            mode: PlaybackMode::Idle,
            cursor: 0,
            speed: DEFAULT_SPEED,
        })
    }

    pub fn play(&mut self) -> PlaybackState {
        match self.mode {
            PlaybackMode::Idle | PlaybackMode::Paused => self.transition_to(PlaybackMode::Playing),
            PlaybackMode::Playing => {}
        }
        self.state()
    }

    pub fn pause(&mut self) -> PlaybackState {
        if self.mode == PlaybackMode::Playing {
            self.transition_to(PlaybackMode::Paused);
        }
        self.state()
    }

    /// Play when stopped, pause when playing.
    pub fn toggle(&mut self) -> PlaybackState {
        if self.mode == PlaybackMode::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn reset(&mut self) -> PlaybackState {
        self.cursor = 0;
        self.transition_to(PlaybackMode::Idle);
        self.state()
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<PlaybackState, PlaybackError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(self.state())
    }

    /// Advance by `floor(dt * speed * frame_rate)` frames while playing.
    ///
    /// The result depends only on the current state and `dt_secs`: a tick
    /// shorter than one frame never moves the cursor, so hosts with short
    /// frames should pass the time elapsed since the cursor last moved.
    /// Landing on the last frame pauses playback; there is no looping.
    pub fn tick(&mut self, dt_secs: f64) -> PlaybackState {
        if self.mode != PlaybackMode::Playing {
            return self.state();
        }

        let last = self.frame_count - 1;
        let elapsed = if dt_secs.is_finite() && dt_secs > 0.0 {
            dt_secs
        } else {
            0.0
        };
        let steps = (elapsed * self.speed * self.frame_rate).floor();

        let remaining = last - self.cursor;
        if steps >= remaining as f64 {
            self.cursor = last;
        } else {
            self.cursor += steps as usize;
        }

        if self.cursor == last {
            self.transition_to(PlaybackMode::Paused);
        }
        self.state()
    }

    fn transition_to(&mut self, mode: PlaybackMode) {
        if mode != self.mode {
            debug!(from = self.mode.label(), to = mode.label(), cursor = self.cursor, "playback transition");
        }
        self.mode = mode;
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            cursor: self.cursor,
            playing: self.mode == PlaybackMode::Playing,
            speed: self.speed,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}
