//! Error taxonomy shared by the reshaping, playback and request modules.

use std::fmt;
use thiserror::Error;

use crate::trajectory::AgentId;

/// What is wrong with a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFault {
    /// An agent present in frame 0 is absent from this frame.
    MissingAgent,
    /// The frame carries an agent that frame 0 never declared.
    UnknownAgent,
    /// A channel the reshaper needs is absent.
    MissingChannel(String),
    /// A channel holds NaN or an infinity.
    NonFinite(String),
    /// A wire channel value is not a JSON number.
    NonNumeric(String),
    /// `t1 <= t0`.
    InvalidSpan,
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAgent => write!(f, "agent missing"),
            Self::UnknownAgent => write!(f, "agent not present in frame 0"),
            Self::MissingChannel(ch) => write!(f, "channel `{ch}` missing"),
            Self::NonFinite(ch) => write!(f, "channel `{ch}` is not finite"),
            Self::NonNumeric(ch) => write!(f, "channel `{ch}` is not a number"),
            Self::InvalidSpan => write!(f, "t1 must be greater than t0"),
        }
    }
}

/// A frame that breaks the index-aligned series invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct MalformedFrame {
    /// Index of the offending frame.
    pub frame: usize,
    /// Offending agent, `None` for frame-level faults such as [`FrameFault::InvalidSpan`].
    pub agent: Option<AgentId>,
    pub fault: FrameFault,
}

impl MalformedFrame {
    pub fn agent(frame: usize, agent: &str, fault: FrameFault) -> Self {
        Self {
            frame,
            agent: Some(agent.to_string()),
            fault,
        }
    }
}

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.agent {
            Some(agent) => write!(f, "frame {}, agent `{}`: {}", self.frame, agent, self.fault),
            None => write!(f, "frame {}: {}", self.frame, self.fault),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("trajectory has no frames")]
    Empty,
    #[error("malformed {0}")]
    Malformed(#[from] MalformedFrame),
    #[error("trajectory payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlaybackError {
    #[error("playback speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),
    #[error("frame rate must be finite and positive, got {0}")]
    InvalidFrameRate(f64),
    #[error("cannot play back an empty trajectory")]
    EmptyTrajectory,
}

/// Rejected user input. Only the first failure is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{body}.{channel} is missing")]
    Missing { body: String, channel: String },
    #[error("{body}.{channel} is not a finite number: {raw:?}")]
    Invalid {
        body: String,
        channel: String,
        raw: String,
    },
    #[error("field `{0}` is not of the form body.channel")]
    UnknownField(String),
    #[error("no bodies supplied")]
    NoBodies,
}

impl ValidationError {
    /// The `body.channel` path this error names, if any.
    pub fn field(&self) -> Option<String> {
        match self {
            Self::Missing { body, channel } | Self::Invalid { body, channel, .. } => {
                Some(format!("{body}.{channel}"))
            }
            Self::UnknownField(field) => Some(field.clone()),
            Self::NoBodies => None,
        }
    }
}
