//! Frame-major trajectory → agent-major chart series.
//!
//! Downstream charts assign colours and labels by index, so output maps keep
//! agents in the order they first appear in frame 0.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{FrameFault, MalformedFrame, TrajectoryError};
use crate::trajectory::{AgentId, AgentState, Trajectory};

/// Two channels plotted against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub x: &'static str,
    pub y: &'static str,
}

pub const POSITION: ChannelPair = ChannelPair { x: "x", y: "y" };
pub const VELOCITY: ChannelPair = ChannelPair { x: "vx", y: "vy" };

/// One agent's values for one channel pair, index-aligned with the frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl Series {
    fn with_capacity(n: usize) -> Self {
        Self {
            xs: Vec::with_capacity(n),
            ys: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reshaped {
    pub position: IndexMap<AgentId, Series>,
    pub velocity: IndexMap<AgentId, Series>,
}

impl Reshaped {
    /// Agents in output order.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.position.keys().map(String::as_str)
    }

    pub fn frame_count(&self) -> usize {
        self.position.values().next().map_or(0, Series::len)
    }
}

fn read_channel(
    state: &AgentState,
    channel: &str,
    frame: usize,
    agent: &str,
) -> Result<f64, MalformedFrame> {
    match state.get(channel) {
        None => Err(MalformedFrame::agent(
            frame,
            agent,
            FrameFault::MissingChannel(channel.to_string()),
        )),
        Some(v) if !v.is_finite() => Err(MalformedFrame::agent(
            frame,
            agent,
            FrameFault::NonFinite(channel.to_string()),
        )),
        Some(v) => Ok(*v),
    }
}

fn push_pair(
    series: &mut Series,
    pair: ChannelPair,
    state: &AgentState,
    frame: usize,
    agent: &str,
) -> Result<(), MalformedFrame> {
    let x = read_channel(state, pair.x, frame, agent)?;
    let y = read_channel(state, pair.y, frame, agent)?;
    series.xs.push(x);
    series.ys.push(y);
    Ok(())
}

/// Reshape every frame into per-agent position and velocity series.
///
/// Fails on the first frame whose agent set or channels diverge from frame 0;
/// partial frames are never skipped.
pub fn reshape(trajectory: &Trajectory) -> Result<Reshaped, TrajectoryError> {
    let first = trajectory.first().ok_or(TrajectoryError::Empty)?;
    let n = trajectory.len();

    let mut position: IndexMap<AgentId, Series> = first
        .agents
        .keys()
        .map(|id| (id.clone(), Series::with_capacity(n)))
        .collect();
    let mut velocity = position.clone();

    for (index, frame) in trajectory.frames().iter().enumerate() {
        for (slot, agent) in first.agents.keys().enumerate() {
            let state = frame.agents.get(agent).ok_or_else(|| {
                MalformedFrame::agent(index, agent, FrameFault::MissingAgent)
            })?;
            push_pair(&mut position[slot], POSITION, state, index, agent)?;
            push_pair(&mut velocity[slot], VELOCITY, state, index, agent)?;
        }

        // Every frame-0 agent is present, so a larger set means an intruder.
        if frame.agents.len() != first.agents.len() {
            if let Some(extra) = frame.agents.keys().find(|id| !first.agents.contains_key(*id)) {
                return Err(MalformedFrame::agent(index, extra, FrameFault::UnknownAgent).into());
            }
        }
    }

    debug!(frames = n, agents = position.len(), "reshaped trajectory");
    Ok(Reshaped { position, velocity })
}
