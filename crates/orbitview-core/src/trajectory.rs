//! Trajectory data model and the simulation service's wire format.
//!
//! The service answers with an ordered JSON array of 3-element entries:
//!
//! ```json
//! [
//!   [0.0, 1.0, { "A": { "x": 0.0, "y": 0.0, "vx": 1.0, "vy": 0.0 } }],
//!   [1.0, 2.0, { "A": { "x": 1.0, "y": 0.0, "vx": 1.0, "vy": 0.0 } }]
//! ]
//! ```
//!
//! Entries are taken in the order received; nothing here re-sorts them.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FrameFault, MalformedFrame, TrajectoryError};

pub type AgentId = String;

/// One body's kinematic state at an instant, keyed by channel name.
pub type AgentState = IndexMap<String, f64>;

/// One time-stamped snapshot of every agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub t0: f64,
    pub t1: f64,
    pub agents: IndexMap<AgentId, AgentState>,
}

impl Frame {
    pub fn new(t0: f64, t1: f64, agents: IndexMap<AgentId, AgentState>) -> Self {
        Self { t0, t1, agents }
    }
}

/// Ordered frames of one simulation run. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    frames: Vec<Frame>,
}

type WireEntry = (f64, f64, IndexMap<AgentId, IndexMap<String, Value>>);

impl Trajectory {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The canonical initial condition.
    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Decode a response body.
    pub fn from_wire_slice(body: &[u8]) -> Result<Self, TrajectoryError> {
        let entries: Vec<WireEntry> = serde_json::from_slice(body)?;
        Self::from_entries(entries)
    }

    pub fn from_wire_json(body: &str) -> Result<Self, TrajectoryError> {
        Self::from_wire_slice(body.as_bytes())
    }

    pub fn from_wire(value: Value) -> Result<Self, TrajectoryError> {
        let entries: Vec<WireEntry> = serde_json::from_value(value)?;
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<WireEntry>) -> Result<Self, TrajectoryError> {
        let mut frames = Vec::with_capacity(entries.len());
        for (index, (t0, t1, raw_agents)) in entries.into_iter().enumerate() {
            // NaN spans fail here too
            if !(t1 > t0) {
                return Err(MalformedFrame {
                    frame: index,
                    agent: None,
                    fault: FrameFault::InvalidSpan,
                }
                .into());
            }

            let mut agents = IndexMap::with_capacity(raw_agents.len());
            for (agent, channels) in raw_agents {
                let mut state = AgentState::with_capacity(channels.len());
                for (channel, value) in channels {
                    let Some(v) = value.as_f64() else {
                        return Err(MalformedFrame::agent(
                            index,
                            &agent,
                            FrameFault::NonNumeric(channel),
                        )
                        .into());
                    };
                    state.insert(channel, v);
                }
                agents.insert(agent, state);
            }
            frames.push(Frame::new(t0, t1, agents));
        }
        Ok(Self { frames })
    }

    /// Encode back into the wire layout.
    pub fn to_wire(&self) -> Value {
        Value::Array(
            self.frames
                .iter()
                .map(|f| serde_json::json!([f.t0, f.t1, f.agents]))
                .collect(),
        )
    }
}

impl From<Vec<Frame>> for Trajectory {
    fn from(frames: Vec<Frame>) -> Self {
        Self::new(frames)
    }
}
