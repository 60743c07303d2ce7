//! # Orbitview Core
//!
//! Trajectory ingestion, reshaping and playback for the orbitview viewer:
//! - Trajectory data model and wire decoding
//! - Frame-major → per-agent series reshaping
//! - Initial-condition extraction
//! - Playback state machine
//! - Simulation request validation and payload encoding
//! - Trailing debounce for form edits
//!
//! Nothing here performs I/O; transport lives in `orbitview-client`.

pub mod debounce;
pub mod error;
pub mod initial;
pub mod playback;
pub mod request;
pub mod reshape;
pub mod trajectory;

// Re-export core types
pub use debounce::Debouncer;
pub use error::{FrameFault, MalformedFrame, PlaybackError, TrajectoryError, ValidationError};
pub use initial::{extract_initial, InitialConditionRow};
pub use playback::{PlaybackController, PlaybackMode, PlaybackState, DEFAULT_FRAME_RATE};
pub use request::{build, ChannelSchema, RawForm, RawValue, SimulationRequest};
pub use reshape::{reshape, Reshaped, Series};
pub use trajectory::{AgentId, AgentState, Frame, Trajectory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
