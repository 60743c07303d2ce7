//! Orbitview Client
//!
//! Talks to the simulation service and owns the per-viewer session state.

pub mod params;
pub mod session;
pub mod transport;

// Re-export main types
pub use params::*;
pub use session::{fetch_trajectory, run_simulation, CancelFlag, Session, SessionError};
pub use transport::{FetchError, HttpClient, SimulationClient};
