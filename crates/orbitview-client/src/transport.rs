//! Exchange with the external simulation service.
//!
//! `POST /simulation` starts a run from a request payload; `GET /simulation`
//! returns the trajectory of the latest run.

use std::future::Future;

use orbitview_core::request::serialize;
use orbitview_core::{SimulationRequest, Trajectory, TrajectoryError};
use thiserror::Error;
use tracing::{debug, info};

use crate::params::DEFAULT_SERVICE_URL;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("simulation service responded with status {status}")]
    Status { status: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not read response body: {0}")]
    Decode(String),
    #[error("service returned an unusable trajectory: {0}")]
    Trajectory(#[from] TrajectoryError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// What the pipeline needs from a simulation service.
pub trait SimulationClient {
    fn start(
        &self,
        request: &SimulationRequest,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;

    fn fetch(&self) -> impl Future<Output = Result<Trajectory, FetchError>> + Send;
}

/// [`SimulationClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_URL)
    }
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/simulation", self.base_url.trim_end_matches('/'))
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
        })
    }
}

impl SimulationClient for HttpClient {
    async fn start(&self, request: &SimulationRequest) -> Result<(), FetchError> {
        let url = self.endpoint();
        info!(%url, bodies = request.len(), "starting simulation");
        let response = self.http.post(&url).json(&serialize(request)).send().await?;
        check_status(&response)
    }

    async fn fetch(&self) -> Result<Trajectory, FetchError> {
        let url = self.endpoint();
        let response = self.http.get(&url).send().await?;
        check_status(&response)?;
        let body = response.bytes().await?;
        let trajectory = Trajectory::from_wire_slice(&body)?;
        debug!(%url, frames = trajectory.len(), "fetched trajectory");
        Ok(trajectory)
    }
}
