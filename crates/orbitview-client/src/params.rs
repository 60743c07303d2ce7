//! Form defaults and slider ranges for the initial-conditions editor.

use orbitview_core::RawForm;
use serde::Serialize;

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Step size for sliders.
    pub step: f64,
}

impl ParamSpec {
    /// Create a new parameter specification.
    pub const fn new(label: &'static str, min: f64, max: f64, step: f64) -> Self {
        Self {
            label,
            min,
            max,
            step,
        }
    }
}

/// Per-body initial-condition fields.
pub mod body {
    use super::ParamSpec;

    pub const X: ParamSpec = ParamSpec::new("Initial X", -5.0, 5.0, 0.1);
    pub const Y: ParamSpec = ParamSpec::new("Initial Y", -5.0, 5.0, 0.1);
    pub const Z: ParamSpec = ParamSpec::new("Initial Z", -5.0, 5.0, 0.1);
    pub const VX: ParamSpec = ParamSpec::new("Initial VX", -5.0, 5.0, 0.1);
    pub const VY: ParamSpec = ParamSpec::new("Initial VY", -5.0, 5.0, 0.1);
    pub const VZ: ParamSpec = ParamSpec::new("Initial VZ", -5.0, 5.0, 0.1);
    pub const MASS: ParamSpec = ParamSpec::new("Mass", 0.0, 100.0, 0.1);
}

/// Playback controls.
pub mod playback {
    use super::ParamSpec;

    pub const SPEED: ParamSpec = ParamSpec::new("Speed", 0.1, 5.0, 0.1);
}

/// Where the simulation service listens unless told otherwise.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Bodies pre-filled into a fresh form.
pub const DEFAULT_BODIES: [(&str, [(&str, f64); 4]); 2] = [
    ("Planet", [("x", 0.0), ("y", 0.1), ("vx", 0.1), ("vy", 0.0)]),
    ("Satellite", [("x", 0.0), ("y", 1.0), ("vx", 1.0), ("vy", 0.0)]),
];

/// Slider spec for a channel name.
pub fn channel_spec(channel: &str) -> Option<ParamSpec> {
    match channel {
        "x" => Some(body::X),
        "y" => Some(body::Y),
        "z" => Some(body::Z),
        "vx" => Some(body::VX),
        "vy" => Some(body::VY),
        "vz" => Some(body::VZ),
        "mass" => Some(body::MASS),
        _ => None,
    }
}

/// A form holding [`DEFAULT_BODIES`].
pub fn default_form() -> RawForm {
    let mut form = RawForm::new();
    for (name, channels) in DEFAULT_BODIES.iter() {
        for (channel, value) in channels.iter() {
            form.set(name, channel, Some((*value).into()));
        }
    }
    form
}
