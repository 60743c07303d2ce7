//! Validation of user-entered initial conditions and the request payload.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::ValidationError;
use crate::trajectory::AgentState;

/// Channel set a request must carry for every body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSchema {
    #[default]
    Planar,
    Spatial,
}

impl ChannelSchema {
    pub fn channels(self) -> &'static [&'static str] {
        match self {
            Self::Planar => &["x", "y", "vx", "vy"],
            Self::Spatial => &["x", "y", "z", "vx", "vy", "vz", "mass"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Planar => "planar",
            Self::Spatial => "spatial",
        }
    }
}

/// A value as typed into a form field or read from a bodies file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Raw fields per body. `None` is a cleared field.
pub type RawBody = IndexMap<String, Option<RawValue>>;

/// Unvalidated form contents, keyed by body name in entry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawForm {
    bodies: IndexMap<String, RawBody>,
}

impl RawForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bodies(&self) -> &IndexMap<String, RawBody> {
        &self.bodies
    }

    pub fn set(&mut self, body: &str, channel: &str, value: Option<RawValue>) {
        self.bodies
            .entry(body.to_string())
            .or_default()
            .insert(channel.to_string(), value);
    }

    pub fn with(mut self, body: &str, channel: &str, value: impl Into<RawValue>) -> Self {
        self.set(body, channel, Some(value.into()));
        self
    }

    /// Set a field addressed as `body.channel`.
    pub fn set_field(&mut self, field: &str, value: Option<RawValue>) -> Result<(), ValidationError> {
        match field.split_once('.') {
            Some((body, channel)) if !body.is_empty() && !channel.is_empty() => {
                self.set(body, channel, value);
                Ok(())
            }
            _ => Err(ValidationError::UnknownField(field.to_string())),
        }
    }

    pub fn get(&self, body: &str, channel: &str) -> Option<&RawValue> {
        self.bodies.get(body)?.get(channel)?.as_ref()
    }
}

/// Validated initial conditions, one entry per body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationRequest {
    bodies: IndexMap<String, AgentState>,
}

impl SimulationRequest {
    pub fn bodies(&self) -> &IndexMap<String, AgentState> {
        &self.bodies
    }

    pub fn body(&self, name: &str) -> Option<&AgentState> {
        self.bodies.get(name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

fn parse_channel(body: &str, channel: &str, raw: Option<&RawValue>) -> Result<f64, ValidationError> {
    let missing = || ValidationError::Missing {
        body: body.to_string(),
        channel: channel.to_string(),
    };
    let invalid = |raw: String| ValidationError::Invalid {
        body: body.to_string(),
        channel: channel.to_string(),
        raw,
    };

    let value = match raw.ok_or_else(missing)? {
        RawValue::Number(v) => *v,
        RawValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(missing());
            }
            trimmed.parse::<f64>().map_err(|_| invalid(text.clone()))?
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(value.to_string()))
    }
}

/// Validate `form` against `schema`.
///
/// Stops at the first missing or non-numeric channel; nothing is defaulted.
/// Channels outside the schema are not forwarded.
pub fn build(form: &RawForm, schema: ChannelSchema) -> Result<SimulationRequest, ValidationError> {
    if form.bodies.is_empty() {
        return Err(ValidationError::NoBodies);
    }

    let mut bodies = IndexMap::with_capacity(form.bodies.len());
    for (name, raw_body) in &form.bodies {
        let mut state = AgentState::with_capacity(schema.channels().len());
        for &channel in schema.channels() {
            let raw = raw_body.get(channel).and_then(Option::as_ref);
            state.insert(channel.to_string(), parse_channel(name, channel, raw)?);
        }
        bodies.insert(name.clone(), state);
    }

    Ok(SimulationRequest { bodies })
}

/// Transport payload: `{ body: { channel: number } }` in request order.
pub fn serialize(request: &SimulationRequest) -> Value {
    let mut payload = Map::with_capacity(request.bodies.len());
    for (name, state) in &request.bodies {
        let channels: Map<String, Value> = state
            .iter()
            .map(|(ch, v)| {
                let number = Number::from_f64(*v).map_or(Value::Null, Value::Number);
                (ch.clone(), number)
            })
            .collect();
        payload.insert(name.clone(), Value::Object(channels));
    }
    Value::Object(payload)
}

pub fn deserialize(payload: Value) -> Result<SimulationRequest, serde_json::Error> {
    serde_json::from_value(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_form() -> RawForm {
        RawForm::new()
            .with("Planet", "x", 0.0)
            .with("Planet", "y", 0.1)
            .with("Planet", "vx", 0.1)
            .with("Planet", "vy", 0.0)
            .with("Satellite", "x", "0")
            .with("Satellite", "y", " 1 ")
            .with("Satellite", "vx", "1.0")
            .with("Satellite", "vy", "-0")
    }

    #[test]
    fn test_build_planar() {
        let req = build(&default_form(), ChannelSchema::Planar).unwrap();
        assert_eq!(req.len(), 2);
        assert_eq!(req.body("Planet").unwrap()["y"], 0.1);
        assert_eq!(req.body("Satellite").unwrap()["y"], 1.0);
        let names: Vec<&str> = req.bodies().keys().map(String::as_str).collect();
        assert_eq!(names, ["Planet", "Satellite"]);
    }

    #[test]
    fn test_missing_channel_is_named() {
        let form = RawForm::new()
            .with("Planet", "x", 0.0)
            .with("Planet", "y", 0.1)
            .with("Planet", "vx", 0.1);
        let err = build(&form, ChannelSchema::Planar).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Missing {
                body: "Planet".into(),
                channel: "vy".into()
            }
        );
        assert_eq!(err.field().as_deref(), Some("Planet.vy"));
    }

    #[test]
    fn test_blank_and_cleared_fields_are_missing() {
        let mut form = default_form();
        form.set("Satellite", "vx", Some("   ".into()));
        assert_eq!(
            build(&form, ChannelSchema::Planar).unwrap_err().field().as_deref(),
            Some("Satellite.vx")
        );

        let mut form = default_form();
        form.set("Planet", "x", None);
        assert!(matches!(
            build(&form, ChannelSchema::Planar),
            Err(ValidationError::Missing { .. })
        ));
    }

    #[test]
    fn test_unparseable_and_non_finite_rejected() {
        let mut form = default_form();
        form.set("Planet", "vx", Some("fast".into()));
        match build(&form, ChannelSchema::Planar) {
            Err(ValidationError::Invalid { body, channel, raw }) => {
                assert_eq!((body.as_str(), channel.as_str(), raw.as_str()), ("Planet", "vx", "fast"));
            }
            other => panic!("unexpected {:?}", other),
        }

        for bad in ["NaN", "inf", "-infinity"] {
            let mut form = default_form();
            form.set("Satellite", "y", Some(bad.into()));
            assert!(matches!(
                build(&form, ChannelSchema::Planar),
                Err(ValidationError::Invalid { .. })
            ));
        }

        let mut form = default_form();
        form.set("Planet", "y", Some(RawValue::Number(f64::INFINITY)));
        assert!(matches!(
            build(&form, ChannelSchema::Planar),
            Err(ValidationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_first_failure_only() {
        let form = RawForm::new().with("A", "x", "bad").with("B", "x", 1.0);
        // A.x fails before A.y or anything in B is looked at
        assert_eq!(
            build(&form, ChannelSchema::Planar).unwrap_err().field().as_deref(),
            Some("A.x")
        );
    }

    #[test]
    fn test_spatial_schema_requires_all_channels() {
        let err = build(&default_form(), ChannelSchema::Spatial).unwrap_err();
        assert_eq!(err.field().as_deref(), Some("Planet.z"));

        let mut form = default_form();
        for body in ["Planet", "Satellite"] {
            form.set(body, "z", Some(0.0.into()));
            form.set(body, "vz", Some(0.0.into()));
            form.set(body, "mass", Some(1.0.into()));
        }
        let req = build(&form, ChannelSchema::Spatial).unwrap();
        let channels: Vec<&str> = req.body("Planet").unwrap().keys().map(String::as_str).collect();
        assert_eq!(channels, ChannelSchema::Spatial.channels());
    }

    #[test]
    fn test_extra_channels_not_forwarded() {
        let form = default_form().with("Planet", "colour", "blue");
        let req = build(&form, ChannelSchema::Planar).unwrap();
        assert!(req.body("Planet").unwrap().get("colour").is_none());
    }

    #[test]
    fn test_no_bodies() {
        assert_eq!(
            build(&RawForm::new(), ChannelSchema::Planar).unwrap_err(),
            ValidationError::NoBodies
        );
    }

    #[test]
    fn test_set_field_path() {
        let mut form = RawForm::new();
        form.set_field("Planet.vx", Some(0.5.into())).unwrap();
        assert_eq!(form.get("Planet", "vx"), Some(&RawValue::Number(0.5)));
        assert!(matches!(
            form.set_field("Planet", None),
            Err(ValidationError::UnknownField(_))
        ));
        assert!(form.set_field(".vx", None).is_err());
    }

    #[test]
    fn test_payload_shape() {
        let req = build(&default_form(), ChannelSchema::Planar).unwrap();
        let payload = serialize(&req);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"Planet":{"x":0.0,"y":0.1,"vx":0.1,"vy":0.0},"Satellite":{"x":0.0,"y":1.0,"vx":1.0,"vy":-0.0}}"#
        );
    }

    #[test]
    fn test_payload_round_trips_exactly() {
        let form = RawForm::new()
            .with("A", "x", 0.1 + 0.2)
            .with("A", "y", "1e-300")
            .with("A", "vx", std::f64::consts::PI)
            .with("A", "vy", "-123456789.123456789");
        let req = build(&form, ChannelSchema::Planar).unwrap();

        assert_eq!(deserialize(serialize(&req)).unwrap(), req);

        // through the wire text as well
        let text = serde_json::to_string(&serialize(&req)).unwrap();
        let back = deserialize(serde_json::from_str(&text).unwrap()).unwrap();
        for (name, state) in req.bodies() {
            for (ch, v) in state {
                assert_eq!(back.body(name).unwrap()[ch].to_bits(), v.to_bits());
            }
        }
    }

    fn wire_round_trip(req: &SimulationRequest) -> SimulationRequest {
        let text = serde_json::to_string(&serialize(req)).unwrap();
        deserialize(serde_json::from_str(&text).unwrap()).unwrap()
    }

    fn assert_same_bits(a: &SimulationRequest, b: &SimulationRequest) {
        assert_eq!(a.len(), b.len());
        for (name, state) in a.bodies() {
            let other = b.body(name).unwrap();
            assert!(state.keys().eq(other.keys()));
            for (ch, v) in state {
                assert_eq!(other[ch].to_bits(), v.to_bits(), "{name}.{ch} = {v:e}");
            }
        }
    }

    #[test]
    fn test_edge_numbers_round_trip_bit_exact() {
        let numbers = [
            0.0,
            -0.0,
            f64::MIN_POSITIVE,
            -f64::MIN_POSITIVE,
            5e-324,
            -5e-324,
            2.225_073_858_507_201e-308,
            f64::EPSILON,
            f64::MAX,
            f64::MIN,
            1e308,
            0.1 + 0.2,
            1.0 / 3.0,
            9_007_199_254_740_992.0,
            -123_456_789.123_456_78,
        ];
        for &n in &numbers {
            // same value on every channel, and in a second body with flipped sign
            let mut form = RawForm::new();
            for ch in ChannelSchema::Spatial.channels() {
                form.set("A", ch, Some(n.into()));
                form.set("B", ch, Some((-n).into()));
            }
            let req = build(&form, ChannelSchema::Spatial).unwrap();
            assert_eq!(req.body("A").unwrap()["x"].to_bits(), n.to_bits());

            assert_same_bits(&req, &deserialize(serialize(&req)).unwrap());
            assert_same_bits(&req, &wire_round_trip(&req));
        }
    }

    #[test]
    fn test_edge_decimal_strings_round_trip_bit_exact() {
        let texts = [
            "-0",
            "-0.0",
            "4.9406564584124654e-324",
            "2.2250738585072011e-308",
            "1.7976931348623157e308",
            "0.30000000000000004440892098500626161694526672363281",
            "3.14159265358979323846264338327950288419716939937510",
            "123456789012345678901234567890",
            "  0.1000000000000000055511151231257827  ",
            "1e-320",
        ];
        for text in texts {
            let form = RawForm::new()
                .with("A", "x", text)
                .with("A", "y", text)
                .with("A", "vx", text)
                .with("A", "vy", text);
            let req = build(&form, ChannelSchema::Planar).unwrap();
            let expected: f64 = text.trim().parse().unwrap();
            assert_eq!(req.body("A").unwrap()["vy"].to_bits(), expected.to_bits(), "{text}");

            assert_same_bits(&req, &wire_round_trip(&req));
        }
    }

    #[test]
    fn test_raw_form_from_json() {
        let form: RawForm = serde_json::from_str(
            r#"{"Planet": {"x": 0, "y": "0.1", "vx": 0.1, "vy": null}}"#,
        )
        .unwrap();
        assert_eq!(form.get("Planet", "y"), Some(&RawValue::Text("0.1".into())));
        assert_eq!(form.get("Planet", "vy"), None);
        assert_eq!(
            build(&form, ChannelSchema::Planar).unwrap_err().field().as_deref(),
            Some("Planet.vy")
        );
    }
}
