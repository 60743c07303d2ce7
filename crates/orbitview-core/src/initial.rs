//! Initial-condition snapshot of a trajectory.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::TrajectoryError;
use crate::reshape::{ChannelPair, POSITION, VELOCITY};
use crate::trajectory::{AgentId, AgentState, Trajectory};

/// The agents of frame 0.
pub fn extract_initial(
    trajectory: &Trajectory,
) -> Result<&IndexMap<AgentId, AgentState>, TrajectoryError> {
    trajectory
        .first()
        .map(|frame| &frame.agents)
        .ok_or(TrajectoryError::Empty)
}

/// One row of the initial-conditions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitialConditionRow {
    pub agent: AgentId,
    /// `(x, y)` to three decimals.
    pub position: String,
    /// `(vx, vy)` to three decimals.
    pub velocity: String,
}

fn format_pair(state: &AgentState, pair: ChannelPair) -> String {
    let fmt = |ch: &str| match state.get(ch) {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    };
    format!("({}, {})", fmt(pair.x), fmt(pair.y))
}

impl InitialConditionRow {
    pub fn from_initial(agents: &IndexMap<AgentId, AgentState>) -> Vec<Self> {
        agents
            .iter()
            .map(|(agent, state)| Self {
                agent: agent.clone(),
                position: format_pair(state, POSITION),
                velocity: format_pair(state, VELOCITY),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_frame() {
        let traj = Trajectory::from_wire_json(
            r#"[[0,1,{"Planet":{"x":0,"y":0.1,"vx":0.1,"vy":0}}],
                [1,2,{"Planet":{"x":5,"y":5,"vx":5,"vy":5}}]]"#,
        )
        .unwrap();
        let initial = extract_initial(&traj).unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial["Planet"]["y"], 0.1);
        assert_eq!(initial["Planet"]["vx"], 0.1);
    }

    #[test]
    fn test_extract_empty() {
        assert!(matches!(
            extract_initial(&Trajectory::default()),
            Err(TrajectoryError::Empty)
        ));
    }

    #[test]
    fn test_table_rows() {
        let traj = Trajectory::from_wire_json(
            r#"[[0,1,{"Planet":{"x":0,"y":0.1,"vx":0.1,"vy":0},
                      "Satellite":{"x":0,"y":1,"vx":-1.23456}}]]"#,
        )
        .unwrap();
        let rows = InitialConditionRow::from_initial(extract_initial(&traj).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].agent, "Planet");
        assert_eq!(rows[0].position, "(0.000, 0.100)");
        assert_eq!(rows[0].velocity, "(0.100, 0.000)");
        assert_eq!(rows[1].velocity, "(-1.235, n/a)");
    }
}
