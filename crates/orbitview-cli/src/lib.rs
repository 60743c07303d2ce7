//! Orbitview CLI - submit initial conditions and export the trajectory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use nalgebra::Vector2;
use orbitview_client::{run_simulation, CancelFlag, HttpClient, Session, DEFAULT_SERVICE_URL};
use orbitview_core::{
    build, ChannelSchema, RawForm, Reshaped, Series, Trajectory, DEFAULT_FRAME_RATE,
};
use tracing::info;

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    main_inner(args)
}

#[derive(Parser, Debug)]
#[command(name = "orbitview-cli")]
#[command(about = "Run an n-body simulation and export the trajectory")]
#[command(version)]
pub struct Args {
    /// Bodies file (YAML or JSON): body -> channel -> value
    #[arg(short, long)]
    bodies: Option<PathBuf>,

    /// Channels every body must carry
    #[arg(long, value_enum, default_value = "planar")]
    schema: Schema,

    /// Simulation service base URL
    #[arg(long, default_value = DEFAULT_SERVICE_URL)]
    service: String,

    /// Load a previously exported wire trajectory instead of calling the service
    #[arg(long)]
    trajectory: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    // ── Replay ────────────────────────────────────────────────
    /// Step through the trajectory in real time after exporting
    #[arg(long)]
    replay: bool,

    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Schema {
    Planar,
    Spatial,
}

impl From<Schema> for ChannelSchema {
    fn from(schema: Schema) -> Self {
        match schema {
            Schema::Planar => ChannelSchema::Planar,
            Schema::Spatial => ChannelSchema::Spatial,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main_inner(args: Args) -> Result<()> {
    println!("Orbitview trajectory export");
    println!("===========================\n");

    let form = match &args.bodies {
        Some(path) => load_bodies(path)?,
        None => orbitview_client::default_form(),
    };
    let request = build(&form, args.schema.into()).context("invalid initial conditions")?;

    let rt = tokio::runtime::Runtime::new()?;
    let trajectory = match &args.trajectory {
        Some(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("reading trajectory {}", path.display()))?;
            Trajectory::from_wire_json(&body)?
        }
        None => {
            println!("Submitting {} bodies to {}...", request.len(), args.service);
            let client = HttpClient::new(args.service.clone());
            rt.block_on(run_simulation(&client, &request, &CancelFlag::new()))?
                .ok_or_else(|| anyhow!("simulation was cancelled"))?
        }
    };

    let mut session = Session::new(args.frame_rate)?;
    session
        .replace(trajectory)
        .context("service returned an unusable trajectory")?;

    print_initial_table(&session);
    let series = session.series().context("no trajectory loaded")?;
    print_stats(series);

    let trajectory = session.trajectory().context("no trajectory loaded")?;
    write_output(&args, &trajectory, series)?;

    if args.replay {
        rt.block_on(replay(&mut session, args.speed))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Read a bodies file, choosing the parser from the extension.
fn load_bodies(path: &Path) -> Result<RawForm> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading bodies {}", path.display()))?;
    let form = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML bodies {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON bodies {}", path.display()))?,
    };
    Ok(form)
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct AgentStats {
    agent: String,
    max_radius: f64,
    max_speed: f64,
}

fn peak_norm(series: &Series) -> f64 {
    series
        .xs
        .iter()
        .zip(&series.ys)
        .map(|(&x, &y)| Vector2::new(x, y).norm())
        .fold(0.0, f64::max)
}

fn agent_stats(series: &Reshaped) -> Vec<AgentStats> {
    series
        .position
        .iter()
        .map(|(agent, position)| AgentStats {
            agent: agent.clone(),
            max_radius: peak_norm(position),
            max_speed: series.velocity.get(agent).map_or(0.0, peak_norm),
        })
        .collect()
}

fn print_initial_table(session: &Session) {
    println!("Initial conditions:");
    println!("  {:<16} {:<20} {:<20}", "Body", "Position", "Velocity");
    for row in session.initial_rows() {
        println!("  {:<16} {:<20} {:<20}", row.agent, row.position, row.velocity);
    }
}

fn print_stats(series: &Reshaped) {
    println!("\nTrajectory Stats:");
    println!("  Frames:      {}", series.frame_count());
    for stats in agent_stats(series) {
        println!(
            "  {:<12} max radius {:.3}, max speed {:.3}",
            stats.agent, stats.max_radius, stats.max_speed
        );
    }
    println!("-----------------------------");
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn write_output(args: &Args, trajectory: &Trajectory, series: &Reshaped) -> Result<()> {
    fs::create_dir_all(&args.output_dir)?;
    match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("positions.csv");
            write_series_csv(&path, trajectory, &series.position, ["x", "y"])?;
            println!("Positions written to {:?}", path);

            let path = args.output_dir.join("velocities.csv");
            write_series_csv(&path, trajectory, &series.velocity, ["vx", "vy"])?;
            println!("Velocities written to {:?}", path);
        }
        OutputFormat::Json => {
            let times: Vec<[f64; 2]> = trajectory.frames().iter().map(|f| [f.t0, f.t1]).collect();
            let doc = serde_json::json!({
                "times": times,
                "position": series.position,
                "velocity": series.velocity,
            });
            let path = args.output_dir.join("series.json");
            fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
            println!("Series written to {:?}", path);
        }
    }
    Ok(())
}

/// One row per frame: `frame,t0,t1` then an x/y column pair per agent.
fn write_series_csv(
    path: &Path,
    trajectory: &Trajectory,
    series: &IndexMap<String, Series>,
    channels: [&str; 2],
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["frame".to_string(), "t0".to_string(), "t1".to_string()];
    for agent in series.keys() {
        header.extend(channels.iter().map(|c| format!("{agent}_{c}")));
    }
    wtr.write_record(&header)?;

    for (i, frame) in trajectory.frames().iter().enumerate() {
        let mut record = vec![i.to_string(), format!("{:.4}", frame.t0), format!("{:.4}", frame.t1)];
        for s in series.values() {
            record.push(format!("{:.6}", s.xs[i]));
            record.push(format!("{:.6}", s.ys[i]));
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Drive playback from a real-time interval until it pauses on the last frame.
async fn replay(session: &mut Session, speed: f64) -> Result<()> {
    let trajectory = session.trajectory().context("no trajectory loaded")?;
    let period = Duration::from_secs_f64(1.0 / session.frame_rate());
    let pc = session.playback_mut().context("no trajectory loaded")?;
    pc.set_speed(speed)?;
    pc.play();
    info!(frames = pc.frame_count(), speed, "replay started");

    // time is measured from the last cursor move so short periods still advance
    let mut interval = tokio::time::interval(period);
    let mut moved_at = interval.tick().await;
    loop {
        let now = interval.tick().await;
        let before = pc.cursor();
        let state = pc.tick((now - moved_at).as_secs_f64());
        if state.cursor != before {
            moved_at = now;
        }

        if let Some(frame) = trajectory.get(state.cursor) {
            info!(cursor = state.cursor, t0 = frame.t0, t1 = frame.t1, "replay");
        }
        if !state.playing {
            break;
        }
    }
    println!("Replay finished at frame {}", pc.cursor());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitview_core::PlaybackMode;
    use tempfile::tempdir;

    const WIRE: &str = r#"[
        [0, 1, {"Planet": {"x": 3, "y": 4, "vx": 0, "vy": 1},
                "Satellite": {"x": 0, "y": 1, "vx": 1, "vy": 0}}],
        [1, 2, {"Planet": {"x": 0, "y": 1, "vx": -6, "vy": 8},
                "Satellite": {"x": 1, "y": 1, "vx": 1, "vy": 1}}],
        [2, 3, {"Planet": {"x": 1, "y": 0, "vx": 0, "vy": 0},
                "Satellite": {"x": 2, "y": 0, "vx": 0, "vy": -1}}]
    ]"#;

    fn loaded() -> Session {
        let mut session = Session::new(DEFAULT_FRAME_RATE).unwrap();
        session.replace(Trajectory::from_wire_json(WIRE).unwrap()).unwrap();
        session
    }

    #[test]
    fn test_load_bodies_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("bodies.yaml");
        fs::write(&yaml, "Planet:\n  x: 0\n  y: 0.1\n  vx: 0.1\n  vy: 0\n").unwrap();
        let json = dir.path().join("bodies.json");
        fs::write(&json, r#"{"Planet": {"x": 0, "y": 0.1, "vx": 0.1, "vy": 0}}"#).unwrap();

        let from_yaml = build(&load_bodies(&yaml).unwrap(), ChannelSchema::Planar).unwrap();
        let from_json = build(&load_bodies(&json).unwrap(), ChannelSchema::Planar).unwrap();
        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.body("Planet").unwrap()["vx"], 0.1);
    }

    #[test]
    fn test_load_bodies_reports_path() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("bodies.json");
        fs::write(&bad, "not json").unwrap();
        let err = load_bodies(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("bodies.json"));
    }

    #[test]
    fn test_agent_stats() {
        let session = loaded();
        let stats = agent_stats(session.series().unwrap());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].agent, "Planet");
        assert!((stats[0].max_radius - 5.0).abs() < 1e-12);
        assert!((stats[0].max_speed - 10.0).abs() < 1e-12);
        assert!((stats[1].max_radius - 2.0).abs() < 1e-12);
        assert!((stats[1].max_speed - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_csv_export_from_trajectory_file() {
        let dir = tempdir().unwrap();
        let wire = dir.path().join("trajectory.json");
        fs::write(&wire, WIRE).unwrap();
        let out = dir.path().join("out");

        run_cli_main(&[
            "orbitview-cli",
            "--trajectory",
            wire.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ])
        .unwrap();

        let positions = fs::read_to_string(out.join("positions.csv")).unwrap();
        let mut lines = positions.lines();
        assert_eq!(
            lines.next().unwrap(),
            "frame,t0,t1,Planet_x,Planet_y,Satellite_x,Satellite_y"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0,0.0000,1.0000,3.000000,4.000000,0.000000,1.000000"
        );
        assert_eq!(lines.count(), 2);

        let velocities = fs::read_to_string(out.join("velocities.csv")).unwrap();
        assert!(velocities.starts_with("frame,t0,t1,Planet_vx,Planet_vy"));
    }

    #[test]
    fn test_json_export() {
        let dir = tempdir().unwrap();
        let wire = dir.path().join("trajectory.json");
        fs::write(&wire, WIRE).unwrap();

        run_cli_main(&[
            "orbitview-cli",
            "--trajectory",
            wire.to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
            "--format",
            "json",
        ])
        .unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("series.json")).unwrap())
                .unwrap();
        assert_eq!(doc["times"][2], serde_json::json!([2.0, 3.0]));
        assert_eq!(doc["position"]["Satellite"]["xs"], serde_json::json!([0.0, 1.0, 2.0]));
        assert_eq!(doc["velocity"]["Planet"]["ys"], serde_json::json!([1.0, 8.0, 0.0]));
    }

    #[test]
    fn test_invalid_bodies_fail_before_fetch() {
        let dir = tempdir().unwrap();
        let bodies = dir.path().join("bodies.yaml");
        fs::write(&bodies, "Planet:\n  x: 0\n  y: 0\n  vx: 0\n").unwrap();

        let err = run_cli_main(&[
            "orbitview-cli",
            "--bodies",
            bodies.to_str().unwrap(),
            "--service",
            "http://127.0.0.1:9",
        ])
        .unwrap_err();
        assert!(format!("{err:#}").contains("Planet.vy"));
    }

    #[tokio::test]
    async fn test_replay_stops_on_last_frame() {
        let mut session = loaded();
        replay(&mut session, 5.0).await.unwrap();
        let pc = session.playback().unwrap();
        assert_eq!(pc.cursor(), 2);
        assert_eq!(pc.mode(), PlaybackMode::Paused);
    }

    #[tokio::test]
    async fn test_replay_at_unit_speed_reaches_end() {
        // one interval period is just under one frame at speed 1
        let mut session = loaded();
        replay(&mut session, 1.0).await.unwrap();
        assert_eq!(session.playback().unwrap().cursor(), 2);
    }

    #[tokio::test]
    async fn test_replay_rejects_bad_speed() {
        let mut session = loaded();
        assert!(replay(&mut session, 0.0).await.is_err());
    }
}
