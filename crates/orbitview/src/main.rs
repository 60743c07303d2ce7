//! Orbitview - n-body initial-condition editor and trajectory viewer

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use orbitview_client::{HttpClient, DEFAULT_SERVICE_URL};
use orbitview_core::{ChannelSchema, DEFAULT_FRAME_RATE};
use orbitview_web::{AppState, ViewerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "orbitview")]
#[command(about = "Edit initial conditions, run n-body simulations and replay trajectories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch export
    Cli {
        /// Pass remaining arguments to orbitview-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Launch the web viewer
    Viewer {
        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,

        /// Simulation service base URL
        #[arg(long, default_value = DEFAULT_SERVICE_URL)]
        service: String,

        /// Directory holding index.html and assets/
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Playback frames per second at speed 1
        #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
        frame_rate: f64,

        /// Channels every body must carry
        #[arg(long, value_enum, default_value = "planar")]
        schema: Schema,

        /// Quiet period before a form edit is committed
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
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

fn viewer_config(command: Commands) -> Option<(u16, String, ViewerConfig)> {
    let Commands::Viewer {
        port,
        host,
        service,
        static_dir,
        frame_rate,
        schema,
        debounce_ms,
    } = command
    else {
        return None;
    };
    let defaults = ViewerConfig::default();
    let config = ViewerConfig {
        service_url: service,
        frame_rate,
        debounce: Duration::from_millis(debounce_ms),
        schema: schema.into(),
        static_dir: static_dir.unwrap_or(defaults.static_dir),
    };
    Some((port, host, config))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cli { args }) => {
            let cli_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            run_cli(&cli_args)
        }
        Some(command) => {
            let (port, host, config) = viewer_config(command).context("unknown subcommand")?;
            run_viewer(port, &host, config)
        }
        // Default to the viewer
        None => run_viewer(8080, "0.0.0.0", ViewerConfig::default()),
    }
}

fn run_cli(args: &[&str]) -> anyhow::Result<()> {
    let mut full_args = vec!["orbitview-cli"];
    full_args.extend(args);

    match orbitview_cli::run_cli_main(&full_args) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("CLI error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_viewer(port: u16, host: &str, config: ViewerConfig) -> anyhow::Result<()> {
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::runtime::Runtime;
    let rt = Runtime::new()?;
    rt.block_on(async {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;
        let client = HttpClient::new(config.service_url.clone());
        let service = config.service_url.clone();
        let app = orbitview_web::create_router(AppState::new(client, config)?);
        println!("listening on http://{}", addr);
        tracing::info!(%addr, %service, "viewer started");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (u16, String, ViewerConfig) {
        let cli = Cli::try_parse_from(args).unwrap();
        viewer_config(cli.command.unwrap()).unwrap()
    }

    #[test]
    fn test_viewer_defaults() {
        let (port, host, config) = parse(&["orbitview", "viewer"]);
        assert_eq!(port, 8080);
        assert_eq!(host, "0.0.0.0");
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.frame_rate, DEFAULT_FRAME_RATE);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.schema, ChannelSchema::Planar);
    }

    #[test]
    fn test_viewer_flags_reach_config() {
        let (port, _, config) = parse(&[
            "orbitview",
            "viewer",
            "--port",
            "9000",
            "--service",
            "http://sim:8000",
            "--frame-rate",
            "60",
            "--schema",
            "spatial",
            "--debounce-ms",
            "50",
            "--static-dir",
            "public",
        ]);
        assert_eq!(port, 9000);
        assert_eq!(config.service_url, "http://sim:8000");
        assert_eq!(config.frame_rate, 60.0);
        assert_eq!(config.schema, ChannelSchema::Spatial);
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.static_dir, PathBuf::from("public"));
    }

    #[test]
    fn test_cli_passthrough_is_not_a_viewer() {
        let cli = Cli::try_parse_from(["orbitview", "cli", "--format", "json"]).unwrap();
        assert!(viewer_config(cli.command.unwrap()).is_none());
    }
}
