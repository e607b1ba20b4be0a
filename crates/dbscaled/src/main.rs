//! dbscaled — the dbscale daemon.
//!
//! Assembles the state store, the control-plane client and the decision
//! engine, and exposes them either over HTTP or as one-off commands.
//!
//! # Usage
//!
//! ```text
//! dbscaled serve --config /etc/dbscale/dbscale.toml --port 8080
//! dbscaled decide --request request.json
//! dbscaled state my-project my-instance --history 10
//! dbscaled config
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbscale_core::DaemonConfig;
use dbscale_core::config::LoggingConfig;

const DEFAULT_LOG_FILTER: &str = "info,dbscaled=debug,dbscale=debug";

#[derive(Parser)]
#[command(name = "dbscaled", about = "Database capacity autoscaler daemon")]
struct Cli {
    /// Path to dbscale.toml. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent state (overrides config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log requests instead of sending them to the control plane.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve scaling decisions over HTTP.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(long)]
        port: Option<u16>,

        /// Control plane `host:port` (overrides config).
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Run one decision and print the report as JSON.
    Decide {
        /// Request file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        request: String,
    },

    /// Print the stored state of one instance.
    State {
        project: String,
        instance: String,

        /// Also print the last N scaling actions.
        #[arg(long)]
        history: Option<usize>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.server.data_dir = data_dir;
    }
    if cli.dry_run {
        config.control_plane.dry_run = true;
    }

    init_tracing(&config.logging);

    match cli.command {
        Command::Serve { port, endpoint } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(endpoint) = endpoint {
                config.control_plane.endpoint = endpoint;
            }
            commands::serve(config).await
        }
        Command::Decide { request } => commands::decide(config, &request).await,
        Command::State {
            project,
            instance,
            history,
        } => commands::show_state(config, &project, &instance, history),
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<DaemonConfig> {
    match path {
        Some(path) => DaemonConfig::from_file(path),
        None => Ok(DaemonConfig::default()),
    }
}

/// `RUST_LOG` wins over the config file, which wins over the built-in filter.
fn log_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_tracing(logging: &LoggingConfig) {
    // Logs go to stderr so `decide` and `state` can print JSON on stdout.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(logging))
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "dbscaled",
            "serve",
            "--port",
            "9000",
            "--endpoint",
            "10.0.0.1:443",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Command::Serve { port, endpoint } => {
                assert_eq!(port, Some(9000));
                assert_eq!(endpoint.as_deref(), Some("10.0.0.1:443"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn cli_decide_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["dbscaled", "decide"]).unwrap();
        match cli.command {
            Command::Decide { request } => assert_eq!(request, "-"),
            _ => panic!("expected decide"),
        }
    }

    #[test]
    fn cli_state_takes_instance() {
        let cli =
            Cli::try_parse_from(["dbscaled", "state", "proj", "db-1", "--history", "5"]).unwrap();
        match cli.command {
            Command::State {
                project,
                instance,
                history,
            } => {
                assert_eq!(project, "proj");
                assert_eq!(instance, "db-1");
                assert_eq!(history, Some(5));
            }
            _ => panic!("expected state"),
        }
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbscale.toml");
        std::fs::write(&path, "[server]\nport = 9999\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9999);
    }
}
