//! Subcommand implementations.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use dbscale_autoscale::{Autoscaler, CapacityRequester};
use dbscale_control::{DryRunRequester, HttpCapacityRequester};
use dbscale_core::config::ControlPlaneConfig;
use dbscale_core::{DaemonConfig, InstanceKey, ScalingRequest};
use dbscale_state::StateStore;

fn open_store(config: &DaemonConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.server.data_dir)
        .with_context(|| format!("creating {}", config.server.data_dir.display()))?;
    let path = config.state_path();
    let store = StateStore::open(&path)
        .with_context(|| format!("opening state store {}", path.display()))?;
    info!(path = ?path, "state store opened");
    Ok(store)
}

fn requester(config: &ControlPlaneConfig) -> Arc<dyn CapacityRequester> {
    if config.dry_run {
        info!("dry run: resize requests will not be sent");
        Arc::new(DryRunRequester)
    } else {
        info!(endpoint = %config.endpoint, base_path = %config.base_path, "control plane client ready");
        Arc::new(HttpCapacityRequester::new(
            config.endpoint.clone(),
            config.base_path.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }
}

fn autoscaler(config: &DaemonConfig, store: &StateStore) -> Autoscaler {
    Autoscaler::new(Arc::new(store.clone()), requester(&config.control_plane))
}

/// `dbscaled serve`
pub async fn serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("dbscale daemon starting");

    let store = open_store(&config)?;
    let engine = autoscaler(&config, &store);

    let router = dbscale_api::build_router(store, engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dbscale daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            // Keep serving rather than exit on a broken signal handler.
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    }
}

fn read_request(source: &str) -> anyhow::Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(source).with_context(|| format!("reading request {source}"))
    }
}

/// `dbscaled decide`
pub async fn decide(config: DaemonConfig, source: &str) -> anyhow::Result<()> {
    let request = ScalingRequest::from_json(&read_request(source)?)
        .context("invalid scaling request")?;

    let store = open_store(&config)?;
    let report = autoscaler(&config, &store).process(&request).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `dbscaled state`
pub fn show_state(
    config: DaemonConfig,
    project: &str,
    instance: &str,
    history: Option<usize>,
) -> anyhow::Result<()> {
    let key = InstanceKey::try_new(project, instance)?.table_key();
    let store = open_store(&config)?;

    let state = store.get_state(&key)?;
    let output = match history {
        Some(limit) => serde_json::json!({
            "state": state,
            "history": store.list_history(&key, limit)?,
        }),
        None => serde_json::to_value(&state)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.server.data_dir = dir.to_path_buf();
        config.control_plane.dry_run = true;
        config
    }

    #[tokio::test]
    async fn decide_dry_run_records_state() {
        let dir = tempfile::tempdir().unwrap();
        let request_path = dir.path().join("request.json");
        std::fs::write(
            &request_path,
            r#"{
                "projectId": "proj", "instanceId": "db-1",
                "currentSize": 1, "units": "NODES",
                "metrics": [{"name": "high_priority_cpu", "value": 90}],
                "scalingMethod": "STEPWISE",
                "scaleOutCoolingMinutes": 5, "scaleInCoolingMinutes": 30,
                "overloadCoolingMinutes": null, "isOverloaded": false
            }"#,
        )
        .unwrap();

        let config = config_in(dir.path());
        decide(config.clone(), request_path.to_str().unwrap())
            .await
            .unwrap();

        let store = StateStore::open(&config.state_path()).unwrap();
        let state = store.get_state("projects/proj/instances/db-1").unwrap();
        assert!(state.has_scaled());
        assert_eq!(state.current_size, Some(3));
    }

    #[tokio::test]
    async fn decide_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let request_path = dir.path().join("request.json");
        std::fs::write(&request_path, "{}").unwrap();

        let err = decide(config_in(dir.path()), request_path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid scaling request"));
    }

    #[test]
    fn state_of_unknown_instance_prints() {
        let dir = tempfile::tempdir().unwrap();
        show_state(config_in(dir.path()), "proj", "missing", Some(5)).unwrap();
    }

    #[tokio::test]
    async fn requester_honours_dry_run() {
        // A port with nothing listening.
        let endpoint = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut config = ControlPlaneConfig {
            endpoint,
            dry_run: true,
            ..Default::default()
        };
        let instance = InstanceKey::new("proj", "db-1");
        let target = dbscale_core::Capacity::NodeCount(2);

        // Dry run never reaches the endpoint.
        assert!(requester(&config).resize(&instance, target).await.is_ok());

        config.dry_run = false;
        let err = requester(&config).resize(&instance, target).await.unwrap_err();
        assert!(matches!(err, dbscale_autoscale::RequesterError::Transport(_)));
    }
}
