//! Control-plane requests.
//!
//! Resize requests go out over a fresh HTTP/1.1 connection:
//!
//! ```text
//! PATCH {base_path}/projects/{project}/instances/{instance}
//! {"instance":{"nodeCount":3},"fieldMask":"node_count"}
//! {"instance":{"processingUnits":500},"fieldMask":"processing_units"}
//! ```
//!
//! The request is considered accepted as soon as the endpoint answers 2xx;
//! completion of the capacity change is not awaited.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tracing::{debug, info, warn};

use dbscale_autoscale::{CapacityRequester, RequesterError, ResizeFuture};
use dbscale_core::{Capacity, InstanceKey};

/// Longest error body kept in a rejection.
const MAX_ERROR_BODY: usize = 512;

/// JSON body asking for `target` capacity.
pub fn resize_body(target: Capacity) -> serde_json::Value {
    match target {
        Capacity::NodeCount(n) => serde_json::json!({
            "instance": { "nodeCount": n },
            "fieldMask": "node_count",
        }),
        Capacity::ProcessingUnits(n) => serde_json::json!({
            "instance": { "processingUnits": n },
            "fieldMask": "processing_units",
        }),
    }
}

/// Sends resize requests to the instance admin endpoint.
#[derive(Debug, Clone)]
pub struct HttpCapacityRequester {
    /// `host:port` to connect to.
    endpoint: String,
    base_path: String,
    timeout: Duration,
}

impl HttpCapacityRequester {
    pub fn new(endpoint: impl Into<String>, base_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_path: base_path.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Request path for an instance.
    pub fn instance_path(&self, instance: &InstanceKey) -> String {
        format!(
            "{}/projects/{}/instances/{}",
            self.base_path, instance.project_id, instance.instance_id
        )
    }

    async fn send(&self, instance: &InstanceKey, target: Capacity) -> Result<(), RequesterError> {
        let path = self.instance_path(instance);
        let uri = format!("http://{}{}", self.endpoint, path);
        let body = serde_json::to_vec(&resize_body(target))
            .map_err(|e| RequesterError::Transport(e.to_string()))?;

        let stream = tokio::net::TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| RequesterError::Transport(format!("connect {}: {e}", self.endpoint)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| RequesterError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "control plane connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::PATCH)
            .uri(&uri)
            .header(http::header::HOST, self.endpoint.as_str())
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "dbscale-control/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| RequesterError::Transport(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| RequesterError::Transport(format!("request: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            debug!(%uri, %status, "resize accepted");
            return Ok(());
        }

        let bytes = resp
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        warn!(%uri, %status, "resize rejected");
        Err(RequesterError::Rejected {
            status: status.as_u16(),
            body: text,
        })
    }
}

impl CapacityRequester for HttpCapacityRequester {
    fn resize<'a>(&'a self, instance: &'a InstanceKey, target: Capacity) -> ResizeFuture<'a> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.send(instance, target)).await {
                Ok(result) => result,
                Err(_) => Err(RequesterError::Timeout(self.timeout)),
            }
        })
    }
}

/// Accepts every resize without contacting the control plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRequester;

impl CapacityRequester for DryRunRequester {
    fn resize<'a>(&'a self, instance: &'a InstanceKey, target: Capacity) -> ResizeFuture<'a> {
        Box::pin(async move {
            info!(%instance, %target, "dry run: resize not sent");
            Ok(())
        })
    }
}
