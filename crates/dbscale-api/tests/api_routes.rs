//! Router-level tests: decisions and state inspection over HTTP.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt;

use dbscale_api::build_router;
use dbscale_autoscale::{Autoscaler, CapacityRequester, ManualClock, RequesterError, ResizeFuture};
use dbscale_core::{Capacity, InstanceKey};
use dbscale_state::StateStore;

const NOW: u64 = 1_700_000_000_000;

#[derive(Default)]
struct RecordingRequester {
    calls: Mutex<Vec<Capacity>>,
    fail: bool,
}

impl CapacityRequester for RecordingRequester {
    fn resize<'a>(&'a self, _instance: &'a InstanceKey, target: Capacity) -> ResizeFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(target);
            if self.fail {
                Err(RequesterError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

struct Harness {
    router: Router,
    store: StateStore,
    requester: Arc<RecordingRequester>,
}

fn harness(fail: bool) -> Harness {
    let store = StateStore::open_in_memory().unwrap();
    let requester = Arc::new(RecordingRequester {
        fail,
        ..Default::default()
    });
    let autoscaler = Autoscaler::new(Arc::new(store.clone()), requester.clone())
        .with_clock(Arc::new(ManualClock::new(NOW)));
    Harness {
        router: build_router(store.clone(), autoscaler),
        store,
        requester,
    }
}

fn scale_request(cpu: f64) -> Value {
    json!({
        "projectId": "proj",
        "instanceId": "db-1",
        "currentSize": 2,
        "units": "NODES",
        "metrics": [{ "name": "high_priority_cpu", "value": cpu }],
        "scalingMethod": "DIRECT",
        "scaleOutCoolingMinutes": 5,
        "scaleInCoolingMinutes": 30,
        "overloadCoolingMinutes": null,
        "isOverloaded": false
    })
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn healthz_ok() {
    let h = harness(false);
    let (status, body) = send(&h.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn scale_out_then_cooldown_blocked() {
    let h = harness(false);
    let body = serde_json::to_vec(&scale_request(80.0)).unwrap();

    let (status, first) = send(&h.router, post("/api/v1/scale", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["state"], "DONE");
    assert_eq!(*h.requester.calls.lock().unwrap(), vec![Capacity::NodeCount(3)]);

    let (status, second) = send(&h.router, post("/api/v1/scale", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["state"], "COOLDOWN_BLOCKED");
    assert_eq!(h.requester.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn in_range_metric_is_no_op() {
    let h = harness(false);
    // 2 * 65 / 65 = 2: nothing to do.
    let body = serde_json::to_vec(&scale_request(65.0)).unwrap();

    let (status, resp) = send(&h.router, post("/api/v1/scale", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["state"], "NO_OP");
    assert!(h.requester.calls.lock().unwrap().is_empty());
    assert!(h.store.list_states().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_request_is_bad_request() {
    let h = harness(false);
    let (status, resp) = send(&h.router, post("/api/v1/scale", b"{not json".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
    assert!(resp["error"].is_string());
}

#[tokio::test]
async fn invalid_field_is_bad_request() {
    let h = harness(false);
    let mut request = scale_request(80.0);
    request["currentSize"] = json!(0);

    let (status, _) = send(
        &h.router,
        post("/api/v1/scale", serde_json::to_vec(&request).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.requester.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resize_failure_is_bad_gateway_and_leaves_state() {
    let h = harness(true);
    let body = serde_json::to_vec(&scale_request(80.0)).unwrap();

    let (status, resp) = send(&h.router, post("/api/v1/scale", body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(resp["success"], false);

    let state = h.store.get_state("projects/proj/instances/db-1").unwrap();
    assert!(!state.has_scaled());
}

#[tokio::test]
async fn push_envelope_runs_decision() {
    let h = harness(false);
    let data = STANDARD.encode(serde_json::to_vec(&scale_request(80.0)).unwrap());
    let envelope = json!({
        "message": { "data": data, "messageId": "1001" },
        "subscription": "projects/proj/subscriptions/dbscale"
    });

    let (status, resp) = send(
        &h.router,
        post("/api/v1/push", serde_json::to_vec(&envelope).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["state"], "DONE");
}

#[tokio::test]
async fn push_with_bad_payload_is_bad_request() {
    let h = harness(false);
    let envelope = json!({ "message": { "data": "%%%", "messageId": "1" } });

    let (status, _) = send(
        &h.router,
        post("/api/v1/push", serde_json::to_vec(&envelope).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn state_and_history_after_scaling() {
    let h = harness(false);
    let body = serde_json::to_vec(&scale_request(80.0)).unwrap();
    send(&h.router, post("/api/v1/scale", body)).await;

    let (status, state) = send(&h.router, get("/api/v1/instances/proj/db-1/state")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["data"]["instanceKey"], "projects/proj/instances/db-1");
    assert_eq!(state["data"]["lastScalingTimestamp"], NOW);
    assert_eq!(state["data"]["currentSize"], 3);

    let (status, history) =
        send(&h.router, get("/api/v1/instances/proj/db-1/history?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    let records = history["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fromSize"], 2);
    assert_eq!(records[0]["toSize"], 3);

    let (status, all) = send(&h.router, get("/api/v1/instances")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_instance_has_empty_state() {
    let h = harness(false);
    let (status, state) = send(&h.router, get("/api/v1/instances/proj/missing/state")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["data"]["lastScalingTimestamp"], 0);
    assert!(state["data"].get("currentSize").is_none());
}

#[tokio::test]
async fn request_with_separator_in_id_is_bad_request() {
    let h = harness(false);
    let mut request = scale_request(80.0);
    request["projectId"] = json!("proj/instances/db-1");

    let (status, resp) = send(
        &h.router,
        post("/api/v1/scale", serde_json::to_vec(&request).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"].as_str().unwrap().contains("projectId"));
    assert!(h.requester.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn encoded_separator_in_path_is_bad_request() {
    let h = harness(false);
    let (status, _) = send(
        &h.router,
        get("/api/v1/instances/a%2Finstances%2Fb/c/state"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.router, get("/api/v1/instances/proj/db%3A1/history")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_state_lifts_cooldown() {
    let h = harness(false);
    let body = serde_json::to_vec(&scale_request(80.0)).unwrap();
    send(&h.router, post("/api/v1/scale", body.clone())).await;

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/v1/instances/proj/db-1/state")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.router, delete).await;
    assert_eq!(status, StatusCode::OK);

    // Without a stored action the same request scales again.
    let (status, resp) = send(&h.router, post("/api/v1/scale", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["state"], "DONE");
    assert_eq!(h.requester.calls.lock().unwrap().len(), 2);

    let missing = Request::builder()
        .method("DELETE")
        .uri("/api/v1/instances/proj/never-scaled/state")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.router, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
