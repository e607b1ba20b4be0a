//! dbscale-api — HTTP entry points for the decision engine.
//!
//! The handlers only decode input and map outcomes to status codes; every
//! decision is made by [`Autoscaler`].
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/scale` | Run one decision for a JSON request |
//! | POST | `/api/v1/push` | Run one decision for a push-delivered message |
//! | GET | `/api/v1/instances` | List stored autoscaler state |
//! | GET | `/api/v1/instances/{project}/{instance}/state` | Stored state for one instance |
//! | DELETE | `/api/v1/instances/{project}/{instance}/state` | Forget the last scaling action |
//! | GET | `/api/v1/instances/{project}/{instance}/history` | Recent scaling actions, newest first |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod push;

use axum::Router;
use axum::routing::{get, post};
use dbscale_autoscale::Autoscaler;
use dbscale_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub autoscaler: Autoscaler,
}

/// Build the complete API router.
pub fn build_router(store: StateStore, autoscaler: Autoscaler) -> Router {
    let api_state = ApiState { store, autoscaler };

    let api_routes = Router::new()
        .route("/scale", post(handlers::scale))
        .route("/push", post(handlers::push))
        .route("/instances", get(handlers::list_instances))
        .route(
            "/instances/{project}/{instance}/state",
            get(handlers::get_state).delete(handlers::delete_state),
        )
        .route("/instances/{project}/{instance}/history", get(handlers::get_history))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
