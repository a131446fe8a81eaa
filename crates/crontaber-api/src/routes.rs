//! HTTP bridge for the IPC channels.
//!
//! ```text
//! POST /ipc/{channel}  - Dispatch a request; always answers with an envelope
//! GET  /health         - Liveness and startup state
//! ```

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::ipc::{Envelope, IpcChannel, IpcRouter};

/// Build the bridge router.
pub fn create_router(router: IpcRouter) -> Router {
    Router::new()
        .route("/ipc/{channel}", post(handle_ipc))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

/// POST /ipc/{channel}
///
/// An empty body is treated as `{}`. Unknown channels answer 404; every
/// other outcome, failures included, answers 200 with the envelope.
async fn handle_ipc(
    State(router): State<IpcRouter>,
    Path(channel): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<Envelope>) {
    let channel = match channel.parse::<IpcChannel>() {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Rejected IPC request: {}", e);
            return (StatusCode::NOT_FOUND, Json(Envelope::failure(e.to_string())));
        }
    };

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Malformed body on {}: {}", channel, e);
                return (
                    StatusCode::OK,
                    Json(Envelope::failure(format!("Invalid JSON body: {}", e))),
                );
            }
        }
    };

    (StatusCode::OK, Json(router.dispatch(channel, payload).await))
}

/// GET /health
async fn health(State(router): State<IpcRouter>) -> Json<Value> {
    let service = router.service();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started": service.is_started(),
        "timers": service.registry().len(),
    }))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
