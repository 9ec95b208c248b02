//! HTTP control plane.
//!
//! Requests are served on the tokio worker pool. Valid switch requests are
//! turned into fire-and-forget bus submissions; status reads go straight to
//! the active-state cell and never touch the bus.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::routes::RouteTable;
use crate::runtime::bus::SwitchBus;
use crate::runtime::shared_state::ActiveReader;

pub mod server;

pub use server::ControlServer;

const LOG_TARGET: &str = "kiosk::control";
const ENDPOINTS: [&str; 3] = ["/show/<key>", "/status", "/keys"];
const RESERVED: [&str; 3] = ["keys", "status", "show"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexBody {
    pub endpoints: Vec<String>,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody {
    pub active: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowBody {
    pub ok: bool,
    pub showing: String,
}

/// Request rejections. Each maps to a 404 with a JSON error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    UnknownKey { key: String, keys: Vec<String> },
    ReservedPath,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let body = match self {
            ControlError::UnknownKey { key, keys } => {
                json!({ "error": format!("unknown key '{key}'"), "keys": keys })
            }
            ControlError::ReservedPath => json!({ "error": "reserved path" }),
        };
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

/// Everything a request handler may touch: the immutable route table, a
/// producer handle on the switch bus and a read handle on the active key.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    routes: Arc<RouteTable>,
    bus: SwitchBus,
    active: ActiveReader,
    logger: Option<Logger>,
}

impl ControlPlane {
    pub fn new(routes: Arc<RouteTable>, bus: SwitchBus, active: ActiveReader) -> Self {
        Self {
            routes,
            bus,
            active,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn index(&self) -> IndexBody {
        IndexBody {
            endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            keys: self.routes.key_list(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.routes.key_list()
    }

    pub fn status(&self) -> StatusBody {
        StatusBody {
            active: self.active.read(),
            keys: self.routes.key_list(),
        }
    }

    /// Validate `key` and enqueue the switch. Unknown keys never reach the bus.
    pub fn show(&self, key: &str) -> Result<ShowBody, ControlError> {
        if !self.routes.contains(key) {
            self.log(LogLevel::Info, "unknown_key_rejected", key);
            return Err(ControlError::UnknownKey {
                key: key.to_string(),
                keys: self.routes.key_list(),
            });
        }
        self.bus.submit(key);
        self.log(LogLevel::Debug, "switch_submitted", key);
        Ok(ShowBody {
            ok: true,
            showing: key.to_string(),
        })
    }

    /// `/<key>` shorthand. Segments that name other endpoints are refused.
    pub fn show_alias(&self, key: &str) -> Result<ShowBody, ControlError> {
        if RESERVED.contains(&key) {
            return Err(ControlError::ReservedPath);
        }
        self.show(key)
    }

    fn log(&self, level: LogLevel, message: &str, key: &str) {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, LOG_TARGET, message, [json_kv("key", key)]);
            let _ = logger.log_event(event);
        }
    }
}

/// Build the axum router. CORS is open to every origin.
pub fn router(plane: ControlPlane) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/keys", get(keys))
        .route("/status", get(status))
        .route("/show", get(reserved))
        .route("/show/{key}", get(show))
        .route("/{key}", get(show_alias))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(plane)
}

async fn index(State(plane): State<ControlPlane>) -> Json<IndexBody> {
    Json(plane.index())
}

async fn keys(State(plane): State<ControlPlane>) -> Json<Vec<String>> {
    Json(plane.keys())
}

async fn status(State(plane): State<ControlPlane>) -> Json<StatusBody> {
    Json(plane.status())
}

async fn show(
    State(plane): State<ControlPlane>,
    Path(key): Path<String>,
) -> Result<Json<ShowBody>, ControlError> {
    plane.show(&key).map(Json)
}

async fn show_alias(
    State(plane): State<ControlPlane>,
    Path(key): Path<String>,
) -> Result<Json<ShowBody>, ControlError> {
    plane.show_alias(&key).map(Json)
}

async fn reserved() -> ControlError {
    ControlError::ReservedPath
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::runtime::DisplayController;
    use crate::runtime::bus::{SwitchConsumer, switch_bus};
    use crate::runtime::driver::headless::HeadlessEngine;
    use crate::runtime::shared_state::ActiveState;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct Harness {
        plane: ControlPlane,
        controller: DisplayController<HeadlessEngine>,
        consumer: SwitchConsumer,
    }

    impl Harness {
        fn new() -> Self {
            let routes = Arc::new(
                RouteTable::from_entries([("home", "A"), ("docs", "B")]).expect("routes"),
            );
            let (bus, consumer) = switch_bus();
            let mut controller = DisplayController::new(
                HeadlessEngine::new(),
                ActiveState::new(routes.default_key()),
            );
            controller.initialize(&routes);
            let plane = ControlPlane::new(routes, bus, controller.active_reader());
            Self {
                plane,
                controller,
                consumer,
            }
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let request = Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request");
            let response = router(self.plane.clone())
                .oneshot(request)
                .await
                .expect("response");
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body");
            (status, serde_json::from_slice(&bytes).expect("json body"))
        }

        fn pump(&mut self) -> usize {
            self.controller.drain_pending(&self.consumer)
        }
    }

    #[tokio::test]
    async fn documented_scenario() {
        let mut harness = Harness::new();

        let (code, body) = harness.get("/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, json!({ "active": "home", "keys": ["home", "docs"] }));

        let (code, body) = harness.get("/show/docs").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "showing": "docs" }));
        assert_eq!(harness.pump(), 1);

        let (_, body) = harness.get("/status").await;
        assert_eq!(body["active"], "docs");

        let (code, body) = harness.get("/show/missing").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown key 'missing'");
        assert_eq!(body["keys"], json!(["home", "docs"]));
        assert_eq!(harness.pump(), 0);

        let (_, body) = harness.get("/status").await;
        assert_eq!(body["active"], "docs");
    }

    #[tokio::test]
    async fn index_lists_endpoints_and_keys() {
        let harness = Harness::new();
        let (code, body) = harness.get("/").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "endpoints": ["/show/<key>", "/status", "/keys"],
                "keys": ["home", "docs"],
            })
        );
    }

    #[tokio::test]
    async fn keys_are_stable_across_switches() {
        let mut harness = Harness::new();
        let (_, before) = harness.get("/keys").await;
        assert_eq!(before, json!(["home", "docs"]));

        for key in ["docs", "home", "docs"] {
            harness.get(&format!("/show/{key}")).await;
            harness.pump();
            let (_, keys) = harness.get("/keys").await;
            assert_eq!(keys, before);
        }
    }

    #[tokio::test]
    async fn alias_switches_like_show() {
        let mut harness = Harness::new();
        let (code, body) = harness.get("/docs").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "showing": "docs" }));
        harness.pump();
        assert_eq!(harness.controller.active_reader().read(), "docs");
    }

    #[tokio::test]
    async fn alias_refuses_reserved_segments_and_unknown_keys() {
        let mut harness = Harness::new();
        let (code, body) = harness.get("/show").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "reserved path" }));

        let (code, body) = harness.get("/nope").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["keys"], json!(["home", "docs"]));
        assert_eq!(harness.pump(), 0);
    }

    #[test]
    fn rejected_keys_never_reach_the_bus() {
        let sink = MemorySink::new();
        let mut harness = Harness::new();
        harness.plane = harness
            .plane
            .clone()
            .with_logger(Some(Logger::new(sink.clone())));

        for key in ["missing", "HOME", "", "docs/extra"] {
            assert!(harness.plane.show(key).is_err());
        }
        assert_eq!(harness.pump(), 0);
        assert_eq!(harness.plane.status().active, "home");
        assert_eq!(sink.messages(LOG_TARGET).len(), 4);

        for key in RESERVED {
            assert_eq!(harness.plane.show_alias(key), Err(ControlError::ReservedPath));
        }
    }

    #[tokio::test]
    async fn unknown_paths_get_a_json_404() {
        let harness = Harness::new();
        let (code, body) = harness.get("/show/docs/extra").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "not found" }));
    }
}
