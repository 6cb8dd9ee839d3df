pub mod routes;
pub mod state;
pub mod ws;

use axum::{routing::{get, post}, Router};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config).post(routes::apply_config))
        .route("/api/cameras", get(routes::list_cameras))
        .route("/api/cameras/test", post(routes::test_camera))
        .route("/api/monitor/start", post(routes::start_monitor))
        .route("/api/monitor/stop", post(routes::stop_monitor))
        .route("/api/status", get(routes::status))
        .route("/api/alerts", get(routes::recent_alerts))
        .route("/ws/stream", get(ws_handler))
        .with_state(state)
}
