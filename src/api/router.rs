use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::routes::*;
use super::security::{api_guard, ApiSecurity};
use super::state::AppState;

pub(super) fn build_router(state: AppState, security: ApiSecurity) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/world", get(get_world))
        .route("/input", post(set_input))
        .route("/input/release", post(release_input))
        .route("/warp", post(warp))
        .route("/travel_mode", post(set_travel_mode))
        .route("/events", get(get_events))
        .route("/simulate", post(simulate))
        .with_state(state)
        .layer(middleware::from_fn_with_state(security, api_guard))
}
