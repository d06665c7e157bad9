use axum::{
    extract::{Query, State},
    Json,
};
use tokio::sync::oneshot;

use super::commands::ApiCommand;
use super::state::AppState;
use super::types::*;
use crate::events::GameEvent;
use crate::session::{OverworldSession, SessionSnapshot};
use crate::simulation::{self, SimulationResult};

const CHANNEL_CLOSED: &str = "Channel closed";
const NO_SESSION: &str = "No overworld session is running";

/// Sends a command and waits for the game loop to answer it.
async fn ask<T>(
    state: &AppState,
    build: impl FnOnce(oneshot::Sender<T>) -> ApiCommand,
) -> Result<T, String> {
    let (tx, rx) = oneshot::channel();
    state
        .sender
        .send(build(tx))
        .map_err(|_| CHANNEL_CLOSED.to_string())?;
    rx.await.map_err(|_| CHANNEL_CLOSED.to_string())
}

pub(super) async fn get_state(State(state): State<AppState>) -> Json<ApiResponse<SessionSnapshot>> {
    match ask(&state, ApiCommand::GetState).await {
        Ok(Some(snapshot)) => Json(ApiResponse::success(snapshot)),
        Ok(None) => Json(ApiResponse::failure(NO_SESSION)),
        Err(e) => Json(ApiResponse::failure(e)),
    }
}

pub(super) async fn get_world(State(state): State<AppState>) -> Json<ApiResponse<WorldSummary>> {
    match ask(&state, ApiCommand::GetWorld).await {
        Ok(Some(summary)) => Json(ApiResponse::success(summary)),
        Ok(None) => Json(ApiResponse::failure(NO_SESSION)),
        Err(e) => Json(ApiResponse::failure(e)),
    }
}

pub(super) async fn set_input(
    State(state): State<AppState>,
    Json(req): Json<InputRequest>,
) -> Json<ApiResponse<String>> {
    let result = ask(&state, |tx| ApiCommand::SetInput(req, tx)).await;
    Json(result.and_then(|r| r).into())
}

pub(super) async fn release_input(State(state): State<AppState>) -> Json<ApiResponse<String>> {
    let result = ask(&state, ApiCommand::ReleaseInput).await;
    Json(result.and_then(|r| r).into())
}

pub(super) async fn warp(
    State(state): State<AppState>,
    Json(req): Json<WarpRequest>,
) -> Json<ApiResponse<String>> {
    let result = ask(&state, |tx| ApiCommand::Warp(req, tx)).await;
    Json(result.and_then(|r| r).into())
}

pub(super) async fn set_travel_mode(
    State(state): State<AppState>,
    Json(req): Json<TravelModeRequest>,
) -> Json<ApiResponse<String>> {
    let result = ask(&state, |tx| ApiCommand::SetTravelMode(req.mode, tx)).await;
    Json(result.and_then(|r| r).into())
}

pub(super) async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<ApiResponse<Vec<GameEvent>>> {
    match ask(&state, |tx| ApiCommand::GetEvents(query.since, tx)).await {
        Ok(events) => Json(ApiResponse::success(events)),
        Err(e) => Json(ApiResponse::failure(e)),
    }
}

/// Runs a scripted input schedule on a throwaway session so the live one is
/// left untouched.
pub(super) async fn simulate(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Json<ApiResponse<SimulationResult>> {
    let template = state.template.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut manifest = template.manifest.clone();
        if req.spawn.is_some() {
            manifest.spawn = req.spawn.clone();
        }
        let mut warp = template.warp.clone();
        warp.inline_loads = true;
        let mut session =
            OverworldSession::from_manifest(&manifest, template.movement.clone(), warp)
                .map_err(|e| e.to_string())?;
        Ok::<_, String>(simulation::run_simulation(&mut session, &req.run))
    })
    .await;

    match outcome {
        Ok(Ok(result)) => Json(ApiResponse::success(result)),
        Ok(Err(e)) => Json(ApiResponse::failure(e)),
        Err(e) => Json(ApiResponse::failure(format!("Simulation task failed: {e}"))),
    }
}
