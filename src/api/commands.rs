use tokio::sync::oneshot::Sender;

use super::types::{InputRequest, WarpRequest, WorldSummary};
use crate::components::TravelMode;
use crate::events::GameEvent;
use crate::session::SessionSnapshot;

/// Requests from the HTTP thread, answered on the next `Update`.
pub enum ApiCommand {
    GetState(Sender<Option<SessionSnapshot>>),
    GetWorld(Sender<Option<WorldSummary>>),
    SetInput(InputRequest, Sender<Result<(), String>>),
    ReleaseInput(Sender<Result<(), String>>),
    Warp(WarpRequest, Sender<Result<(), String>>),
    SetTravelMode(TravelMode, Sender<Result<(), String>>),
    GetEvents(Option<u64>, Sender<Vec<GameEvent>>),
}
