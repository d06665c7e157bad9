use serde::{Deserialize, Serialize};

use crate::components::TravelMode;
use crate::simulation::SimulationRequest;
use crate::tilemap::WorldState;
use crate::world_data::SpawnPoint;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> ApiResponse<String> {
        ApiResponse::success("ok".to_string())
    }

    pub fn err(msg: impl Into<String>) -> ApiResponse<String> {
        ApiResponse::failure(msg)
    }
}

impl From<Result<(), String>> for ApiResponse<String> {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => ApiResponse::ok(),
            Err(e) => ApiResponse::err(e),
        }
    }
}

/// Held actions to inject, replacing whatever was held before.
#[derive(Deserialize, Clone)]
pub struct InputRequest {
    pub actions: Vec<String>,
    /// Ignore the keyboard until `/input/release`.
    #[serde(default = "default_true")]
    pub exclusive: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Clone)]
pub struct WarpRequest {
    pub map: String,
    #[serde(default)]
    pub warp_id: usize,
}

#[derive(Deserialize, Clone, Copy)]
pub struct TravelModeRequest {
    pub mode: TravelMode,
}

#[derive(Deserialize, Default)]
pub struct EventsQuery {
    pub since: Option<u64>,
}

/// Offline run against a fresh session built from the loaded world.
#[derive(Deserialize, Clone)]
pub struct SimulateRequest {
    #[serde(flatten)]
    pub run: SimulationRequest,
    #[serde(default)]
    pub spawn: Option<SpawnPoint>,
}

#[derive(Serialize, Clone, Debug)]
pub struct MapSummary {
    pub id: String,
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: i32,
    pub height: i32,
    pub warps: usize,
}

#[derive(Serialize, Clone, Debug)]
pub struct WorldSummary {
    pub anchor: String,
    pub generation: u64,
    pub bounds: (i32, i32, i32, i32),
    pub maps: Vec<MapSummary>,
}

impl WorldSummary {
    pub fn of(world: &WorldState, generation: u64) -> Self {
        Self {
            anchor: world.anchor_id.clone(),
            generation,
            bounds: world.bounds(),
            maps: world
                .maps
                .iter()
                .map(|m| MapSummary {
                    id: m.id().to_string(),
                    offset_x: m.offset_x,
                    offset_y: m.offset_y,
                    width: m.layout.width,
                    height: m.layout.height,
                    warps: m.layout.warps.len(),
                })
                .collect(),
        }
    }
}
