use std::sync::Arc;

use crossbeam_channel::Sender;

use super::commands::ApiCommand;
use crate::components::{MovementConfig, WarpConfig};
use crate::world_data::WorldManifest;

/// What a fresh simulation session is built from.
pub struct SessionTemplate {
    pub manifest: WorldManifest,
    pub movement: MovementConfig,
    pub warp: WarpConfig,
}

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) sender: Sender<ApiCommand>,
    pub(super) template: Arc<SessionTemplate>,
}
