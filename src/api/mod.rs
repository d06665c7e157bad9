mod commands;
mod router;
mod routes;
mod security;
mod state;
pub mod types;

use std::sync::Arc;

use bevy::prelude::*;
use crossbeam_channel::Receiver;

use crate::events::GameEventBus;
use crate::input::{ExternalInputOverride, VirtualInput};
use crate::session::OverworldSession;
use commands::ApiCommand;
use router::build_router;
use security::ApiSecurity;
pub use state::SessionTemplate;
use state::AppState;
use types::WorldSummary;

const DEFAULT_API_ADDR: &str = "127.0.0.1:3100";

#[derive(Resource)]
struct ApiChannels {
    receiver: Receiver<ApiCommand>,
}

/// Serves the HTTP control surface on its own thread and answers its
/// requests from the ECS once per frame.
pub struct ApiPlugin {
    template: Arc<SessionTemplate>,
}

impl ApiPlugin {
    pub fn new(template: SessionTemplate) -> Self {
        Self {
            template: Arc::new(template),
        }
    }
}

impl Plugin for ApiPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();
        app.insert_resource(ApiChannels { receiver: rx })
            .add_systems(Update, process_api_commands);

        let state = AppState {
            sender: tx,
            template: Arc::clone(&self.template),
        };
        let security = ApiSecurity::from_env();
        let addr = std::env::var("OVERWORLD_API_ADDR")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());

        let spawned = std::thread::Builder::new()
            .name("overworld-api".into())
            .spawn(move || {
                let rt = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        eprintln!("[Overworld API] Failed to start runtime: {}", e);
                        return;
                    }
                };
                rt.block_on(async move {
                    let app = build_router(state, security);
                    let listener = match tokio::net::TcpListener::bind(&addr).await {
                        Ok(listener) => listener,
                        Err(e) => {
                            eprintln!("[Overworld API] Failed to bind {}: {}", addr, e);
                            return;
                        }
                    };
                    println!("[Overworld API] Listening on http://{}", addr);
                    if let Err(e) = axum::serve(listener, app).await {
                        eprintln!("[Overworld API] Server stopped: {}", e);
                    }
                });
            });
        if let Err(e) = spawned {
            eprintln!("[Overworld API] Failed to start server thread: {}", e);
        }
    }
}

fn process_api_commands(
    channels: Res<ApiChannels>,
    mut session: Option<ResMut<OverworldSession>>,
    mut input: ResMut<VirtualInput>,
    mut external: ResMut<ExternalInputOverride>,
    bus: Res<GameEventBus>,
) {
    while let Ok(cmd) = channels.receiver.try_recv() {
        match cmd {
            ApiCommand::GetState(tx) => {
                let _ = tx.send(session.as_deref().map(OverworldSession::snapshot));
            }
            ApiCommand::GetWorld(tx) => {
                let _ = tx.send(
                    session
                        .as_deref()
                        .map(|s| WorldSummary::of(s.world(), s.world_generation())),
                );
            }
            ApiCommand::SetInput(req, tx) => {
                external.0 = req.exclusive;
                input.set_held(req.actions);
                let _ = tx.send(Ok(()));
            }
            ApiCommand::ReleaseInput(tx) => {
                external.0 = false;
                input.set_held(Vec::<String>::new());
                let _ = tx.send(Ok(()));
            }
            ApiCommand::Warp(req, tx) => {
                let result = match session.as_deref_mut() {
                    Some(s) => s.warp_to(&req.map, req.warp_id),
                    None => Err("No overworld session is running".to_string()),
                };
                let _ = tx.send(result);
            }
            ApiCommand::SetTravelMode(mode, tx) => {
                let result = match session.as_deref_mut() {
                    Some(s) => {
                        s.set_travel_mode(mode);
                        Ok(())
                    }
                    None => Err("No overworld session is running".to_string()),
                };
                let _ = tx.send(result);
            }
            ApiCommand::GetEvents(since, tx) => {
                let events = bus.since(since.unwrap_or(0)).cloned().collect();
                let _ = tx.send(events);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MovementConfig, WarpConfig};
    use crate::world_data::demo_manifest;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn template() -> Arc<SessionTemplate> {
        Arc::new(SessionTemplate {
            manifest: demo_manifest(),
            movement: MovementConfig::default(),
            warp: WarpConfig::default(),
        })
    }

    /// Router plus a stand-in game loop that answers one command per request.
    fn router_with_loop(requests: usize) -> axum::Router {
        let (tx, rx) = crossbeam_channel::unbounded::<ApiCommand>();
        let template = template();
        let mut session = OverworldSession::from_manifest(
            &template.manifest,
            template.movement.clone(),
            WarpConfig {
                inline_loads: true,
                ..WarpConfig::default()
            },
        )
        .expect("session");
        std::thread::spawn(move || {
            for _ in 0..requests {
                let Ok(cmd) = rx.recv() else {
                    return;
                };
                match cmd {
                    ApiCommand::GetState(tx) => {
                        let _ = tx.send(Some(session.snapshot()));
                    }
                    ApiCommand::Warp(req, tx) => {
                        let _ = tx.send(session.warp_to(&req.map, req.warp_id));
                    }
                    _ => {}
                }
            }
        });
        build_router(
            AppState {
                sender: tx,
                template,
            },
            ApiSecurity::new(None, 1000),
        )
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn state_reports_the_spawn_tile() {
        let app = router_with_loop(1);
        let res = app
            .oneshot(Request::get("/state").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["map_id"], "town");
        assert_eq!(json["data"]["tile"], serde_json::json!([10, 7]));
    }

    #[tokio::test]
    async fn warp_moves_the_session_into_the_house() {
        let app = router_with_loop(2);
        let res = app
            .clone()
            .oneshot(
                Request::post("/warp")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"map":"house","warp_id":0}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(body_json(res).await["ok"], true);

        let res = app
            .oneshot(Request::get("/state").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let json = body_json(res).await;
        assert_eq!(json["data"]["map_id"], "house");
        assert_eq!(json["data"]["facing"], "up");
    }

    #[tokio::test]
    async fn simulate_runs_on_a_fresh_session() {
        let app = router_with_loop(0);
        let body = serde_json::json!({
            "inputs": [{ "frame": 0, "action": "left", "duration": 1 }],
            "max_frames": 30,
            "record_interval": 10,
            "spawn": { "map": "town", "x": 10, "y": 7 }
        });
        let res = app
            .oneshot(
                Request::post("/simulate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(res).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["frames_elapsed"], 30);
        assert_eq!(json["data"]["trace"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["data"]["trace"][2]["tile"], serde_json::json!([9, 7]));
    }
}
