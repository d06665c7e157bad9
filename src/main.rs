#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

#[cfg(not(target_arch = "wasm32"))]
mod api;
mod behaviors;
mod camera;
mod collision;
mod components;
mod door;
mod door_anims;
mod error;
mod events;
mod input;
mod jump;
mod loader;
mod movement;
mod orchestrator;
mod player;
mod render;
mod screen_effects;
mod session;
mod simulation;
mod tilemap;
mod warp;
mod world_data;

use std::path::Path;

use bevy::prelude::*;
use components::{HeadlessMode, MovementConfig, WarpConfig};
use session::OverworldSession;
use world_data::{SpawnPoint, WorldManifest};

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    background_color: Option<[f32; 3]>,
    /// Path to a world manifest; overridden by `OVERWORLD_WORLD`.
    world: Option<String>,
    spawn: Option<SpawnPoint>,
    #[serde(default)]
    movement: MovementConfig,
    #[serde(default)]
    warp: WarpConfig,
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("OVERWORLD_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "overworld.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Overworld] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Overworld] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

/// World file from the environment or config, then the build-time embed,
/// then the bundled demo.
fn load_world(config_path: Option<&str>) -> WorldManifest {
    let path = std::env::var("OVERWORLD_WORLD")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| config_path.map(str::to_string));
    if let Some(path) = path {
        match world_data::load_manifest(Path::new(&path)) {
            Ok(manifest) if !manifest.is_empty() => {
                println!("[Overworld] Loaded world from {}", path);
                return manifest;
            }
            Ok(_) => eprintln!("[Overworld] World file {} has no maps", path),
            Err(e) => eprintln!("[Overworld] {}", e),
        }
    }
    if let Some(manifest) = world_data::embedded_manifest() {
        println!("[Overworld] Using embedded world");
        return manifest;
    }
    println!("[Overworld] Using demo world");
    world_data::demo_manifest()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let startup_config = load_startup_config();
    let mut manifest = load_world(startup_config.world.as_deref());
    if let Some(spawn) = startup_config.spawn.clone() {
        manifest.spawn = Some(spawn);
    }
    let movement = startup_config.movement.clone();
    let mut warp = startup_config.warp.clone();
    if let Ok(v) = std::env::var("OVERWORLD_INLINE_LOADS") {
        warp.inline_loads = matches!(v.trim(), "1" | "true" | "yes");
    }

    let session = match OverworldSession::from_manifest(&manifest, movement.clone(), warp.clone()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("[Overworld] Could not start session: {}", e);
            std::process::exit(2);
        }
    };

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless));

    if headless {
        // Headless mode: no window, no rendering, just ECS + API
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        println!("[Overworld] Starting in HEADLESS mode");
    } else {
        let window_title = startup_config
            .window_title
            .unwrap_or_else(|| "Overworld".to_string());
        let window_width = startup_config.window_width.unwrap_or(960.0);
        let window_height = startup_config.window_height.unwrap_or(640.0);

        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: window_title,
                        resolution: (window_width, window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        );
        let bg = startup_config.background_color.unwrap_or([0.05, 0.05, 0.08]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        app.add_plugins(render::RenderPlugin);
        println!("[Overworld] Starting in WINDOWED mode");
    }

    app.insert_resource(movement.clone())
        .insert_resource(warp.clone())
        .insert_resource(session)
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .add_plugins(input::InputPlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(tilemap::TilemapPlugin)
        .add_plugins(session::OverworldPlugin)
        .add_plugins(camera::CameraPlugin)
        .add_plugins(screen_effects::ScreenEffectsPlugin);

    #[cfg(not(target_arch = "wasm32"))]
    app.add_plugins(api::ApiPlugin::new(api::SessionTemplate {
        manifest,
        movement,
        warp,
    }));

    app.run();
}
