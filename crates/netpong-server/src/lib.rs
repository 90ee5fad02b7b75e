pub mod config;
pub mod game_loop;
pub mod health;
pub mod session_registry;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use netpong_core::net::protocol::WS_PATH;

use config::ServerConfig;
use game_loop::spawn_game_loop;
use state::AppState;

/// Build the Axum router and application state from a config. Spawns the
/// game loop, so this must be called inside a tokio runtime.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    // Unknown paths get the front end's index so client-side routes load.
    let index = std::path::Path::new(&web_root).join("index.html");
    let (game, _task) = spawn_game_loop(&config.game);
    let state = AppState::new(config, game);

    let app = Router::new()
        .route(WS_PATH, axum::routing::get(ws::ws_handler))
        .route("/api/health", axum::routing::get(health::health_check))
        .fallback_service(ServeDir::new(&web_root).fallback(ServeFile::new(index)))
        .with_state(state.clone());

    (app, state)
}
