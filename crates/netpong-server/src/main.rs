use tracing_subscriber::EnvFilter;

use netpong_server::build_app;
use netpong_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();

    let addr = config.listen_addr.clone();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        },
    };

    let (app, state) = build_app(config);
    tracing::info!(
        %addr,
        tick_rate_hz = state.config.game.tick_rate_hz,
        "netpong server listening"
    );

    let game = state.game.clone();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
        game.stop();
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
