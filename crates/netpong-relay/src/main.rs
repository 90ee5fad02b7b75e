use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use netpong_relay::config::RelayArgs;
use netpong_relay::console::{ConsoleExit, run_console};
use netpong_relay::intercept_log::InterceptLog;
use netpong_relay::policy::{MutationPolicy, shared_policy};
use netpong_relay::{RelayState, build_app};

#[tokio::main]
async fn main() {
    // stdout belongs to the operator console.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RelayArgs::parse();
    if let Err(e) = args.validate() {
        tracing::error!(error = %e, "Invalid arguments");
        std::process::exit(1);
    }

    let addr = args.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        },
    };

    let policy = shared_policy(MutationPolicy::default());
    let log = InterceptLog::spawn(args.logfile.clone());
    let state = RelayState::new(args.target.clone(), std::sync::Arc::clone(&policy), log.clone());

    tracing::info!(
        %addr,
        upstream = %args.target,
        logfile = %args.logfile.display(),
        "netpong relay listening"
    );

    let (quit_tx, quit_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let exit = run_console(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            policy,
            log,
        )
        .await;
        match exit {
            ConsoleExit::Quit => {
                let _ = quit_tx.send(());
            },
            // Keep relaying when stdin is closed, e.g. running detached.
            ConsoleExit::Eof => {
                tracing::info!("Console input closed, relay keeps running");
                std::future::pending::<()>().await;
            },
        }
    });

    let app = build_app(state);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(quit_rx))
        .await
    {
        tracing::error!(error = %e, "Relay server error");
        std::process::exit(1);
    }

    tracing::info!("Relay shut down");
}

async fn shutdown_signal(quit: oneshot::Receiver<()>) {
    tokio::select! {
        _ = quit => {},
        _ = tokio::signal::ctrl_c() => {},
    }
}
