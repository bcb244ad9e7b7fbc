use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use parts_crawler::api::{self, AppState};
use parts_crawler::config::Settings;
use parts_crawler::driver::chrome::ChromeLauncher;
use parts_crawler::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    let launcher = Arc::new(ChromeLauncher::from_settings(&settings));
    let dispatcher = Arc::new(Dispatcher::new(launcher, settings.search));

    // The first search relaunches if this fails, so the server still comes up
    if let Err(e) = dispatcher.start().await {
        error!("❌ browser launch failed at startup: {}", e);
    }

    let state = Arc::new(AppState {
        dispatcher: dispatcher.clone(),
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr()).await?;
    info!("🚀 Listening on {}", listener.local_addr()?);
    info!("💚 Health: http://{}/health", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("⚠️ shutdown signal received, closing browser...");
}
