use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use users_api::config::Config;
use users_api::database::MemoryDatabase;
use users_api::middleware::{JsonMiddleware, LoggerMiddleware, Pipeline};
use users_api::{Server, users};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "users-api starting");

    // A bad route template must stop us before we bind.
    let routes = users::routes(Arc::new(MemoryDatabase::new())).inspect_err(|e| {
        error!(error = %e, "failed to build route table");
    })?;
    info!(routes = routes.len(), "route table ready");

    let app = Arc::new(
        Pipeline::new(routes)
            .with(LoggerMiddleware)
            .with(JsonMiddleware),
    );

    let server = Server::bind(&config.addr).await?;
    info!(address = %server.local_addr(), "HTTP server running");

    server
        .run_until(
            move |req| {
                let app = Arc::clone(&app);
                async move { app.handle(req).await }
            },
            shutdown_signal(),
        )
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
