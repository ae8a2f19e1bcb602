use std::sync::Arc;

use miette::IntoDiagnostic;
use tokio::net::TcpListener;
use tracing::info;

use medichat::config::AppConfig;
use medichat::pipeline::RagPipeline;
use medichat::{server, telemetry};

#[tokio::main]
async fn main() -> miette::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();
    miette::set_panic_hook();

    // Fail fast: configuration and the pipeline are validated before
    // the listener binds, not on the first incoming request.
    let config = AppConfig::from_env().into_diagnostic()?;
    let pipeline = RagPipeline::connect(&config).await.into_diagnostic()?;

    let router = server::router(Arc::new(pipeline));
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .into_diagnostic()?;
    info!("serving chat on http://{}", config.bind_addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
