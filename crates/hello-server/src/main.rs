//! hello-server: answers `GET /hello` with `{"message":"Hello, world!"}` on port 8080

mod logging;

use anyhow::Context;
use hello_core::{Server, ServerConfig, ServerState};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    logging::init_logger();

    let config = ServerConfig::default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = ServerState::hello()?;
    let port = config.port;

    let server = match Server::bind(config, state) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "listener failed to start");
            return Err(e.into());
        }
    };

    tracing::info!("Server running on port {}", port);

    server.serve_with_shutdown(shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
