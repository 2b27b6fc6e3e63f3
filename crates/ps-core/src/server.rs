use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Binds and serves one of the service's routers until the process is asked
/// to stop (ctrl-c or, on unix, SIGTERM). Returns after in-flight requests
/// have drained.
pub async fn serve(service_name: &'static str, addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("{service_name}: bind {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(service = service_name, addr = %local_addr, "accepting connections");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(service_name))
    .await?;

    tracing::info!(service = service_name, "listener drained");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal(service_name: &'static str) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(service = service_name, error = %err, "sigterm handler failed; ctrl-c only");
            wait_for_ctrl_c(service_name).await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(service = service_name, signal = "ctrl-c", "shutdown requested");
        }
        _ = sigterm.recv() => {
            tracing::info!(service = service_name, signal = "sigterm", "shutdown requested");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal(service_name: &'static str) {
    wait_for_ctrl_c(service_name).await;
}

async fn wait_for_ctrl_c(service_name: &'static str) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!(service = service_name, signal = "ctrl-c", "shutdown requested");
    }
}
