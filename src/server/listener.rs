//! TCP listener and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{GateError, GateResult};

use super::router::build_router;
use super::state::AppState;

/// A bound HTTP listener serving the gate API.
pub struct GateServer {
    listener: TcpListener,
    router: Router,
}

impl GateServer {
    /// Bind the listener. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr, state: AppState) -> GateResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| GateError::Server {
            message: format!("Failed to bind {}: {}", addr, e),
        })?;

        info!(addr = %addr, "HTTP listener bound");

        Ok(Self {
            listener,
            router: build_router(state),
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> GateResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> GateResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = ?self.listener.local_addr().ok(), "Listener running, waiting for requests...");

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("Listener stopped");
        Ok(())
    }
}
