use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use codectx_index::AppContext;
use tokio::sync::watch;

use crate::error::{ApiError, GatewayError};
use crate::router::build_router;

/// Filled once bootstrap finishes. Handlers that need it fail with a server
/// error until then.
pub type ContextSlot = Arc<OnceLock<Arc<AppContext>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub context: ContextSlot,
    pub started_at: Instant,
}

impl AppState {
    pub(crate) fn context(&self) -> Result<Arc<AppContext>, ApiError> {
        self.context.get().cloned().ok_or(ApiError::Uninitialized)
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    auth_token: Option<String>,
    rate_limit: u32,
    max_body_size: usize,
    context: ContextSlot,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        context: ContextSlot,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let loopback = SocketAddr::from(([127, 0, 0, 1], port));
        let addr = match format!("{bind}:{port}").parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(bind, %loopback, "unusable bind address ({e}), using loopback");
                loopback
            }
        };

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, every interface can reach it");
        }

        Self {
            addr,
            auth_token: None,
            rate_limit: 0,
            max_body_size: 50 * 1024 * 1024,
            context,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Requests per minute per client IP on the context routes; `0` disables.
    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Start the HTTP server and run until shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            context: self.context,
            started_at: Instant::now(),
        };

        let router = build_router(state, self.auth_token, self.rate_limit, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!(addr = %self.addr, "context gateway listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(self.shutdown_rx))
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Resolves once `true` is observed; a dropped sender means run forever.
async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
    tracing::info!("context gateway draining connections");
}
