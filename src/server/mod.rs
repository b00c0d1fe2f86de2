//! Webhook HTTP server.

mod handlers;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::trading::Reconciler;

pub struct WebhookServer {
    engine: Arc<Reconciler>,
}

impl WebhookServer {
    pub fn new(engine: Arc<Reconciler>) -> Self {
        Self { engine }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::health))
            .route("/webhook", post(handlers::webhook))
            .layer(TraceLayer::new_for_http())
            .with_state(self.engine.clone())
    }

    /// Serve until Ctrl+C.
    ///
    /// # Errors
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            symbol = %self.engine.config().symbol,
            account = %self.engine.account(),
            dry_run = self.engine.is_dry_run(),
            "Webhook server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }
}
