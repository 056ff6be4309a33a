use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use noteflow_core::config::GatewayConfig;
use noteflow_engine::{WorkflowCatalog, WorkflowEngine};

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<WorkflowEngine>,
    catalog: Arc<WorkflowCatalog>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        engine: Arc<WorkflowEngine>,
        catalog: Arc<WorkflowCatalog>,
    ) -> Self {
        Self {
            config,
            engine,
            catalog,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            catalog: self.catalog.clone(),
        });

        let app = Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/workflows", get(routes::workflow_info))
            .route("/api/notes/process", post(routes::process_note))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
