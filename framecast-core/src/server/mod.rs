//! HTTP API
//!
//! Routes:
//! - `POST /api/stream/start`, `POST /api/stream/stop` drive the default session
//! - `GET /api/stream/video` is the multipart JPEG feed
//! - `GET /api/stream/status` reports session state and metrics
//! - `/api/overlays` and `/api/settings` manage the stored records
//! - `GET /api/health` is a liveness probe

mod overlays;
pub mod response;
mod settings;
mod stream;

pub use response::ApiError;
pub use stream::VIDEO_PATH;

use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::capture::{CaptureSession, SessionRegistry};
use crate::config::PublisherOptions;
use crate::encode::FrameEncoder;
use crate::error::Result;
use crate::publisher::StreamPublisher;
use crate::store::{OverlayStore, SettingsStore};
use crate::types::SessionId;

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    /// Capture sessions
    pub registry: Arc<SessionRegistry>,
    /// Viewer loop factory
    pub publisher: StreamPublisher,
    /// Overlay records, also the publisher's overlay provider
    pub overlays: Arc<OverlayStore>,
    /// Application settings
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    /// Wire the stores, publisher and registry together
    pub fn new(
        registry: Arc<SessionRegistry>,
        encoder: Arc<dyn FrameEncoder>,
        options: PublisherOptions,
    ) -> Self {
        let overlays = Arc::new(OverlayStore::new());
        let publisher = StreamPublisher::new(overlays.clone(), encoder, options);

        Self {
            registry,
            publisher,
            overlays,
            settings: Arc::new(SettingsStore::new()),
        }
    }

    /// The session driven by `/api/stream/*`
    pub fn default_session(&self) -> Arc<CaptureSession> {
        self.registry.session(&SessionId::default_session())
    }
}

/// Build the API router
///
/// Every route allows cross-origin requests so a separately served frontend
/// can drive the API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stream/start", post(stream::start))
        .route("/api/stream/stop", post(stream::stop))
        .route("/api/stream/video", get(stream::video))
        .route("/api/stream/status", get(stream::status))
        .route("/api/overlays", get(overlays::list).post(overlays::create))
        .route(
            "/api/overlays/:id",
            get(overlays::get).put(overlays::update).delete(overlays::delete),
        )
        .route("/api/settings", get(settings::get).post(settings::update))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
///
/// Open video feeds keep the server alive until their viewers close, so the
/// shutdown future should stop the sessions before resolving.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Framecast API listening on http://{}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// `GET /api/health`
async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
