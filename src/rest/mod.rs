//! HTTP adapter for multi-step forms.
//!
//! Mounts a form definition at `/form` (every method goes to the same
//! handler, which lets the form classify the request) next to a health
//! endpoint. Sessions are keyed by a cookie and kept in memory.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;

pub mod demo;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod state;

pub use state::{AppState, FormDefinition};

/// Path the form is served at
pub const FORM_PATH: &str = "/form";

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit;

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            FORM_PATH,
            get(routes::form::handle)
                .post(routes::form::handle)
                .put(routes::form::handle)
                .patch(routes::form::handle)
                .delete(routes::form::handle),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the form server
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = build_router(state);

    tracing::info!("Form server listening on http://{}{}", addr, FORM_PATH);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
