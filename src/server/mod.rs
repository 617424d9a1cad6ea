use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::binding::FactsViewModel;

pub mod routes;

/// Server state
pub struct AppState {
    pub view_model: FactsViewModel,
}

/// Build the HTTP surface: the fact list plus the fetch and delete actions
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/facts", get(routes::list_facts).delete(routes::delete_all))
        .route("/facts/fetch", post(routes::fetch_facts))
        .route("/facts/{id}", delete(routes::delete_fact))
        .route("/stats", get(routes::get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, view_model: FactsViewModel) -> anyhow::Result<()> {
    let state = Arc::new(AppState { view_model });
    let app = router(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down server");
        })
        .await?;

    Ok(())
}
