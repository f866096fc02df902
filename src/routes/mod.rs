//! Routers de la aplicación

pub mod api_routes;
pub mod customer_routes;
pub mod webhook_routes;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Construye el router completo con su estado
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(customer_routes::create_customer_router())
        .merge(webhook_routes::create_webhook_router())
        .merge(api_routes::create_api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
