pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .nest("/api", api_routes())

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(handlers::events::list))
        .route("/events/:id/slots", get(handlers::events::slots))
        .nest("/bookings", booking_routes())
        .route("/users/:user_id/bookings", get(handlers::bookings::list_for_user))
        // Called by the payment gateway, authenticated by signature
        .route("/payments/callback", post(handlers::payments::callback))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::bookings::create))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/payment", post(handlers::bookings::begin_payment))
        .route("/:id/cancel", post(handlers::bookings::cancel))
        .route("/:id/ticket", get(handlers::bookings::ticket))
}
