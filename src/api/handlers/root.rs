use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Boxoffice API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Seat and zone booking with payment reconciliation",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "slots": "/api/events/:id/slots",
            "bookings": "/api/bookings",
            "payment_callback": "/api/payments/callback"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
