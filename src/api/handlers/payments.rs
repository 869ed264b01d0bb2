use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};

use crate::{
    api::state::AppState,
    error::Result,
    payments::RawCallback,
    service::ReconcileOutcome,
};

/// Gateway callback. The body is passed through untouched so the gateway
/// can verify its signature over the exact bytes it sent.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ReconcileOutcome>> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let raw = RawCallback {
        body,
        content_type: header_value(header::CONTENT_TYPE.as_str()),
        signature_header: header_value("stripe-signature"),
    };

    let outcome = state.service_context.payment_service
        .reconcile_callback(raw)
        .await?;

    tracing::info!(
        booking_id = %outcome.booking_id,
        "Gateway callback reconciled: {:?}",
        outcome.status
    );

    Ok(Json(outcome))
}
