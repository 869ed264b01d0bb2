use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::Event,
    error::Result,
    service::EventSlots,
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    let events = state.service_context.event_repo
        .list_published()
        .await?;

    Ok(Json(events))
}

pub async fn slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventSlots>> {
    let slots = state.service_context.booking_service
        .available_slots(id)
        .await?;

    Ok(Json(slots))
}
