use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Booking, BookingState, PaymentIntent, PaymentStatus, TicketData},
    error::Result,
    service::{booking_service::Cancellation, CreateBookingRequest, UserBookings},
};

#[derive(Debug, Serialize)]
pub struct BookingCreatedResponse {
    booking_id: Uuid,
    total_price: i64,
    payment_status: PaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
    #[serde(flatten)]
    booking: Booking,
    state: BookingState,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            state: booking.state(),
            booking,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>)> {
    let booking = state.service_context.booking_service
        .create_booking(request)
        .await?;

    Ok((StatusCode::CREATED, Json(BookingCreatedResponse {
        booking_id: booking.id,
        total_price: booking.total_price_cents,
        payment_status: booking.payment_status,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service.get(id).await?;
    Ok(Json(booking.into()))
}

pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserBookings>> {
    let bookings = state.service_context.booking_service
        .list_for_user(user_id)
        .await?;

    Ok(Json(bookings))
}

pub async fn begin_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentIntent>> {
    let intent = state.service_context.payment_service
        .begin_payment(id)
        .await?;

    Ok(Json(intent))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<CancelRequest>>,
) -> Result<Json<Cancellation>> {
    let reason = request.and_then(|Json(request)| request.reason);
    let cancellation = state.service_context.booking_service
        .cancel(id, reason)
        .await?;

    Ok(Json(cancellation))
}

pub async fn ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketData>> {
    let ticket = state.service_context.booking_service
        .ticket_data(id)
        .await?;

    Ok(Json(ticket))
}
