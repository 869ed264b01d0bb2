use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    domain::*,
    error::{AppError, Result},
    integrations::{IntegrationEvent, IntegrationManager},
    repository::{
        booking_repository, BookingRepository, EventRepository, HolderRepository,
        InventoryRepository,
    },
    service::allocation_guard::{AllocationGuard, SlotLease},
};

const TICKET_CODE_ATTEMPTS: usize = 5;
const SLOT_RESOLD_REASON: &str = "Slot was released and resold before payment completed";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    #[validate(custom(function = "validate_selection"))]
    pub selection: SlotSelection,
}

fn validate_selection(selection: &SlotSelection) -> std::result::Result<(), ValidationError> {
    match selection {
        SlotSelection::ZoneUnits { quantity, .. } if *quantity < 1 => {
            let mut err = ValidationError::new("quantity");
            err.message = Some("Quantity must be at least 1".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatRowGroup {
    pub row: String,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSlot {
    #[serde(flatten)]
    pub availability: ZoneAvailability,
    pub available_percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSlots {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub rows: Vec<SeatRowGroup>,
    pub zones: Vec<ZoneSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    #[serde(flatten)]
    pub booking: Booking,
    pub state: BookingState,
    pub event_title: String,
    pub event_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserBookings {
    pub upcoming: Vec<BookingSummary>,
    pub past: Vec<BookingSummary>,
    pub cancelled: Vec<BookingSummary>,
    pub pending: Vec<BookingSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub booking_id: Uuid,
    pub status: BookingState,
    /// Paid before cancellation; the refund collaborator settles it.
    pub refund_due: bool,
}

/// What a payment outcome did to a booking, used to pick the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirmed,
    Failed,
    Cancelled,
    RefundOwed,
    Unchanged,
}

pub struct BookingService {
    pool: SqlitePool,
    event_repo: Arc<dyn EventRepository>,
    holder_repo: Arc<dyn HolderRepository>,
    inventory_repo: Arc<dyn InventoryRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    guard: Arc<AllocationGuard>,
    integration_manager: Arc<IntegrationManager>,
}

impl BookingService {
    pub fn new(
        pool: SqlitePool,
        event_repo: Arc<dyn EventRepository>,
        holder_repo: Arc<dyn HolderRepository>,
        inventory_repo: Arc<dyn InventoryRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        guard: Arc<AllocationGuard>,
        integration_manager: Arc<IntegrationManager>,
    ) -> Self {
        Self {
            pool,
            event_repo,
            holder_repo,
            inventory_repo,
            booking_repo,
            guard,
            integration_manager,
        }
    }

    pub async fn available_slots(&self, event_id: Uuid) -> Result<EventSlots> {
        let event = self.published_event(event_id).await?;

        let mut slots = EventSlots {
            event_id,
            kind: event.kind(),
            rows: Vec::new(),
            zones: Vec::new(),
        };

        match event.kind() {
            EventKind::Indoor => {
                let seats = self.inventory_repo.list_seats(event_id).await?;
                slots.rows = group_by_row(seats);
            }
            EventKind::Outdoor => {
                slots.zones = self
                    .inventory_repo
                    .list_zones(event_id)
                    .await?
                    .into_iter()
                    .map(|availability| ZoneSlot {
                        available_percentage: availability.available_percentage(),
                        availability,
                    })
                    .collect();
            }
        }

        Ok(slots)
    }

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        request.validate()?;

        let event = self.published_event(request.event_id).await?;
        if event.has_ended(Utc::now().date_naive()) {
            return Err(AppError::EventClosed);
        }

        self.holder_repo
            .find_by_id(request.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let slot = self.resolve_slot(&event, request.selection).await?;

        let lease = self.guard.lease(slot.key()).await;
        let mut tx = self.pool.begin().await?;

        self.guard.claim(&lease, &mut tx, &slot).await?;
        let booking = Booking::new_pending(request.user_id, event.id, &slot);
        booking_repository::insert(&mut tx, &booking).await?;

        tx.commit().await?;
        drop(lease);

        tracing::info!(
            booking_id = %booking.id,
            event_id = %event.id,
            "Booking created, total {} awaiting payment",
            booking.total_price_cents
        );

        Ok(booking)
    }

    /// Validates a selection against the event's kind and inventory.
    async fn resolve_slot(&self, event: &Event, selection: SlotSelection) -> Result<Slot> {
        match (event.kind(), selection) {
            (EventKind::Indoor, SlotSelection::Seat { seat_id }) => {
                let seat = self
                    .inventory_repo
                    .find_seat(seat_id)
                    .await?
                    .filter(|seat| seat.event_id == event.id)
                    .ok_or_else(|| AppError::InvalidSlot("Seat does not belong to this event".to_string()))?;

                if !seat.is_available {
                    return Err(AppError::SlotUnavailable);
                }
                Ok(Slot::Seat(seat))
            }
            (EventKind::Outdoor, SlotSelection::ZoneUnits { zone_id, quantity }) => {
                let zone = self
                    .inventory_repo
                    .find_zone(zone_id)
                    .await?
                    .filter(|zone| zone.event_id == event.id)
                    .ok_or_else(|| AppError::InvalidSlot("Zone does not belong to this event".to_string()))?;

                Ok(Slot::ZoneUnits { zone, quantity })
            }
            (EventKind::Indoor, SlotSelection::ZoneUnits { .. }) => Err(AppError::InvalidSlot(
                "Indoor events are booked by seat".to_string(),
            )),
            (EventKind::Outdoor, SlotSelection::Seat { .. }) => Err(AppError::InvalidSlot(
                "Outdoor events are booked by zone".to_string(),
            )),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn confirm_payment(&self, booking_id: Uuid, outcome: PaymentOutcome) -> Result<Booking> {
        let (booking, _) = self.transition_payment(booking_id, outcome).await?;
        Ok(booking)
    }

    async fn transition_payment(
        &self,
        booking_id: Uuid,
        outcome: PaymentOutcome,
    ) -> Result<(Booking, Transition)> {
        let key = self.get(booking_id).await?.slot_key()?;

        let lease = self.guard.lease(key).await;
        let mut tx = self.pool.begin().await?;

        if !booking_repository::lock(&mut tx, booking_id).await? {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }
        let mut booking = booking_repository::fetch(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let transition = self
            .apply_payment_outcome(&mut tx, &lease, &mut booking, outcome)
            .await?;

        tx.commit().await?;
        drop(lease);

        self.notify(transition, &booking).await;
        Ok((booking, transition))
    }

    /// Applies a payment outcome to a write-locked booking inside the
    /// caller's transaction. Safe to repeat: a confirmed booking keeps its
    /// ticket code and a failed one is not released twice.
    pub(crate) async fn apply_payment_outcome(
        &self,
        conn: &mut SqliteConnection,
        lease: &SlotLease,
        booking: &mut Booking,
        outcome: PaymentOutcome,
    ) -> Result<Transition> {
        let transition = match outcome {
            PaymentOutcome::Success if booking.is_cancelled => {
                if booking.payment_status.is_paid() {
                    Transition::Unchanged
                } else {
                    tracing::warn!(
                        booking_id = %booking.id,
                        "Payment received for cancelled booking, refund owed"
                    );
                    booking.payment_status = PaymentStatus::Paid;
                    booking.payment_date.get_or_insert_with(Utc::now);
                    Transition::RefundOwed
                }
            }
            PaymentOutcome::Success if booking.is_confirmed => Transition::Unchanged,
            PaymentOutcome::Success => {
                // A failed attempt gave the hold back; the slot may be resold.
                let released = booking.payment_status == PaymentStatus::Failed;
                if released && !self.reclaim(lease, &mut *conn, booking).await? {
                    tracing::warn!(
                        booking_id = %booking.id,
                        "Payment received after the slot was resold, refund owed"
                    );
                    booking.is_cancelled = true;
                    booking.cancellation_date = Some(Utc::now());
                    booking.cancellation_reason = Some(SLOT_RESOLD_REASON.to_string());
                    booking.payment_status = PaymentStatus::Paid;
                    booking.payment_date.get_or_insert_with(Utc::now);
                    Transition::RefundOwed
                } else {
                    booking.payment_status = PaymentStatus::Paid;
                    booking.is_confirmed = true;
                    booking.payment_date.get_or_insert_with(Utc::now);
                    if booking.ticket_code.is_none() {
                        booking.ticket_code = Some(issue_ticket_code(&mut *conn).await?);
                    }
                    Transition::Confirmed
                }
            }
            PaymentOutcome::Failure
                if booking.is_cancelled
                    || booking.is_confirmed
                    || booking.payment_status == PaymentStatus::Failed =>
            {
                tracing::debug!(
                    booking_id = %booking.id,
                    "Ignoring failure outcome for booking in state {:?}",
                    booking.state()
                );
                Transition::Unchanged
            }
            PaymentOutcome::Failure => {
                booking.payment_status = PaymentStatus::Failed;
                self.guard.release(lease, &mut *conn).await?;
                tracing::debug!(booking_id = %booking.id, slot = ?lease.key(), "Hold released");
                Transition::Failed
            }
        };

        if transition != Transition::Unchanged {
            booking_repository::save_state(conn, booking).await?;
            tracing::info!(
                booking_id = %booking.id,
                "Payment outcome {:?} applied: {:?}",
                outcome,
                transition
            );
        }

        Ok(transition)
    }

    /// Takes the slot back for a booking whose hold went with a failed
    /// attempt. Returns false if someone else holds it now.
    async fn reclaim(
        &self,
        lease: &SlotLease,
        conn: &mut SqliteConnection,
        booking: &Booking,
    ) -> Result<bool> {
        match self.guard.claim_existing(lease, conn, booking).await {
            Ok(()) => Ok(true),
            Err(AppError::SlotUnavailable | AppError::InsufficientCapacity { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn cancel(&self, booking_id: Uuid, reason: Option<String>) -> Result<Cancellation> {
        let booking = self.get(booking_id).await?;
        if booking.is_cancelled {
            return Err(AppError::AlreadyCancelled);
        }

        let event = self
            .event_repo
            .find_by_id(booking.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if event.has_started(Utc::now().date_naive()) {
            return Err(AppError::EventAlreadyStarted);
        }

        let lease = self.guard.lease(booking.slot_key()?).await;
        let mut tx = self.pool.begin().await?;

        if !booking_repository::lock(&mut tx, booking_id).await? {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }
        let mut booking = booking_repository::fetch(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        if booking.is_cancelled {
            return Err(AppError::AlreadyCancelled);
        }

        let held = booking.holds_inventory();
        booking.is_cancelled = true;
        booking.cancellation_date = Some(Utc::now());
        booking.cancellation_reason = reason;

        if held {
            self.guard.release(&lease, &mut tx).await?;
        }
        booking_repository::save_state(&mut tx, &booking).await?;

        tx.commit().await?;
        drop(lease);

        let refund_due = booking.refund_due();
        tracing::info!(booking_id = %booking.id, refund_due, "Booking cancelled");
        self.notify(Transition::Cancelled, &booking).await;

        Ok(Cancellation {
            booking_id: booking.id,
            status: booking.state(),
            refund_due,
        })
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<UserBookings> {
        let bookings = self.booking_repo.list_by_user(user_id).await?;
        let today = Utc::now().date_naive();

        let mut events: HashMap<Uuid, Event> = HashMap::new();
        let mut overview = UserBookings::default();

        for booking in bookings {
            if !events.contains_key(&booking.event_id) {
                let event = self
                    .event_repo
                    .find_by_id(booking.event_id)
                    .await?
                    .ok_or_else(|| AppError::Internal(format!("Booking {} has no event", booking.id)))?;
                events.insert(event.id, event);
            }
            let Some(event) = events.get(&booking.event_id) else {
                continue;
            };

            let state = booking.state();
            let summary = BookingSummary {
                state,
                event_title: event.title.clone(),
                event_date: event.start_date,
                booking,
            };

            match state {
                BookingState::Cancelled => overview.cancelled.push(summary),
                BookingState::PendingPayment | BookingState::Failed => overview.pending.push(summary),
                BookingState::Confirmed if event.has_ended(today) => overview.past.push(summary),
                BookingState::Confirmed => overview.upcoming.push(summary),
            }
        }

        Ok(overview)
    }

    pub async fn ticket_data(&self, booking_id: Uuid) -> Result<TicketData> {
        let booking = self.get(booking_id).await?;
        if booking.state() != BookingState::Confirmed {
            return Err(AppError::Conflict(
                "Tickets are only issued for confirmed bookings".to_string(),
            ));
        }
        let ticket_code = booking.ticket_code.clone().ok_or_else(|| {
            AppError::Internal(format!("Confirmed booking {} has no ticket code", booking.id))
        })?;

        let event = self
            .event_repo
            .find_by_id(booking.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        let holder = self
            .holder_repo
            .find_by_id(booking.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let slot = match booking.slot_key()? {
            SlotKey::Seat(seat_id) => {
                let seat = self
                    .inventory_repo
                    .find_seat(seat_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Seat not found".to_string()))?;
                TicketSlot::for_seat(&seat)
            }
            SlotKey::Zone(zone_id) => {
                let zone = self
                    .inventory_repo
                    .find_zone(zone_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Zone not found".to_string()))?;
                TicketSlot::for_zone(&zone, booking.quantity)
            }
        };

        TicketData::new(&booking, ticket_code, &event, &holder, slot)
            .map_err(|e| AppError::Internal(format!("Failed to encode QR payload: {}", e)))
    }

    /// Fails bookings that have been pending longer than `older_than`,
    /// releasing their holds. Returns how many were failed.
    pub async fn fail_stale_pending(&self, older_than: Duration) -> Result<usize> {
        let stale = self
            .booking_repo
            .list_stale_pending(Utc::now() - older_than)
            .await?;

        let mut failed = 0;
        for booking in stale {
            match self.transition_payment(booking.id, PaymentOutcome::Failure).await {
                Ok((_, Transition::Failed)) => failed += 1,
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Pending booking {} not expired, retrying next sweep: {:?}", booking.id, e);
                }
                Err(e) => {
                    tracing::error!("Failed to expire pending booking {}: {:?}", booking.id, e);
                }
            }
        }

        Ok(failed)
    }

    pub(crate) async fn notify(&self, transition: Transition, booking: &Booking) {
        let event = match transition {
            Transition::Confirmed => IntegrationEvent::BookingConfirmed(booking.clone()),
            Transition::Failed => IntegrationEvent::BookingFailed(booking.clone()),
            Transition::Cancelled => IntegrationEvent::BookingCancelled(booking.clone()),
            Transition::RefundOwed => IntegrationEvent::RefundOwed(booking.clone()),
            Transition::Unchanged => return,
        };

        self.integration_manager.handle_event(event).await;
    }

    async fn published_event(&self, event_id: Uuid) -> Result<Event> {
        self.event_repo
            .find_by_id(event_id)
            .await?
            .filter(|event| event.is_published)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }
}

async fn issue_ticket_code(conn: &mut SqliteConnection) -> Result<String> {
    for _ in 0..TICKET_CODE_ATTEMPTS {
        let code = generate_ticket_code();
        if !booking_repository::ticket_code_exists(&mut *conn, &code).await? {
            return Ok(code);
        }
    }

    Err(AppError::Internal("Could not allocate a unique ticket code".to_string()))
}

/// Seats arrive ordered by row then number.
fn group_by_row(seats: Vec<Seat>) -> Vec<SeatRowGroup> {
    let mut rows: Vec<SeatRowGroup> = Vec::new();

    for seat in seats {
        match rows.last_mut() {
            Some(group) if group.row == seat.row => group.seats.push(seat),
            _ => rows.push(SeatRowGroup {
                row: seat.row.clone(),
                seats: vec![seat],
            }),
        }
    }

    rows
}
