mod common;

use boxoffice::{
    domain::{BookingState, PaymentOutcome, PaymentStatus, SlotSelection, TicketSlot},
    error::AppError,
    service::CreateBookingRequest,
};
use chrono::Duration;
use common::{assert_seat_holds_consistent, setup};
use uuid::Uuid;

fn seat_request(user_id: Uuid, event_id: Uuid, seat_id: Uuid) -> CreateBookingRequest {
    CreateBookingRequest {
        user_id,
        event_id,
        selection: SlotSelection::Seat { seat_id },
    }
}

fn zone_request(user_id: Uuid, event_id: Uuid, zone_id: Uuid, quantity: i64) -> CreateBookingRequest {
    CreateBookingRequest {
        user_id,
        event_id,
        selection: SlotSelection::ZoneUnits { zone_id, quantity },
    }
}

#[tokio::test]
async fn test_seat_is_held_from_creation_until_cancellation() -> anyhow::Result<()> {
    let t = setup().await?;
    let alice = t.holder().await?;
    let bob = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "C", 12, 1500).await?;
    let bookings = &t.ctx.booking_service;

    let booking = bookings.create_booking(seat_request(alice.id, event.id, seat.id)).await?;
    assert_eq!(booking.total_price_cents, 1500);
    assert_eq!(booking.state(), BookingState::PendingPayment);
    assert!(!t.seat_is_available(seat.id).await?);

    // Held before payment
    let second = bookings.create_booking(seat_request(bob.id, event.id, seat.id)).await;
    assert!(matches!(second, Err(AppError::SlotUnavailable)));

    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;
    assert_eq!(intent.amount, 1500);
    assert_eq!(intent.currency, "INR");

    let outcome = t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Confirmed);
    assert_eq!(outcome.payment_status, PaymentStatus::Paid);
    assert!(!t.seat_is_available(seat.id).await?);

    let cancellation = bookings.cancel(booking.id, Some("Plans changed".to_string())).await?;
    assert_eq!(cancellation.status, BookingState::Cancelled);
    assert!(cancellation.refund_due);
    assert!(t.seat_is_available(seat.id).await?);

    // Immediately bookable again
    let rebooked = bookings.create_booking(seat_request(bob.id, event.id, seat.id)).await?;
    assert_eq!(rebooked.seat_id, Some(seat.id));
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_zone_units_scale_price_and_return_on_cancel() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(false, 10).await?;
    let zone = t.zone(&event, 10, 20).await?;
    let inventory = &t.ctx.inventory_repo;

    let booking = t.ctx.booking_service
        .create_booking(zone_request(holder.id, event.id, zone.id, 4))
        .await?;
    assert_eq!(booking.total_price_cents, 80);
    assert_eq!(inventory.zone_available_seats(zone.id).await?, 6);

    let confirmed = t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Success).await?;
    assert!(confirmed.is_confirmed);
    assert_eq!(inventory.zone_available_seats(zone.id).await?, 6);

    t.ctx.booking_service.cancel(booking.id, None).await?;
    assert_eq!(inventory.zone_available_seats(zone.id).await?, 10);

    Ok(())
}

#[tokio::test]
async fn test_zone_rejects_quantity_beyond_remaining_capacity() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(false, 10).await?;
    let zone = t.zone(&event, 5, 100).await?;

    t.ctx.booking_service.create_booking(zone_request(holder.id, event.id, zone.id, 3)).await?;
    let result = t.ctx.booking_service
        .create_booking(zone_request(holder.id, event.id, zone.id, 3))
        .await;
    assert!(matches!(result, Err(AppError::InsufficientCapacity { available: 2 })));

    let result = t.ctx.booking_service
        .create_booking(zone_request(holder.id, event.id, zone.id, 0))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_redelivered_callback_is_a_no_op() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(false, 10).await?;
    let zone = t.zone(&event, 10, 20).await?;

    let booking = t.ctx.booking_service
        .create_booking(zone_request(holder.id, event.id, zone.id, 4))
        .await?;
    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;

    t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    let first = t.ctx.booking_service.get(booking.id).await?;
    let first_payment = t.ctx.payment_repo.find_by_booking(booking.id).await?.unwrap();

    let again = t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    let second = t.ctx.booking_service.get(booking.id).await?;
    let second_payment = t.ctx.payment_repo.find_by_booking(booking.id).await?.unwrap();

    assert_eq!(again.status, BookingState::Confirmed);
    assert!(first.ticket_code.is_some());
    assert_eq!(first.ticket_code, second.ticket_code);
    assert_eq!(first.payment_date, second.payment_date);
    assert_eq!(first_payment.paid_at, second_payment.paid_at);
    assert_eq!(t.ctx.inventory_repo.zone_available_seats(zone.id).await?, 6);

    Ok(())
}

#[tokio::test]
async fn test_begin_payment_reuses_the_payment_record() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "A", 1, 500).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;

    let first = t.ctx.payment_service.begin_payment(booking.id).await?;
    let payment = t.ctx.payment_repo.find_by_booking(booking.id).await?.unwrap();

    let second = t.ctx.payment_service.begin_payment(booking.id).await?;
    let reused = t.ctx.payment_repo.find_by_booking(booking.id).await?.unwrap();

    assert_ne!(first.gateway_order_id, second.gateway_order_id);
    assert_eq!(payment.id, reused.id);
    assert_eq!(payment.transaction_id, reused.transaction_id);
    assert_eq!(reused.gateway_order_id.as_deref(), Some(second.gateway_order_id.as_str()));
    assert_eq!(reused.status, PaymentStatus::Pending);

    let refreshed = t.ctx.booking_service.get(booking.id).await?;
    assert_eq!(refreshed.transaction_id.as_deref(), Some(payment.transaction_id.as_str()));
    assert_eq!(refreshed.payment_method.as_deref(), Some("sandbox"));

    // The superseded order is no longer ours
    let stale = t.ctx.payment_service.reconcile_callback(t.paid(&first.gateway_order_id)).await;
    assert!(matches!(stale, Err(AppError::UnknownOrder(_))));

    Ok(())
}

#[tokio::test]
async fn test_forged_callback_fails_only_the_attempt() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "B", 4, 900).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;
    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;

    let result = t.ctx.payment_service.reconcile_callback(t.forged(&intent.gateway_order_id)).await;
    assert!(matches!(result, Err(AppError::SignatureInvalid)));

    let payment = t.ctx.payment_repo.find_by_booking(booking.id).await?.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let untouched = t.ctx.booking_service.get(booking.id).await?;
    assert_eq!(untouched.state(), BookingState::PendingPayment);
    assert!(untouched.ticket_code.is_none());
    assert!(!t.seat_is_available(seat.id).await?);

    // A fresh attempt goes through
    let retry = t.ctx.payment_service.begin_payment(booking.id).await?;
    let outcome = t.ctx.payment_service.reconcile_callback(t.paid(&retry.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Confirmed);

    Ok(())
}

#[tokio::test]
async fn test_callback_for_unknown_order_is_rejected() -> anyhow::Result<()> {
    let t = setup().await?;

    let result = t.ctx.payment_service.reconcile_callback(t.paid("order_never_issued")).await;
    assert!(matches!(result, Err(AppError::UnknownOrder(ref id)) if id == "order_never_issued"));

    let malformed = t.ctx.payment_service
        .reconcile_callback(boxoffice::payments::RawCallback {
            body: "not json".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(malformed, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn test_declined_payment_releases_seat_and_retry_reclaims_it() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "D", 7, 1200).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;
    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;

    let outcome = t.ctx.payment_service.reconcile_callback(t.declined(&intent.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Failed);
    assert_eq!(outcome.payment_status, PaymentStatus::Failed);
    assert!(t.seat_is_available(seat.id).await?);
    assert_seat_holds_consistent(&t.pool).await?;

    let retry = t.ctx.payment_service.begin_payment(booking.id).await?;
    assert!(!t.seat_is_available(seat.id).await?);
    assert_eq!(t.ctx.booking_service.get(booking.id).await?.state(), BookingState::PendingPayment);

    let outcome = t.ctx.payment_service.reconcile_callback(t.paid(&retry.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Confirmed);
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_retry_fails_when_released_seat_was_taken() -> anyhow::Result<()> {
    let t = setup().await?;
    let alice = t.holder().await?;
    let bob = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "E", 2, 1200).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(alice.id, event.id, seat.id))
        .await?;
    t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Failure).await?;

    let bobs = t.ctx.booking_service.create_booking(seat_request(bob.id, event.id, seat.id)).await?;

    let retry = t.ctx.payment_service.begin_payment(booking.id).await;
    assert!(matches!(retry, Err(AppError::SlotUnavailable)));
    assert_eq!(t.ctx.booking_service.get(booking.id).await?.state(), BookingState::Failed);

    // A late success cannot take the seat back, so the money is owed back
    let late = t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Success).await?;
    assert_eq!(late.state(), BookingState::Cancelled);
    assert!(late.refund_due());
    assert!(late.ticket_code.is_none());
    assert_eq!(t.ctx.booking_service.get(bobs.id).await?.state(), BookingState::PendingPayment);
    assert!(!t.seat_is_available(seat.id).await?);
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_captured_payment_for_resold_seat_is_recorded_for_refund() -> anyhow::Result<()> {
    let t = setup().await?;
    let alice = t.holder().await?;
    let bob = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "E", 3, 1200).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(alice.id, event.id, seat.id))
        .await?;
    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;
    t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Failure).await?;
    t.ctx.booking_service.create_booking(seat_request(bob.id, event.id, seat.id)).await?;

    let outcome = t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Cancelled);
    assert_eq!(outcome.payment_status, PaymentStatus::Paid);
    assert!(outcome.refund_due);

    let payment = t.ctx.payment_repo.find_by_booking(booking.id).await?
        .ok_or_else(|| anyhow::anyhow!("payment row missing"))?;
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.gateway_payment_id, Some(format!("pay_{}", intent.gateway_order_id)));
    assert!(payment.paid_at.is_some());

    // Redelivery is a no-op
    let again = t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    assert_eq!(again.status, BookingState::Cancelled);
    assert!(again.refund_due);

    assert!(!t.seat_is_available(seat.id).await?);
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_payment_after_cancellation_is_flagged_for_refund() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "F", 1, 700).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;
    let intent = t.ctx.payment_service.begin_payment(booking.id).await?;

    let cancellation = t.ctx.booking_service.cancel(booking.id, None).await?;
    assert!(!cancellation.refund_due);

    let outcome = t.ctx.payment_service.reconcile_callback(t.paid(&intent.gateway_order_id)).await?;
    assert_eq!(outcome.status, BookingState::Cancelled);
    assert_eq!(outcome.payment_status, PaymentStatus::Paid);

    let booking = t.ctx.booking_service.get(booking.id).await?;
    assert!(booking.refund_due());
    assert!(booking.ticket_code.is_none());
    assert!(t.seat_is_available(seat.id).await?);

    let paying_cancelled = t.ctx.payment_service.begin_payment(booking.id).await;
    assert!(matches!(paying_cancelled, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_selection_must_match_event() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let indoor = t.event(true, 7).await?;
    let other_indoor = t.event(true, 7).await?;
    let outdoor = t.event(false, 7).await?;
    let zone = t.zone(&outdoor, 10, 100).await?;
    let foreign_seat = t.seat(&other_indoor, "A", 1, 100).await?;

    let wrong_kind = t.ctx.booking_service
        .create_booking(zone_request(holder.id, indoor.id, zone.id, 1))
        .await;
    assert!(matches!(wrong_kind, Err(AppError::InvalidSlot(_))));

    let wrong_event = t.ctx.booking_service
        .create_booking(seat_request(holder.id, indoor.id, foreign_seat.id))
        .await;
    assert!(matches!(wrong_event, Err(AppError::InvalidSlot(_))));

    let seat_at_outdoor = t.ctx.booking_service
        .create_booking(seat_request(holder.id, outdoor.id, foreign_seat.id))
        .await;
    assert!(matches!(seat_at_outdoor, Err(AppError::InvalidSlot(_))));

    let unknown_user = t.ctx.booking_service
        .create_booking(zone_request(Uuid::new_v4(), outdoor.id, zone.id, 1))
        .await;
    assert!(matches!(unknown_user, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_cancellation_rules() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let future = t.event(false, 7).await?;
    let today = t.event(false, 0).await?;
    let finished = t.event(false, -3).await?;
    let future_zone = t.zone(&future, 10, 100).await?;
    let today_zone = t.zone(&today, 10, 100).await?;
    let finished_zone = t.zone(&finished, 10, 100).await?;

    let booking = t.ctx.booking_service
        .create_booking(zone_request(holder.id, future.id, future_zone.id, 2))
        .await?;
    t.ctx.booking_service.cancel(booking.id, None).await?;
    let again = t.ctx.booking_service.cancel(booking.id, None).await;
    assert!(matches!(again, Err(AppError::AlreadyCancelled)));

    // Bookable until it ends, cancellable only until it starts
    let started = t.ctx.booking_service
        .create_booking(zone_request(holder.id, today.id, today_zone.id, 1))
        .await?;
    let result = t.ctx.booking_service.cancel(started.id, None).await;
    assert!(matches!(result, Err(AppError::EventAlreadyStarted)));

    let closed = t.ctx.booking_service
        .create_booking(zone_request(holder.id, finished.id, finished_zone.id, 1))
        .await;
    assert!(matches!(closed, Err(AppError::EventClosed)));

    Ok(())
}

#[tokio::test]
async fn test_ticket_data_for_confirmed_seat() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "C", 12, 1500).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;

    let early = t.ctx.booking_service.ticket_data(booking.id).await;
    assert!(matches!(early, Err(AppError::Conflict(_))));

    let confirmed = t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Success).await?;
    let code = confirmed.ticket_code.clone().unwrap();
    assert_eq!(code.len(), 10);

    let ticket = t.ctx.booking_service.ticket_data(booking.id).await?;
    assert_eq!(ticket.ticket_code, code);
    assert_eq!(ticket.holder_name, "Asha Rao");
    assert_eq!(ticket.slot, TicketSlot::Seat { seat: "C12".to_string() });
    assert_eq!(ticket.time, "07:30 PM");
    assert_eq!(
        ticket.qr_payload,
        format!(
            r#"{{"ticket_code":"{}","event":"Jazz Night","date":"{}","name":"Asha Rao","seat":"C12"}}"#,
            code,
            event.start_date.format("%d %b %Y")
        )
    );

    // Direct confirmation is idempotent too
    let again = t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Success).await?;
    assert_eq!(again.ticket_code, Some(code));

    Ok(())
}

#[tokio::test]
async fn test_user_bookings_are_grouped_by_state() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(false, 7).await?;
    let zone = t.zone(&event, 20, 100).await?;
    let service = &t.ctx.booking_service;

    let confirmed = service.create_booking(zone_request(holder.id, event.id, zone.id, 1)).await?;
    service.confirm_payment(confirmed.id, PaymentOutcome::Success).await?;
    let cancelled = service.create_booking(zone_request(holder.id, event.id, zone.id, 1)).await?;
    service.cancel(cancelled.id, None).await?;
    let pending = service.create_booking(zone_request(holder.id, event.id, zone.id, 2)).await?;

    let overview = service.list_for_user(holder.id).await?;
    assert_eq!(overview.upcoming.len(), 1);
    assert_eq!(overview.upcoming[0].booking.id, confirmed.id);
    assert_eq!(overview.cancelled.len(), 1);
    assert_eq!(overview.cancelled[0].booking.id, cancelled.id);
    assert_eq!(overview.pending.len(), 1);
    assert_eq!(overview.pending[0].booking.id, pending.id);
    assert!(overview.past.is_empty());
    assert_eq!(overview.upcoming[0].event_title, "Open Air");

    Ok(())
}

#[tokio::test]
async fn test_stale_pending_bookings_are_released() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "G", 3, 1000).await?;
    let kept_seat = t.seat(&event, "G", 4, 1000).await?;

    let stale = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;
    let paid = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, kept_seat.id))
        .await?;
    t.ctx.booking_service.confirm_payment(paid.id, PaymentOutcome::Success).await?;

    // Nothing is older than an hour yet
    assert_eq!(t.ctx.booking_service.fail_stale_pending(Duration::hours(1)).await?, 0);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(t.ctx.booking_service.fail_stale_pending(Duration::zero()).await?, 1);

    assert_eq!(t.ctx.booking_service.get(stale.id).await?.state(), BookingState::Failed);
    assert!(t.seat_is_available(seat.id).await?);
    assert!(!t.seat_is_available(kept_seat.id).await?);
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_retried_payment_restarts_the_pending_window() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let event = t.event(true, 7).await?;
    let seat = t.seat(&event, "G", 5, 1000).await?;

    let booking = t.ctx.booking_service
        .create_booking(seat_request(holder.id, event.id, seat.id))
        .await?;
    t.ctx.booking_service.confirm_payment(booking.id, PaymentOutcome::Failure).await?;

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    t.ctx.payment_service.begin_payment(booking.id).await?;

    // The booking is old but its attempt is fresh
    let window = Duration::milliseconds(600);
    assert_eq!(t.ctx.booking_service.fail_stale_pending(window).await?, 0);
    assert_eq!(t.ctx.booking_service.get(booking.id).await?.state(), BookingState::PendingPayment);
    assert!(!t.seat_is_available(seat.id).await?);

    tokio::time::sleep(std::time::Duration::from_millis(800)).await;
    assert_eq!(t.ctx.booking_service.fail_stale_pending(window).await?, 1);
    assert_eq!(t.ctx.booking_service.get(booking.id).await?.state(), BookingState::Failed);
    assert!(t.seat_is_available(seat.id).await?);
    assert_seat_holds_consistent(&t.pool).await?;

    Ok(())
}

#[tokio::test]
async fn test_slot_listing_groups_rows_and_reports_zone_fill() -> anyhow::Result<()> {
    let t = setup().await?;
    let holder = t.holder().await?;
    let indoor = t.event(true, 7).await?;
    t.seat(&indoor, "B", 2, 100).await?;
    t.seat(&indoor, "A", 2, 100).await?;
    t.seat(&indoor, "A", 1, 100).await?;

    let slots = t.ctx.booking_service.available_slots(indoor.id).await?;
    assert_eq!(slots.rows.len(), 2);
    assert_eq!(slots.rows[0].row, "A");
    assert_eq!(
        slots.rows[0].seats.iter().map(|s| s.number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(slots.zones.is_empty());

    let outdoor = t.event(false, 7).await?;
    let zone = t.zone(&outdoor, 8, 100).await?;
    t.ctx.booking_service.create_booking(zone_request(holder.id, outdoor.id, zone.id, 2)).await?;

    let slots = t.ctx.booking_service.available_slots(outdoor.id).await?;
    assert_eq!(slots.zones.len(), 1);
    assert_eq!(slots.zones[0].availability.available_seats, 6);
    assert_eq!(slots.zones[0].available_percentage, 75);

    Ok(())
}
