use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{CallbackPayload, OrderRequest, PaymentGateway, RawCallback},
    repository::{booking_repository, payment_repository, BookingRepository, PaymentRepository},
    service::{allocation_guard::AllocationGuard, booking_service::BookingService},
};

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub booking_id: Uuid,
    pub status: BookingState,
    pub payment_status: PaymentStatus,
    pub refund_due: bool,
}

pub struct PaymentService {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    booking_service: Arc<BookingService>,
    guard: Arc<AllocationGuard>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        booking_service: Arc<BookingService>,
        guard: Arc<AllocationGuard>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            payment_repo,
            booking_service,
            guard,
            gateway,
            currency,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    /// Opens a payment attempt for a booking. The booking's single payment
    /// row is created on the first call and re-pointed at the new gateway
    /// order on later ones.
    pub async fn begin_payment(&self, booking_id: Uuid) -> Result<PaymentIntent> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        ensure_payable(&booking)?;

        // Nothing is written until the gateway has accepted the order.
        let order = self
            .gateway
            .create_order(&OrderRequest {
                booking_id,
                amount_cents: booking.total_price_cents,
                currency: self.currency.clone(),
                description: format!("Booking {}", booking_id),
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    booking_id = %booking_id,
                    retryable = e.is_retryable(),
                    "Gateway rejected order: {}",
                    e
                );
                e
            })?;

        let lease = self.guard.lease(booking.slot_key()?).await;
        let mut tx = self.pool.begin().await?;

        if !booking_repository::lock(&mut tx, booking_id).await? {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }
        let mut booking = booking_repository::fetch(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        ensure_payable(&booking)?;

        if booking.payment_status == PaymentStatus::Failed {
            self.guard.claim_existing(&lease, &mut tx, &booking).await?;
        }

        let existing = payment_repository::fetch_by_booking(&mut *tx, booking_id).await?;
        let now = Utc::now();
        let attempt = Payment {
            id: existing.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            booking_id,
            gateway: self.gateway.name().to_string(),
            gateway_order_id: Some(order.order_id.clone()),
            gateway_payment_id: None,
            gateway_signature: None,
            transaction_id: existing
                .as_ref()
                .map(|p| p.transaction_id.clone())
                .unwrap_or_else(new_transaction_id),
            amount_cents: booking.total_price_cents,
            currency: self.currency.clone(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let payment = payment_repository::upsert_attempt(&mut tx, &attempt).await?;

        booking.payment_status = PaymentStatus::Pending;
        booking.pending_since = now;
        booking.payment_method = Some(payment.gateway.clone());
        booking.transaction_id = Some(payment.transaction_id.clone());
        booking_repository::save_state(&mut tx, &booking).await?;

        tx.commit().await?;
        drop(lease);

        tracing::info!(
            booking_id = %booking_id,
            gateway = %payment.gateway,
            "Payment attempt opened with order {}",
            order.order_id
        );

        Ok(PaymentIntent {
            booking_id,
            gateway: payment.gateway,
            gateway_order_id: order.order_id,
            amount: payment.amount_cents,
            currency: payment.currency,
            checkout_url: order.checkout_url,
        })
    }

    /// Verifies a gateway callback and applies it to the payment and its
    /// booking in one transaction. Redelivered callbacks are no-ops.
    pub async fn reconcile_callback(&self, raw: RawCallback) -> Result<ReconcileOutcome> {
        let payload = self.gateway.parse_callback(&raw)?;

        if let Err(e) = self.gateway.verify_callback(&raw, &payload) {
            tracing::warn!(
                order_id = %payload.order_id,
                "Callback signature verification failed"
            );
            if let Err(mark_err) = self.mark_attempt_failed(&payload).await {
                tracing::error!(
                    "Failed to record rejected attempt for order {}: {:?}",
                    payload.order_id,
                    mark_err
                );
            }
            return Err(e);
        }

        let payment = self
            .payment_repo
            .find_by_gateway_order_id(&payload.order_id)
            .await?
            .ok_or_else(|| unknown_order(&payload.order_id))?;
        let booking = self
            .booking_repo
            .find_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let lease = self.guard.lease(booking.slot_key()?).await;
        let mut tx = self.pool.begin().await?;

        // A newer attempt may have replaced the order since the lookup.
        if !payment_repository::lock_by_order(&mut tx, &payload.order_id).await? {
            return Err(unknown_order(&payload.order_id));
        }
        let mut payment = payment_repository::fetch_by_order(&mut *tx, &payload.order_id)
            .await?
            .ok_or_else(|| unknown_order(&payload.order_id))?;

        booking_repository::lock(&mut tx, payment.booking_id).await?;
        let mut booking = booking_repository::fetch(&mut *tx, payment.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        match payload.outcome {
            PaymentOutcome::Success => {
                payment.status = PaymentStatus::Paid;
                payment.paid_at.get_or_insert_with(Utc::now);
                record_gateway_reference(&mut payment, &payload);
            }
            PaymentOutcome::Failure if !payment.status.is_paid() => {
                payment.status = PaymentStatus::Failed;
                record_gateway_reference(&mut payment, &payload);
            }
            PaymentOutcome::Failure => {}
        }
        payment_repository::save_callback(&mut tx, &payment).await?;

        let transition = self
            .booking_service
            .apply_payment_outcome(&mut tx, &lease, &mut booking, payload.outcome)
            .await?;

        tx.commit().await?;
        drop(lease);

        self.booking_service.notify(transition, &booking).await;

        Ok(ReconcileOutcome {
            booking_id: booking.id,
            status: booking.state(),
            payment_status: booking.payment_status,
            refund_due: booking.refund_due(),
        })
    }

    /// A forged or corrupted callback for a known order fails that attempt
    /// only. The booking is left for a fresh `begin_payment`.
    async fn mark_attempt_failed(&self, payload: &CallbackPayload) -> Result<()> {
        let known = self
            .payment_repo
            .find_by_gateway_order_id(&payload.order_id)
            .await?;
        if !matches!(known, Some(ref p) if p.status == PaymentStatus::Pending) {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        if !payment_repository::lock_by_order(&mut tx, &payload.order_id).await? {
            return Ok(());
        }
        let Some(mut payment) = payment_repository::fetch_by_order(&mut *tx, &payload.order_id).await? else {
            return Ok(());
        };

        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Failed;
            if payment.gateway_payment_id.is_none() {
                payment.gateway_payment_id = payload.payment_id.clone();
            }
            payment_repository::save_callback(&mut tx, &payment).await?;
            tracing::info!(
                booking_id = %payment.booking_id,
                "Payment attempt for order {} marked failed",
                payload.order_id
            );
        }

        tx.commit().await?;
        Ok(())
    }
}

fn ensure_payable(booking: &Booking) -> Result<()> {
    if booking.is_cancelled {
        return Err(AppError::Conflict("Booking is cancelled".to_string()));
    }
    if booking.is_confirmed || booking.payment_status.is_paid() {
        return Err(AppError::Conflict("Booking is already paid".to_string()));
    }
    Ok(())
}

fn record_gateway_reference(payment: &mut Payment, payload: &CallbackPayload) {
    if payload.payment_id.is_some() {
        payment.gateway_payment_id = payload.payment_id.clone();
    }
    if payload.signature.is_some() {
        payment.gateway_signature = payload.signature.clone();
    }
}

fn unknown_order(order_id: &str) -> AppError {
    tracing::warn!("Callback references unknown gateway order {}", order_id);
    AppError::UnknownOrder(order_id.to_string())
}
