use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    repository::{parse_uuid, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    gateway: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    transaction_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, booking_id, gateway, gateway_order_id, gateway_payment_id,
           gateway_signature, transaction_id, amount_cents, currency, status,
           paid_at, created_at, updated_at
    FROM payments
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            gateway: row.gateway,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            transaction_id: row.transaction_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: PaymentStatus::parse(&row.status)?,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

pub(crate) async fn fetch_by_booking<'e, E>(executor: E, booking_id: Uuid) -> Result<Option<Payment>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE booking_id = ?"))
        .bind(booking_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.map(SqlitePaymentRepository::row_to_payment).transpose()
}

pub(crate) async fn fetch_by_order<'e, E>(executor: E, order_id: &str) -> Result<Option<Payment>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE gateway_order_id = ?"))
        .bind(order_id)
        .fetch_optional(executor)
        .await?;

    row.map(SqlitePaymentRepository::row_to_payment).transpose()
}

/// Creates the booking's payment row, or points the existing one at a new
/// gateway order. The row's id and transaction id survive every attempt.
pub(crate) async fn upsert_attempt(conn: &mut SqliteConnection, payment: &Payment) -> Result<Payment> {
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, booking_id, gateway, gateway_order_id, gateway_payment_id,
            gateway_signature, transaction_id, amount_cents, currency, status,
            paid_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, NULL, ?, ?)
        ON CONFLICT(booking_id) DO UPDATE SET
            gateway = excluded.gateway,
            gateway_order_id = excluded.gateway_order_id,
            gateway_payment_id = NULL,
            gateway_signature = NULL,
            amount_cents = excluded.amount_cents,
            currency = excluded.currency,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#
    )
    .bind(payment.id.to_string())
    .bind(payment.booking_id.to_string())
    .bind(&payment.gateway)
    .bind(&payment.gateway_order_id)
    .bind(&payment.transaction_id)
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_by_booking(&mut *conn, payment.booking_id).await?.ok_or_else(|| {
        AppError::Database("Failed to retrieve payment attempt".to_string())
    })
}

/// Write-locks the payment for a gateway order. Returns false if no payment
/// carries that order id.
pub(crate) async fn lock_by_order(conn: &mut SqliteConnection, order_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE payments SET updated_at = ? WHERE gateway_order_id = ?")
        .bind(Utc::now().naive_utc())
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn save_callback(conn: &mut SqliteConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE payments
        SET gateway_payment_id = ?,
            gateway_signature = ?,
            status = ?,
            paid_at = ?,
            updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(&payment.gateway_payment_id)
    .bind(&payment.gateway_signature)
    .bind(payment.status.as_str())
    .bind(payment.paid_at.map(|dt| dt.naive_utc()))
    .bind(Utc::now().naive_utc())
    .bind(payment.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None)
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        fetch_by_booking(&self.pool, booking_id).await
    }

    async fn find_by_gateway_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        fetch_by_order(&self.pool, order_id).await
    }
}
