use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, PaymentStatus},
    error::Result,
    repository::{parse_optional_uuid, parse_uuid, BookingRepository},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    user_id: String,
    event_id: String,
    seat_id: Option<String>,
    zone_id: Option<String>,
    quantity: i64,
    total_price_cents: i64,
    payment_status: String,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    payment_date: Option<NaiveDateTime>,
    is_confirmed: bool,
    is_cancelled: bool,
    cancellation_date: Option<NaiveDateTime>,
    cancellation_reason: Option<String>,
    ticket_code: Option<String>,
    booking_date: NaiveDateTime,
    pending_since: Option<NaiveDateTime>,
    updated_at: NaiveDateTime,
}

const SELECT_BOOKING: &str = r#"
    SELECT id, user_id, event_id, seat_id, zone_id, quantity, total_price_cents,
           payment_status, payment_method, transaction_id, payment_date,
           is_confirmed, is_cancelled, cancellation_date, cancellation_reason,
           ticket_code, booking_date, pending_since, updated_at
    FROM bookings
"#;

fn utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            event_id: parse_uuid(&row.event_id)?,
            seat_id: parse_optional_uuid(row.seat_id.as_deref())?,
            zone_id: parse_optional_uuid(row.zone_id.as_deref())?,
            quantity: row.quantity,
            total_price_cents: row.total_price_cents,
            payment_status: PaymentStatus::parse(&row.payment_status)?,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            payment_date: row.payment_date.map(utc),
            is_confirmed: row.is_confirmed,
            is_cancelled: row.is_cancelled,
            cancellation_date: row.cancellation_date.map(utc),
            cancellation_reason: row.cancellation_reason,
            ticket_code: row.ticket_code,
            booking_date: utc(row.booking_date),
            pending_since: utc(row.pending_since.unwrap_or(row.booking_date)),
            updated_at: utc(row.updated_at),
        })
    }
}

pub(crate) async fn fetch<'e, E>(executor: E, id: Uuid) -> Result<Option<Booking>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.map(SqliteBookingRepository::row_to_booking).transpose()
}

pub(crate) async fn insert(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, user_id, event_id, seat_id, zone_id, quantity, total_price_cents,
            payment_status, payment_method, transaction_id, payment_date,
            is_confirmed, is_cancelled, cancellation_date, cancellation_reason,
            ticket_code, booking_date, pending_since, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(booking.id.to_string())
    .bind(booking.user_id.to_string())
    .bind(booking.event_id.to_string())
    .bind(booking.seat_id.map(|id| id.to_string()))
    .bind(booking.zone_id.map(|id| id.to_string()))
    .bind(booking.quantity)
    .bind(booking.total_price_cents)
    .bind(booking.payment_status.as_str())
    .bind(&booking.payment_method)
    .bind(&booking.transaction_id)
    .bind(booking.payment_date.map(|dt| dt.naive_utc()))
    .bind(booking.is_confirmed)
    .bind(booking.is_cancelled)
    .bind(booking.cancellation_date.map(|dt| dt.naive_utc()))
    .bind(&booking.cancellation_reason)
    .bind(&booking.ticket_code)
    .bind(booking.booking_date.naive_utc())
    .bind(booking.pending_since.naive_utc())
    .bind(booking.updated_at.naive_utc())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Takes the write lock on a booking row before it is re-read and mutated.
/// Returns false if the booking does not exist.
pub(crate) async fn lock(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE bookings SET updated_at = ? WHERE id = ?")
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Persists the lifecycle columns. Slot, quantity and price are immutable
/// after creation and never rewritten.
pub(crate) async fn save_state(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE bookings
        SET payment_status = ?,
            payment_method = ?,
            transaction_id = ?,
            payment_date = ?,
            is_confirmed = ?,
            is_cancelled = ?,
            cancellation_date = ?,
            cancellation_reason = ?,
            ticket_code = COALESCE(ticket_code, ?),
            pending_since = ?,
            updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(booking.payment_status.as_str())
    .bind(&booking.payment_method)
    .bind(&booking.transaction_id)
    .bind(booking.payment_date.map(|dt| dt.naive_utc()))
    .bind(booking.is_confirmed)
    .bind(booking.is_cancelled)
    .bind(booking.cancellation_date.map(|dt| dt.naive_utc()))
    .bind(&booking.cancellation_reason)
    .bind(&booking.ticket_code)
    .bind(booking.pending_since.naive_utc())
    .bind(Utc::now().naive_utc())
    .bind(booking.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn ticket_code_exists(conn: &mut SqliteConnection, code: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE ticket_code = ?")
        .bind(code)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count > 0)
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        fetch(&self.pool, id).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE user_id = ? ORDER BY booking_date DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_booking)
            .collect()
    }

    async fn list_stale_pending(&self, before: DateTime<Utc>) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"{SELECT_BOOKING}
            WHERE payment_status = 'pending'
              AND is_confirmed = 0
              AND is_cancelled = 0
              AND COALESCE(pending_since, booking_date) < ?
            ORDER BY pending_since"#
        ))
        .bind(before.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_booking)
            .collect()
    }
}
