use async_trait::async_trait;
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Seat, Zone, ZoneAvailability},
    error::{AppError, Result},
    repository::{parse_uuid, InventoryRepository},
};

#[derive(FromRow)]
struct SeatRow {
    id: String,
    event_id: String,
    row_label: String,
    number: i32,
    category: String,
    price_cents: i64,
    is_available: bool,
}

#[derive(FromRow)]
struct ZoneRow {
    id: String,
    event_id: String,
    name: String,
    description: String,
    capacity: i64,
    price_cents: i64,
}

#[derive(FromRow)]
struct ZoneAvailabilityRow {
    id: String,
    event_id: String,
    name: String,
    description: String,
    capacity: i64,
    price_cents: i64,
    available_seats: i64,
}

/// Units held by pending or confirmed bookings that are neither cancelled
/// nor failed. Every capacity read goes through this expression.
const HELD_UNITS: &str = r#"
    COALESCE((
        SELECT SUM(b.quantity) FROM bookings b
        WHERE b.zone_id = z.id
          AND b.is_cancelled = 0
          AND b.payment_status <> 'failed'
    ), 0)
"#;

pub struct SqliteInventoryRepository {
    pool: SqlitePool,
}

impl SqliteInventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_seat(row: SeatRow) -> Result<Seat> {
        Ok(Seat {
            id: parse_uuid(&row.id)?,
            event_id: parse_uuid(&row.event_id)?,
            row: row.row_label,
            number: row.number,
            category: row.category,
            price_cents: row.price_cents,
            is_available: row.is_available,
        })
    }

    fn row_to_zone(row: ZoneRow) -> Result<Zone> {
        Ok(Zone {
            id: parse_uuid(&row.id)?,
            event_id: parse_uuid(&row.event_id)?,
            name: row.name,
            description: row.description,
            capacity: row.capacity,
            price_cents: row.price_cents,
        })
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn create_seats(&self, seats: Vec<Seat>) -> Result<Vec<Seat>> {
        let mut tx = self.pool.begin().await?;

        for seat in &seats {
            sqlx::query(
                r#"
                INSERT INTO seats (id, event_id, row_label, number, category, price_cents, is_available)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(seat.id.to_string())
            .bind(seat.event_id.to_string())
            .bind(&seat.row)
            .bind(seat.number)
            .bind(&seat.category)
            .bind(seat.price_cents)
            .bind(seat.is_available)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(seats)
    }

    async fn create_zone(&self, zone: Zone) -> Result<Zone> {
        sqlx::query(
            r#"
            INSERT INTO zones (id, event_id, name, description, capacity, price_cents)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(zone.id.to_string())
        .bind(zone.event_id.to_string())
        .bind(&zone.name)
        .bind(&zone.description)
        .bind(zone.capacity)
        .bind(zone.price_cents)
        .execute(&self.pool)
        .await?;

        self.find_zone(zone.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created zone".to_string())
        })
    }

    async fn find_seat(&self, id: Uuid) -> Result<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, event_id, row_label, number, category, price_cents, is_available
            FROM seats
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_seat).transpose()
    }

    async fn find_zone(&self, id: Uuid) -> Result<Option<Zone>> {
        let row = sqlx::query_as::<_, ZoneRow>(
            r#"
            SELECT id, event_id, name, description, capacity, price_cents
            FROM zones
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_zone).transpose()
    }

    async fn list_seats(&self, event_id: Uuid) -> Result<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, event_id, row_label, number, category, price_cents, is_available
            FROM seats
            WHERE event_id = ?
            ORDER BY row_label, number
            "#
        )
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_seat)
            .collect()
    }

    async fn list_zones(&self, event_id: Uuid) -> Result<Vec<ZoneAvailability>> {
        let rows = sqlx::query_as::<_, ZoneAvailabilityRow>(&format!(
            r#"
            SELECT z.id, z.event_id, z.name, z.description, z.capacity, z.price_cents,
                   z.capacity - {HELD_UNITS} AS available_seats
            FROM zones z
            WHERE z.event_id = ?
            ORDER BY z.name
            "#
        ))
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let available_seats = row.available_seats;
                let zone = Self::row_to_zone(ZoneRow {
                    id: row.id,
                    event_id: row.event_id,
                    name: row.name,
                    description: row.description,
                    capacity: row.capacity,
                    price_cents: row.price_cents,
                })?;
                Ok(ZoneAvailability { zone, available_seats })
            })
            .collect()
    }

    async fn zone_available_seats(&self, zone_id: Uuid) -> Result<i64> {
        available_zone_units(&self.pool, zone_id).await
    }
}

/// Capacity minus held units, derived at evaluation time.
pub(crate) async fn available_zone_units<'e, E>(executor: E, zone_id: Uuid) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let available: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT z.capacity - {HELD_UNITS} FROM zones z WHERE z.id = ?"
    ))
    .bind(zone_id.to_string())
    .fetch_optional(executor)
    .await?;

    available.ok_or_else(|| AppError::NotFound("Zone not found".to_string()))
}

/// Flips an available seat to unavailable in a single conditional write.
pub(crate) async fn reserve_seat(conn: &mut SqliteConnection, seat_id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE seats SET is_available = 0 WHERE id = ? AND is_available = 1")
        .bind(seat_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(AppError::SlotUnavailable)
    }
}

/// Idempotent.
pub(crate) async fn release_seat(conn: &mut SqliteConnection, seat_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE seats SET is_available = 1 WHERE id = ?")
        .bind(seat_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Bumps the zone's version so this transaction owns the write lock before
/// capacity is derived; concurrent claims on the zone queue behind it.
pub(crate) async fn lock_zone(conn: &mut SqliteConnection, zone_id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE zones SET version = version + 1 WHERE id = ?")
        .bind(zone_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Zone not found".to_string()));
    }
    Ok(())
}

/// Validates that `quantity` units fit. Nothing is decremented: the booking
/// row written in the same transaction is what holds the units.
pub(crate) async fn reserve_zone_units(
    conn: &mut SqliteConnection,
    zone_id: Uuid,
    quantity: i64,
) -> Result<()> {
    let available = available_zone_units(&mut *conn, zone_id).await?;
    if available < quantity {
        return Err(AppError::InsufficientCapacity { available: available.max(0) });
    }
    Ok(())
}

/// Capacity is derived from holding bookings, so a cancelled or failed
/// booking frees its units on the next read.
pub(crate) fn release_zone_units(zone_id: Uuid) {
    tracing::trace!(%zone_id, "zone units released by booking state");
}
