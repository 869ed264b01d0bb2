#![allow(dead_code)]

use std::sync::Arc;

use boxoffice::{
    domain::{Event, Holder, Seat, Zone},
    integrations::IntegrationManager,
    payments::{RawCallback, SandboxGateway},
    repository::{EventRepository, HolderRepository, InventoryRepository},
    service::ServiceContext,
};
use chrono::{Duration, NaiveTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use uuid::Uuid;

pub const SANDBOX_SECRET: &str = "test-sandbox-secret";

pub struct TestContext {
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<SandboxGateway>,
    pub pool: SqlitePool,
    _dir: Option<TempDir>,
}

/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup() -> anyhow::Result<TestContext> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    build(pool, None).await
}

/// A WAL database file shared by several pooled connections, configured the
/// way the server opens its database.
pub async fn setup_file_backed(max_connections: u32) -> anyhow::Result<TestContext> {
    let dir = tempfile::tempdir()?;
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("boxoffice.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    build(pool, Some(dir)).await
}

async fn build(pool: SqlitePool, dir: Option<TempDir>) -> anyhow::Result<TestContext> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let gateway = Arc::new(SandboxGateway::new(SANDBOX_SECRET.to_string()));
    let ctx = service_context(&pool, &gateway);

    Ok(TestContext { ctx, gateway, pool, _dir: dir })
}

fn service_context(pool: &SqlitePool, gateway: &Arc<SandboxGateway>) -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(
        pool.clone(),
        gateway.clone(),
        Arc::new(IntegrationManager::new()),
        "INR".to_string(),
    ))
}

impl TestContext {
    /// Services over the same database with their own allocation guard, as a
    /// second server process would have.
    pub fn second_process(&self) -> Arc<ServiceContext> {
        service_context(&self.pool, &self.gateway)
    }

    pub async fn holder(&self) -> anyhow::Result<Holder> {
        let id = Uuid::new_v4();
        let holder = self.ctx.holder_repo.create(Holder {
            id,
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: format!("{}@example.com", id.simple()),
        }).await?;
        Ok(holder)
    }

    /// Event starting `starts_in` days from today and lasting one day.
    pub async fn event(&self, indoor: bool, starts_in: i64) -> anyhow::Result<Event> {
        let start = Utc::now().date_naive() + Duration::days(starts_in);
        let event = self.ctx.event_repo.create(Event {
            id: Uuid::new_v4(),
            title: if indoor { "Jazz Night".to_string() } else { "Open Air".to_string() },
            venue_name: "Blue Hall".to_string(),
            is_indoor: indoor,
            is_published: true,
            start_date: start,
            end_date: start + Duration::days(1),
            start_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            created_at: Utc::now(),
        }).await?;
        Ok(event)
    }

    pub async fn seat(&self, event: &Event, row: &str, number: i32, price_cents: i64) -> anyhow::Result<Seat> {
        let mut seats = self.ctx.inventory_repo.create_seats(vec![Seat {
            id: Uuid::new_v4(),
            event_id: event.id,
            row: row.to_string(),
            number,
            category: "Standard".to_string(),
            price_cents,
            is_available: true,
        }]).await?;
        Ok(seats.remove(0))
    }

    pub async fn zone(&self, event: &Event, capacity: i64, price_cents: i64) -> anyhow::Result<Zone> {
        let zone = self.ctx.inventory_repo.create_zone(Zone {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "Lawn".to_string(),
            description: "Open lawn".to_string(),
            capacity,
            price_cents,
        }).await?;
        Ok(zone)
    }

    pub async fn seat_is_available(&self, seat_id: Uuid) -> anyhow::Result<bool> {
        let seat = self.ctx.inventory_repo.find_seat(seat_id).await?
            .ok_or_else(|| anyhow::anyhow!("seat vanished"))?;
        Ok(seat.is_available)
    }

    /// A success callback signed the way the sandbox gateway expects.
    pub fn paid(&self, order_id: &str) -> RawCallback {
        self.callback(order_id, "success", None)
    }

    pub fn declined(&self, order_id: &str) -> RawCallback {
        self.callback(order_id, "failed", None)
    }

    pub fn forged(&self, order_id: &str) -> RawCallback {
        self.callback(order_id, "success", Some("0".repeat(64)))
    }

    fn callback(&self, order_id: &str, status: &str, signature: Option<String>) -> RawCallback {
        let payment_id = format!("pay_{}", order_id);
        let signature = signature.unwrap_or_else(|| self.gateway.sign(order_id, &payment_id));
        RawCallback {
            body: serde_json::json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "signature": signature,
                "status": status,
            })
            .to_string(),
            content_type: Some("application/json".to_string()),
            signature_header: None,
        }
    }
}

/// Every seat is unavailable exactly when a pending or confirmed,
/// uncancelled booking references it.
pub async fn assert_seat_holds_consistent(pool: &SqlitePool) -> anyhow::Result<()> {
    let mismatched: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM seats s
        WHERE s.is_available <> (
            NOT EXISTS (
                SELECT 1 FROM bookings b
                WHERE b.seat_id = s.id
                  AND b.is_cancelled = 0
                  AND b.payment_status <> 'failed'
            )
        )
        "#
    )
    .fetch_one(pool)
    .await?;

    assert_eq!(mismatched, 0, "seat availability out of step with holding bookings");
    Ok(())
}
