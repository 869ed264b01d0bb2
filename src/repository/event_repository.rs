use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Event,
    error::{AppError, Result},
    repository::{parse_uuid, EventRepository},
};

#[derive(FromRow)]
struct EventRow {
    id: String,
    title: String,
    venue_name: String,
    is_indoor: bool,
    is_published: bool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    created_at: NaiveDateTime,
}

const SELECT_EVENT: &str = r#"
    SELECT id, title, venue_name, is_indoor, is_published,
           start_date, end_date, start_time, created_at
    FROM events
"#;

pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: EventRow) -> Result<Event> {
        Ok(Event {
            id: parse_uuid(&row.id)?,
            title: row.title,
            venue_name: row.venue_name,
            is_indoor: row.is_indoor,
            is_published: row.is_published,
            start_date: row.start_date,
            end_date: row.end_date,
            start_time: row.start_time,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

pub(crate) async fn fetch<'e, E>(executor: E, id: Uuid) -> Result<Option<Event>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.map(SqliteEventRepository::row_to_event).transpose()
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn create(&self, event: Event) -> Result<Event> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, title, venue_name, is_indoor, is_published,
                start_date, end_date, start_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(event.id.to_string())
        .bind(&event.title)
        .bind(&event.venue_name)
        .bind(event.is_indoor)
        .bind(event.is_published)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.start_time)
        .bind(event.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(event.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created event".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        fetch(&self.pool, id).await
    }

    async fn list_published(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_EVENT} WHERE is_published = 1 ORDER BY start_date DESC, title"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_event)
            .collect()
    }
}
