use async_trait::async_trait;
use sqlx::{FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Holder,
    error::{AppError, Result},
    repository::{parse_uuid, HolderRepository},
};

#[derive(FromRow)]
struct HolderRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
}

pub struct SqliteHolderRepository {
    pool: SqlitePool,
}

impl SqliteHolderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn fetch<'e, E>(executor: E, id: Uuid) -> Result<Option<Holder>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, HolderRow>(
        "SELECT id, first_name, last_name, email FROM holders WHERE id = ?"
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;

    match row {
        Some(r) => Ok(Some(Holder {
            id: parse_uuid(&r.id)?,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
        })),
        None => Ok(None),
    }
}

#[async_trait]
impl HolderRepository for SqliteHolderRepository {
    async fn create(&self, holder: Holder) -> Result<Holder> {
        sqlx::query(
            "INSERT INTO holders (id, first_name, last_name, email) VALUES (?, ?, ?, ?)"
        )
        .bind(holder.id.to_string())
        .bind(&holder.first_name)
        .bind(&holder.last_name)
        .bind(&holder.email)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("UNIQUE") => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => other.into(),
        })?;

        self.find_by_id(holder.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created holder".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Holder>> {
        fetch(&self.pool, id).await
    }
}
