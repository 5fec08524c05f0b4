//! PostgreSQL implementation of [`TravelRequestStore`].
//!
//! Status changes are a single-row conditional `UPDATE ... WHERE status = $expected`,
//! so Postgres row locking decides the winner between concurrent transitions.
//! Queries are checked at runtime rather than with the `query!` macros, so the crate
//! builds without a live database.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};
use uuid::Uuid;

use super::TravelRequestStore;
use crate::error::{Result, TravelflowError};
use crate::request::{RequestId, Status, TravelRequest, TravelRequestData, UserId};

const SELECT_COLUMNS: &str = r#"
    id, owner_id, requester_name, destination, departure_date, return_date,
    notes, status, created_at, updated_at
"#;

/// PostgreSQL-backed travel request store.
///
/// # Example
/// ```ignore
/// use travelflow::storage::postgres::PostgresStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgresql://localhost/travel").await?;
/// travelflow::migrator().run(&pool).await?;
/// let store = PostgresStore::new(pool);
/// ```
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_status(&self, id: RequestId) -> Result<Option<Status>> {
        let row = sqlx::query("SELECT status FROM travel_requests WHERE id = $1")
            .bind(*id as Uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TravelflowError::Other(anyhow!("Failed to read request status: {}", e)))?;

        row.map(|row| {
            let label: String = row
                .try_get("status")
                .map_err(|e| TravelflowError::Other(anyhow!("Failed to decode status: {}", e)))?;
            parse_status(id, &label)
        })
        .transpose()
    }
}

fn parse_status(id: RequestId, label: &str) -> Result<Status> {
    label.parse::<Status>().inspect_err(|_| {
        tracing::error!(
            request_id = %id,
            status = label,
            "Stored travel request has an unknown status"
        );
    })
}

fn request_from_row(row: &PgRow) -> Result<TravelRequest> {
    let decode = |e: sqlx::Error| TravelflowError::Other(anyhow!("Failed to decode row: {}", e));

    let id = RequestId(row.try_get::<Uuid, _>("id").map_err(decode)?);
    let label: String = row.try_get("status").map_err(decode)?;
    let status = parse_status(id, &label)?;

    let data = TravelRequestData {
        id,
        owner: UserId(row.try_get::<Uuid, _>("owner_id").map_err(decode)?),
        requester_name: row.try_get("requester_name").map_err(decode)?,
        destination: row.try_get("destination").map_err(decode)?,
        departure_date: row.try_get::<NaiveDate, _>("departure_date").map_err(decode)?,
        return_date: row.try_get::<NaiveDate, _>("return_date").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
    };
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;

    Ok(TravelRequest::from_storage(data, status, updated_at))
}

#[async_trait]
impl TravelRequestStore for PostgresStore {
    #[tracing::instrument(skip(self, request), fields(request_id = %request.id()))]
    async fn create(&self, request: &TravelRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO travel_requests (
                id, owner_id, requester_name, destination, departure_date, return_date,
                notes, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*request.id() as Uuid)
        .bind(*request.owner() as Uuid)
        .bind(&request.data.requester_name)
        .bind(&request.data.destination)
        .bind(request.data.departure_date)
        .bind(request.data.return_date)
        .bind(&request.data.notes)
        .bind(request.status().as_str())
        .bind(request.data.created_at)
        .bind(request.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| TravelflowError::Other(anyhow!("Failed to insert travel request: {}", e)))?;

        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<TravelRequest> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM travel_requests WHERE id = $1"
        ))
        .bind(*id as Uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TravelflowError::Other(anyhow!("Failed to fetch travel request: {}", e)))?
        .ok_or(TravelflowError::RequestNotFound(id))?;

        request_from_row(&row)
    }

    #[tracing::instrument(skip(self), fields(request_id = %id, expected = %expected, new = %new))]
    async fn update_status(&self, id: RequestId, expected: Status, new: Status) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE travel_requests SET
                status = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(*id as Uuid)
        .bind(expected.as_str())
        .bind(new.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| TravelflowError::Other(anyhow!("Failed to update travel request: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            // Either the row is gone or someone else moved it first
            return match self.current_status(id).await? {
                None => Err(TravelflowError::RequestNotFound(id)),
                Some(actual) => {
                    tracing::debug!(actual = %actual, "Conditional status update lost the race");
                    Err(TravelflowError::StatusConflict {
                        id,
                        expected,
                        actual,
                    })
                }
            };
        }

        Ok(())
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<TravelRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM travel_requests WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(*owner as Uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TravelflowError::Other(anyhow!("Failed to list travel requests: {}", e)))?;

        rows.iter().map(request_from_row).collect()
    }
}
