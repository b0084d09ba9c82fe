//! PostgreSQL notification outbox

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use lease_core::domain::{NotificationKind, OutboxMessage};
use lease_core::error::DomainError;
use lease_core::repositories::OutboxRepository;

use super::db_error;

pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Used inside the transactions that cause a notification.
pub(crate) async fn insert_message(
    conn: &mut PgConnection,
    message: &OutboxMessage,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO outbox
            (id, recipient, kind, attempts, last_error, created_at, delivered_at, claimed_until)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(message.id)
    .bind(&message.recipient)
    .bind(Json(&message.kind))
    .bind(message.attempts)
    .bind(&message.last_error)
    .bind(message.created_at)
    .bind(message.delivered_at)
    .bind(message.claimed_until)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<(), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("acquiring connection"))?;
        insert_message(&mut conn, message)
            .await
            .map_err(db_error("enqueueing outbox message"))
    }

    async fn claim_batch(
        &self,
        limit: usize,
        max_attempts: i32,
        claimed_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError> {
        // rows held by a concurrent claim are skipped, not waited on
        let mut rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            UPDATE outbox SET claimed_until = $3
            WHERE id IN (
                SELECT id FROM outbox
                WHERE delivered_at IS NULL
                  AND attempts < $1
                  AND (claimed_until IS NULL OR claimed_until <= NOW())
                ORDER BY created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, recipient, kind, attempts, last_error, created_at, delivered_at,
                      claimed_until
            "#,
        )
        .bind(max_attempts)
        .bind(limit as i64)
        .bind(claimed_until)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("claiming outbox batch"))?;

        rows.sort_by_key(|row| row.created_at);
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_delivered(&self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("UPDATE outbox SET delivered_at = NOW(), claimed_until = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("marking outbox message delivered"))?;
        Ok(())
    }

    async fn mark_failed(&self, id: &Uuid, error: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET attempts = attempts + 1, last_error = $2, claimed_until = NULL
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(db_error("recording outbox failure"))?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: Uuid,
    recipient: String,
    kind: Json<NotificationKind>,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    claimed_until: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        OutboxMessage {
            id: row.id,
            recipient: row.recipient,
            kind: row.kind.0,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
            claimed_until: row.claimed_until,
        }
    }
}
