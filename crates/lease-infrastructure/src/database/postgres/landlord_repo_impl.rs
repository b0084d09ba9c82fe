//! PostgreSQL landlord repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{error, info};
use uuid::Uuid;

use lease_core::domain::{KycStatus, Landlord};
use lease_core::error::DomainError;
use lease_core::repositories::LandlordRepository;

use super::{db_error, is_unique_violation};

pub struct PgLandlordRepository {
    pool: PgPool,
}

impl PgLandlordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LandlordRepository for PgLandlordRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Landlord>, DomainError> {
        let row: Option<LandlordRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, kyc_status, identity_session_id,
                   kyc_data, last_kyc_update, created_at
            FROM landlords
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding landlord by id"))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError> {
        let row: Option<LandlordRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, kyc_status, identity_session_id,
                   kyc_data, last_kyc_update, created_at
            FROM landlords
            WHERE name = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding landlord by name"))?;

        Ok(row.map(Into::into))
    }

    async fn find_approved_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError> {
        let row: Option<LandlordRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, phone, kyc_status, identity_session_id,
                   kyc_data, last_kyc_update, created_at
            FROM landlords
            WHERE name = $1 AND kyc_status = 'approved'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding approved landlord by name"))?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, landlord: &Landlord) -> Result<Landlord, DomainError> {
        info!("Creating landlord: {}", landlord.email);

        let row: LandlordRow = sqlx::query_as(
            r#"
            INSERT INTO landlords (
                id, name, email, phone, kyc_status, identity_session_id,
                kyc_data, last_kyc_update, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, email, phone, kyc_status, identity_session_id,
                      kyc_data, last_kyc_update, created_at
            "#,
        )
        .bind(landlord.id)
        .bind(&landlord.name)
        .bind(&landlord.email)
        .bind(&landlord.phone)
        .bind(landlord.kyc_status.as_str())
        .bind(&landlord.identity_session_id)
        .bind(&landlord.kyc_data)
        .bind(landlord.last_kyc_update)
        .bind(landlord.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| {
            if is_unique_violation(&e) {
                DomainError::Validation(format!(
                    "An account with email {} already exists",
                    landlord.email
                ))
            } else {
                error!("Database error creating landlord: {}", e);
                DomainError::Database("failed creating landlord".to_string())
            }
        })?;

        Ok(row.into())
    }

    async fn update(&self, landlord: &Landlord) -> Result<Landlord, DomainError> {
        let row: Option<LandlordRow> = sqlx::query_as(
            r#"
            UPDATE landlords
            SET name = $2, email = $3, phone = $4, kyc_status = $5,
                identity_session_id = $6, kyc_data = $7, last_kyc_update = $8
            WHERE id = $1
            RETURNING id, name, email, phone, kyc_status, identity_session_id,
                      kyc_data, last_kyc_update, created_at
            "#,
        )
        .bind(landlord.id)
        .bind(&landlord.name)
        .bind(&landlord.email)
        .bind(&landlord.phone)
        .bind(landlord.kyc_status.as_str())
        .bind(&landlord.identity_session_id)
        .bind(&landlord.kyc_data)
        .bind(landlord.last_kyc_update)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("updating landlord"))?;

        row.map(Into::into)
            .ok_or_else(|| DomainError::NotFound(format!("landlord {}", landlord.id)))
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct LandlordRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    kyc_status: String,
    identity_session_id: Option<String>,
    kyc_data: Option<serde_json::Value>,
    last_kyc_update: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<LandlordRow> for Landlord {
    fn from(row: LandlordRow) -> Self {
        Landlord {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            kyc_status: KycStatus::from_str(&row.kyc_status).unwrap_or_default(),
            identity_session_id: row.identity_session_id,
            kyc_data: row.kyc_data,
            last_kyc_update: row.last_kyc_update,
            created_at: row.created_at,
        }
    }
}
