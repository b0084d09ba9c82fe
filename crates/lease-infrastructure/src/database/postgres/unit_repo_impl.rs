//! PostgreSQL unit repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use lease_core::domain::{
    Unit, UnitAddress, UnitStatus, UnitVerification, VerificationEvidence, VerificationStatus,
};
use lease_core::error::DomainError;
use lease_core::repositories::UnitRepository;

use super::db_error;

pub struct PgUnitRepository {
    pool: PgPool,
}

impl PgUnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Shared with contract promotion paths that create units in a transaction.
pub(crate) async fn insert_unit(conn: &mut PgConnection, unit: &Unit) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO units (
            id, landlord_id, unit_number, street, city, province, zip_code, country,
            verification_status, verification_evidence, status, archived_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(unit.id)
    .bind(unit.landlord_id)
    .bind(&unit.unit_number)
    .bind(&unit.address.street)
    .bind(&unit.address.city)
    .bind(&unit.address.province)
    .bind(&unit.address.zip_code)
    .bind(&unit.address.country)
    .bind(unit.verification_status().as_str())
    .bind(unit.verification.evidence().map(Json))
    .bind(unit.status.as_str())
    .bind(unit.archived_at)
    .bind(unit.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl UnitRepository for PgUnitRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Unit>, DomainError> {
        let row: Option<UnitRow> = sqlx::query_as(
            r#"
            SELECT id, landlord_id, unit_number, street, city, province, zip_code, country,
                   verification_status, verification_evidence, status, archived_at, created_at
            FROM units
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding unit by id"))?;

        Ok(row.map(Into::into))
    }

    async fn list_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            r#"
            SELECT id, landlord_id, unit_number, street, city, province, zip_code, country,
                   verification_status, verification_evidence, status, archived_at, created_at
            FROM units
            WHERE landlord_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("listing units"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            r#"
            SELECT id, landlord_id, unit_number, street, city, province, zip_code, country,
                   verification_status, verification_evidence, status, archived_at, created_at
            FROM units
            WHERE landlord_id = $1 AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("listing active units"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_unit_number(
        &self,
        landlord_id: &Uuid,
        unit_number: &str,
    ) -> Result<Option<Unit>, DomainError> {
        let row: Option<UnitRow> = sqlx::query_as(
            r#"
            SELECT id, landlord_id, unit_number, street, city, province, zip_code, country,
                   verification_status, verification_evidence, status, archived_at, created_at
            FROM units
            WHERE landlord_id = $1 AND unit_number = $2
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(landlord_id)
        .bind(unit_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding unit by number"))?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, unit: &Unit) -> Result<Unit, DomainError> {
        info!("Creating unit {} for landlord {}", unit.unit_number, unit.landlord_id);

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("acquiring connection"))?;
        insert_unit(&mut conn, unit)
            .await
            .map_err(db_error("creating unit"))?;

        Ok(unit.clone())
    }

    async fn update(&self, unit: &Unit) -> Result<Unit, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE units
            SET unit_number = $2, street = $3, city = $4, province = $5, zip_code = $6,
                country = $7, verification_status = $8, verification_evidence = $9,
                status = $10, archived_at = $11
            WHERE id = $1
            "#,
        )
        .bind(unit.id)
        .bind(&unit.unit_number)
        .bind(&unit.address.street)
        .bind(&unit.address.city)
        .bind(&unit.address.province)
        .bind(&unit.address.zip_code)
        .bind(&unit.address.country)
        .bind(unit.verification_status().as_str())
        .bind(unit.verification.evidence().map(Json))
        .bind(unit.status.as_str())
        .bind(unit.archived_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("updating unit"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("unit {}", unit.id)));
        }
        Ok(unit.clone())
    }
}

#[derive(Debug, FromRow)]
struct UnitRow {
    id: Uuid,
    landlord_id: Uuid,
    unit_number: String,
    street: String,
    city: String,
    province: String,
    zip_code: String,
    country: String,
    verification_status: String,
    verification_evidence: Option<Json<VerificationEvidence>>,
    status: String,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<UnitRow> for Unit {
    fn from(row: UnitRow) -> Self {
        let verification = match (
            VerificationStatus::from_str(&row.verification_status),
            row.verification_evidence,
        ) {
            (Some(VerificationStatus::VerifiedByAi), Some(Json(evidence))) => {
                UnitVerification::VerifiedByAi(evidence)
            }
            (Some(VerificationStatus::VerifiedByAi), None) => {
                warn!("Unit {} is marked verified without evidence", row.id);
                UnitVerification::Unverified
            }
            (Some(VerificationStatus::PendingScan), _) => UnitVerification::PendingScan,
            _ => UnitVerification::Unverified,
        };

        Unit {
            id: row.id,
            landlord_id: row.landlord_id,
            unit_number: row.unit_number,
            address: UnitAddress {
                street: row.street,
                city: row.city,
                province: row.province,
                zip_code: row.zip_code,
                country: row.country,
            },
            verification,
            status: UnitStatus::from_str(&row.status).unwrap_or_default(),
            archived_at: row.archived_at,
            created_at: row.created_at,
        }
    }
}
