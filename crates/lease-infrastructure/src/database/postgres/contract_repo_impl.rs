//! PostgreSQL contract repository.
//!
//! Pending and approved contracts live in separate tables, each with a unique
//! doc hash. Writes that must see both tables take a transaction-scoped
//! advisory lock on the hash so check-then-insert is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{error, info};
use uuid::Uuid;

use lease_core::domain::{
    ApprovedContract, BlobKey, ContractStatus, OutboxMessage, PendingAssignment,
    PendingContract, Unit,
};
use lease_core::error::DomainError;
use lease_core::hash::DocumentHash;
use lease_core::repositories::{ContractRepository, InsertOutcome, PromotionOutcome};

use super::db_error;
use super::outbox_repo_impl::insert_message;
use super::unit_repo_impl::insert_unit;

pub struct PgContractRepository {
    pool: PgPool,
}

impl PgContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_hash(conn: &mut PgConnection, doc_hash: &DocumentHash) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(doc_hash.to_hex())
        .execute(conn)
        .await?;
    Ok(())
}

/// Column values for a pending assignment.
struct AssignmentColumns {
    unit_status: &'static str,
    landlord_id: Option<Uuid>,
    unit_id: Option<Uuid>,
    unit_text: Option<String>,
    invitee_email: Option<String>,
}

impl From<&PendingContract> for AssignmentColumns {
    fn from(contract: &PendingContract) -> Self {
        let unit_status = contract.unit_status().as_str();
        match &contract.assignment {
            PendingAssignment::AwaitingLandlordRegistration {
                unit_text,
                invitee_email,
            } => Self {
                unit_status,
                landlord_id: None,
                unit_id: None,
                unit_text: Some(unit_text.clone()),
                invitee_email: invitee_email.clone(),
            },
            PendingAssignment::Unmatched {
                landlord_id,
                unit_text,
            } => Self {
                unit_status,
                landlord_id: Some(*landlord_id),
                unit_id: None,
                unit_text: Some(unit_text.clone()),
                invitee_email: None,
            },
            PendingAssignment::Matched {
                landlord_id,
                unit_id,
            } => Self {
                unit_status,
                landlord_id: Some(*landlord_id),
                unit_id: Some(*unit_id),
                unit_text: None,
                invitee_email: None,
            },
        }
    }
}

#[async_trait]
impl ContractRepository for PgContractRepository {
    async fn find_pending(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<PendingContract>, DomainError> {
        let row: Option<PendingRow> = sqlx::query_as(
            r#"
            SELECT id, doc_hash, fingerprint, tenant_email, contract_key, unit_status,
                   assigned_landlord_id, unit_id, unit_text, invitee_email, created_at
            FROM pending_contracts
            WHERE doc_hash = $1
            "#,
        )
        .bind(doc_hash.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding pending contract"))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_approved(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<ApprovedContract>, DomainError> {
        let row: Option<ApprovedRow> = sqlx::query_as(
            r#"
            SELECT id, doc_hash, fingerprint, landlord_id, unit_id, tenant_email, contract_key,
                   tx_hash, approved_at, status, terminated_at
            FROM approved_contracts
            WHERE doc_hash = $1
            "#,
        )
        .bind(doc_hash.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding approved contract"))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_pending(&self, contract: &PendingContract) -> Result<InsertOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("starting transaction"))?;
        lock_hash(&mut tx, &contract.doc_hash)
            .await
            .map_err(db_error("locking doc hash"))?;

        let approved: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM approved_contracts WHERE doc_hash = $1")
                .bind(contract.doc_hash.to_hex())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("checking approved contracts"))?;
        if approved.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        let columns = AssignmentColumns::from(contract);
        let result = sqlx::query(
            r#"
            INSERT INTO pending_contracts (
                id, doc_hash, fingerprint, tenant_email, contract_key, unit_status,
                assigned_landlord_id, unit_id, unit_text, invitee_email, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (doc_hash) DO NOTHING
            "#,
        )
        .bind(contract.id)
        .bind(contract.doc_hash.to_hex())
        .bind(&contract.fingerprint)
        .bind(&contract.tenant_email)
        .bind(contract.contract_key.as_str())
        .bind(columns.unit_status)
        .bind(columns.landlord_id)
        .bind(columns.unit_id)
        .bind(&columns.unit_text)
        .bind(&columns.invitee_email)
        .bind(contract.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("inserting pending contract"))?;

        tx.commit().await.map_err(db_error("committing pending contract"))?;

        if result.rows_affected() == 1 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }

    async fn list_pending_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<PendingContract>, DomainError> {
        let rows: Vec<PendingRow> = sqlx::query_as(
            r#"
            SELECT id, doc_hash, fingerprint, tenant_email, contract_key, unit_status,
                   assigned_landlord_id, unit_id, unit_text, invitee_email, created_at
            FROM pending_contracts
            WHERE assigned_landlord_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("listing pending contracts"))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_approved_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<ApprovedContract>, DomainError> {
        let rows: Vec<ApprovedRow> = sqlx::query_as(
            r#"
            SELECT id, doc_hash, fingerprint, landlord_id, unit_id, tenant_email, contract_key,
                   tx_hash, approved_at, status, terminated_at
            FROM approved_contracts
            WHERE landlord_id = $1
            ORDER BY approved_at
            "#,
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("listing approved contracts"))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn attach_new_unit(
        &self,
        contract: &PendingContract,
        unit: &Unit,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("starting transaction"))?;

        insert_unit(&mut tx, unit)
            .await
            .map_err(db_error("creating unit from contract"))?;

        let result = sqlx::query(
            r#"
            UPDATE pending_contracts
            SET unit_status = 'matched', unit_id = $2, unit_text = NULL
            WHERE id = $1 AND unit_status = 'unmatched'
            "#,
        )
        .bind(contract.id)
        .bind(unit.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("attaching unit to contract"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PreconditionFailed(
                "contract no longer awaits a unit".to_string(),
            ));
        }

        tx.commit().await.map_err(db_error("committing unit attachment"))?;
        info!("Unit {} attached to pending contract {}", unit.id, contract.doc_hash);
        Ok(())
    }

    async fn record_invitation(
        &self,
        contract: &PendingContract,
        message: &OutboxMessage,
    ) -> Result<(), DomainError> {
        let columns = AssignmentColumns::from(contract);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("starting transaction"))?;

        let result = sqlx::query(
            r#"
            UPDATE pending_contracts
            SET invitee_email = $2
            WHERE id = $1 AND unit_status = 'awaiting_landlord_registration'
            "#,
        )
        .bind(contract.id)
        .bind(&columns.invitee_email)
        .execute(&mut *tx)
        .await
        .map_err(db_error("recording invitee"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "pending contract {}",
                contract.doc_hash
            )));
        }

        insert_message(&mut tx, message)
            .await
            .map_err(db_error("queueing invitation"))?;
        tx.commit().await.map_err(db_error("committing invitation"))?;
        Ok(())
    }

    async fn promote(
        &self,
        pending_id: &Uuid,
        approved: &ApprovedContract,
        message: &OutboxMessage,
    ) -> Result<PromotionOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("starting transaction"))?;
        lock_hash(&mut tx, &approved.doc_hash)
            .await
            .map_err(db_error("locking doc hash"))?;

        let removed = sqlx::query("DELETE FROM pending_contracts WHERE id = $1")
            .bind(pending_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("removing pending contract"))?;
        if removed.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("pending contract {}", pending_id)));
        }

        // an identical submission of the corrected text is settled too
        sqlx::query("DELETE FROM pending_contracts WHERE doc_hash = $1")
            .bind(approved.doc_hash.to_hex())
            .execute(&mut *tx)
            .await
            .map_err(db_error("removing duplicate pending contract"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO approved_contracts (
                id, doc_hash, fingerprint, landlord_id, unit_id, tenant_email, contract_key,
                tx_hash, approved_at, status, terminated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (doc_hash) DO NOTHING
            "#,
        )
        .bind(approved.id)
        .bind(approved.doc_hash.to_hex())
        .bind(&approved.fingerprint)
        .bind(approved.landlord_id)
        .bind(approved.unit_id)
        .bind(&approved.tenant_email)
        .bind(approved.contract_key.as_str())
        .bind(&approved.tx_hash)
        .bind(approved.approved_at)
        .bind(approved.status.as_str())
        .bind(approved.terminated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("inserting approved contract"))?;

        let outcome = if inserted.rows_affected() == 0 {
            PromotionOutcome::AlreadyApproved
        } else {
            insert_message(&mut tx, message)
                .await
                .map_err(db_error("queueing approval notification"))?;
            PromotionOutcome::Promoted
        };

        tx.commit().await.map_err(|e| {
            error!("Commit of promotion {} failed: {}", approved.doc_hash, e);
            DomainError::Database("failed committing promotion".to_string())
        })?;
        Ok(outcome)
    }

    async fn update_approved(&self, contract: &ApprovedContract) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE approved_contracts
            SET status = $2, terminated_at = $3
            WHERE doc_hash = $1
            "#,
        )
        .bind(contract.doc_hash.to_hex())
        .bind(contract.status.as_str())
        .bind(contract.terminated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("updating approved contract"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "approved contract {}",
                contract.doc_hash
            )));
        }
        Ok(())
    }
}

// Internal row types for SQLx mapping
#[derive(Debug, FromRow)]
struct PendingRow {
    id: Uuid,
    doc_hash: String,
    fingerprint: String,
    tenant_email: String,
    contract_key: String,
    unit_status: String,
    assigned_landlord_id: Option<Uuid>,
    unit_id: Option<Uuid>,
    unit_text: Option<String>,
    invitee_email: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingContract {
    type Error = DomainError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            error!("Pending contract {} has inconsistent {}", row.id, what);
            DomainError::Database(format!("corrupt pending contract {}", row.id))
        };

        let assignment = match (row.unit_status.as_str(), row.assigned_landlord_id, row.unit_id) {
            ("matched", Some(landlord_id), Some(unit_id)) => PendingAssignment::Matched {
                landlord_id,
                unit_id,
            },
            ("unmatched", Some(landlord_id), None) => PendingAssignment::Unmatched {
                landlord_id,
                unit_text: row.unit_text.clone().unwrap_or_default(),
            },
            ("awaiting_landlord_registration", None, None) => {
                PendingAssignment::AwaitingLandlordRegistration {
                    unit_text: row.unit_text.clone().unwrap_or_default(),
                    invitee_email: row.invitee_email.clone(),
                }
            }
            _ => return Err(corrupt("assignment")),
        };
        let doc_hash: DocumentHash = row.doc_hash.parse().map_err(|_| corrupt("doc hash"))?;

        Ok(PendingContract {
            id: row.id,
            doc_hash,
            fingerprint: row.fingerprint,
            tenant_email: row.tenant_email,
            contract_key: BlobKey(row.contract_key),
            assignment,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ApprovedRow {
    id: Uuid,
    doc_hash: String,
    fingerprint: String,
    landlord_id: Uuid,
    unit_id: Uuid,
    tenant_email: String,
    contract_key: String,
    tx_hash: Option<String>,
    approved_at: DateTime<Utc>,
    status: String,
    terminated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApprovedRow> for ApprovedContract {
    type Error = DomainError;

    fn try_from(row: ApprovedRow) -> Result<Self, Self::Error> {
        let doc_hash: DocumentHash = row.doc_hash.parse().map_err(|_| {
            error!("Approved contract {} has an unparseable doc hash", row.id);
            DomainError::Database(format!("corrupt approved contract {}", row.id))
        })?;

        Ok(ApprovedContract {
            id: row.id,
            doc_hash,
            fingerprint: row.fingerprint,
            landlord_id: row.landlord_id,
            unit_id: row.unit_id,
            tenant_email: row.tenant_email,
            contract_key: BlobKey(row.contract_key),
            tx_hash: row.tx_hash,
            approved_at: row.approved_at,
            status: ContractStatus::from_str(&row.status).unwrap_or_default(),
            terminated_at: row.terminated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_columns_follow_status() {
        let landlord_id = Uuid::new_v4();
        let unit_id = Uuid::new_v4();
        let contract = PendingContract::new(
            "Landlord: A".into(),
            "t@example.com".into(),
            BlobKey("pending-contracts/a.pdf".into()),
            PendingAssignment::Matched { landlord_id, unit_id },
        );
        let columns = AssignmentColumns::from(&contract);
        assert_eq!(columns.unit_status, "matched");
        assert_eq!(columns.landlord_id, Some(landlord_id));
        assert_eq!(columns.unit_id, Some(unit_id));
        assert!(columns.unit_text.is_none());
    }

    #[test]
    fn test_pending_row_round_trip() {
        let row = PendingRow {
            id: Uuid::new_v4(),
            doc_hash: DocumentHash::of_text("x").to_hex(),
            fingerprint: "x".into(),
            tenant_email: "t@example.com".into(),
            contract_key: "pending-contracts/a.pdf".into(),
            unit_status: "awaiting_landlord_registration".into(),
            assigned_landlord_id: None,
            unit_id: None,
            unit_text: Some("Room 1".into()),
            invitee_email: Some("owner@example.com".into()),
            created_at: Utc::now(),
        };
        let contract = PendingContract::try_from(row).unwrap();
        assert_eq!(contract.doc_hash, DocumentHash::of_text("x"));
        assert!(matches!(
            contract.assignment,
            PendingAssignment::AwaitingLandlordRegistration { invitee_email: Some(_), .. }
        ));
    }

    #[test]
    fn test_inconsistent_row_is_rejected() {
        let row = PendingRow {
            id: Uuid::new_v4(),
            doc_hash: DocumentHash::of_text("x").to_hex(),
            fingerprint: "x".into(),
            tenant_email: "t@example.com".into(),
            contract_key: "k".into(),
            unit_status: "matched".into(),
            assigned_landlord_id: Some(Uuid::new_v4()),
            unit_id: None,
            unit_text: None,
            invitee_email: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            PendingContract::try_from(row),
            Err(DomainError::Database(_))
        ));
    }
}
