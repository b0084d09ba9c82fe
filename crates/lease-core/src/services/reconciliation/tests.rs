use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::*;
use crate::domain::{
    BlobKey, DeedData, KycStatus, NotificationKind, PendingAssignment, UnitMatchStatus,
    UtilityBillData, VerificationStatus,
};
use crate::providers::{
    CommitReceipt, InMemoryLedger, LedgerRecord, MockDocumentIntelligence,
};
use crate::repositories::{
    ContractRepository, InMemoryRegistry, LandlordRepository, UnitRepository,
};

const LANDLORD: &str = "Somchai Jaidee";
const DEED_ADDRESS: &str = "5 Main Street, Bangkok 10110";

/// Blob store that records every put.
#[derive(Default)]
struct RecordingStorage {
    keys: Mutex<Vec<String>>,
}

impl RecordingStorage {
    fn folders(&self) -> Vec<String> {
        self.keys
            .lock()
            .iter()
            .filter_map(|k| k.split('/').next().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl BlobStorage for RecordingStorage {
    async fn put(&self, folder: &str, document: &UploadedDocument) -> Result<BlobKey, DomainError> {
        let key = format!("{}/{}.{}", folder, Uuid::new_v4(), document.extension());
        self.keys.lock().push(key.clone());
        Ok(BlobKey(key))
    }

    async fn read_url(&self, key: &BlobKey, ttl: Duration) -> Result<String, DomainError> {
        Ok(format!("https://files.test/{}?ttl={}", key, ttl.as_secs()))
    }
}

/// Ledger that never answers.
struct StalledLedger;

#[async_trait]
impl LedgerGateway for StalledLedger {
    async fn commit(&self, _record: &LedgerRecord) -> Result<CommitReceipt, DomainError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(CommitReceipt::AlreadyRecorded)
    }

    async fn lookup(&self, _doc_hash: &DocumentHash) -> Result<Option<LedgerEntry>, DomainError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }
}

/// Ledger that answers after a delay, so overlapping approvals both reach it.
struct SlowLedger(Arc<InMemoryLedger>);

#[async_trait]
impl LedgerGateway for SlowLedger {
    async fn commit(&self, record: &LedgerRecord) -> Result<CommitReceipt, DomainError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.0.commit(record).await
    }

    async fn lookup(&self, doc_hash: &DocumentHash) -> Result<Option<LedgerEntry>, DomainError> {
        self.0.lookup(doc_hash).await
    }
}

struct Harness {
    engine: Arc<ReconciliationEngine>,
    registry: Arc<InMemoryRegistry>,
    ledger: Arc<InMemoryLedger>,
    storage: Arc<RecordingStorage>,
}

impl Harness {
    fn new(ai: MockDocumentIntelligence) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        Self::build(ai, ledger.clone(), ledger)
    }

    fn with_ledger(ai: MockDocumentIntelligence, ledger: Arc<dyn LedgerGateway>) -> Self {
        Self::build(ai, ledger, Arc::new(InMemoryLedger::new()))
    }

    fn build(
        ai: MockDocumentIntelligence,
        gateway: Arc<dyn LedgerGateway>,
        ledger: Arc<InMemoryLedger>,
    ) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let storage = Arc::new(RecordingStorage::default());
        let config = EngineConfig {
            ledger_timeout: Duration::from_secs(5),
            public_base_url: "https://lease.test".to_string(),
            ..EngineConfig::default()
        };
        let engine = ReconciliationEngine::new(
            Registry::from_backend(registry.clone()),
            Arc::new(ai),
            gateway,
            storage.clone(),
            config,
        );
        Self {
            engine: Arc::new(engine),
            registry,
            ledger,
            storage,
        }
    }

    async fn landlord(&self, name: &str, kyc: KycStatus) -> Landlord {
        let mut landlord = Landlord::new(name, format!("{}@example.com", Uuid::new_v4()));
        landlord.kyc_status = kyc;
        LandlordRepository::create(&*self.registry, &landlord).await.unwrap()
    }

    async fn unit(&self, landlord_id: Uuid, number: &str, verified: bool) -> Unit {
        let mut unit = Unit::new(landlord_id, number, address("Main Street"));
        if verified {
            unit.mark_verified(crate::domain::VerificationEvidence {
                title_deed_key: BlobKey("verified-title-deeds/seed.png".into()),
                utility_bill_key: BlobKey("verified-utility-bills/seed.png".into()),
                deed: DeedData {
                    owner_name: LANDLORD.into(),
                    property_address: DEED_ADDRESS.into(),
                },
                bill: UtilityBillData {
                    name_on_bill: LANDLORD.into(),
                    address_on_bill: DEED_ADDRESS.into(),
                },
                authenticity_score: 99.0,
                verified_at: chrono::Utc::now(),
            });
        }
        UnitRepository::create(&*self.registry, &unit).await.unwrap()
    }

    async fn pending(&self, doc_hash: &DocumentHash) -> Option<PendingContract> {
        self.registry.find_pending(doc_hash).await.unwrap()
    }
}

fn address(street: &str) -> UnitAddress {
    UnitAddress {
        street: street.into(),
        city: "Bangkok".into(),
        province: "Bangkok".into(),
        zip_code: "10110".into(),
        country: "Thailand".into(),
    }
}

fn fingerprint(landlord: &str, unit: &str) -> String {
    format!(
        "Landlord: {} | Tenant: Jane Doe | Unit: {} | From: 01/01/2025 | To: 31/12/2025 | Rent: 15000",
        landlord, unit
    )
}

fn upload(name: &str) -> UploadedDocument {
    UploadedDocument::new(vec![1, 2, 3], "image/png", name)
}

fn ownership() -> OwnershipDocuments {
    OwnershipDocuments::from_uploads(Some(upload("deed.png")), Some(upload("bill.png"))).unwrap()
}

/// Contract scans keyed by file name.
fn scans(ai: &mut MockDocumentIntelligence, texts: &[(&str, String)]) {
    let texts: HashMap<String, String> = texts
        .iter()
        .map(|(file, text)| (file.to_string(), text.clone()))
        .collect();
    ai.expect_extract_fingerprint().returning(move |doc| {
        texts
            .get(&doc.file_name)
            .cloned()
            .ok_or_else(|| DomainError::Extraction("unreadable".into()))
    });
}

/// Deed and bill readings; addresses containing "Wrong" never match.
fn ownership_scan(ai: &mut MockDocumentIntelligence, score: f64, deed_name: &str, bill_name: &str) {
    let deed_name = deed_name.to_string();
    let bill_name = bill_name.to_string();
    ai.expect_check_authenticity().returning(move |_| score);
    ai.expect_extract_deed_data().returning(move |_| {
        Ok(DeedData {
            owner_name: deed_name.clone(),
            property_address: DEED_ADDRESS.into(),
        })
    });
    ai.expect_extract_utility_bill_data().returning(move |_| {
        Ok(UtilityBillData {
            name_on_bill: bill_name.clone(),
            address_on_bill: "5 Main St., Bangkok".into(),
        })
    });
    ai.expect_compare_addresses()
        .returning(|a, b| !a.contains("Wrong") && !b.contains("Wrong"));
}

fn match_first(ai: &mut MockDocumentIntelligence) {
    ai.expect_find_best_unit_match()
        .returning(|_, candidates| candidates.first().map(|c| c.id));
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint("Nobody Known", "Room 1"))]);
    ai.expect_find_best_unit_match().times(0);
    let h = Harness::new(ai);

    let first = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert!(matches!(first, InitiationOutcome::AwaitingLandlordRegistration { .. }));
    assert!(first.is_new());

    let second = h.engine.initiate_contract(&upload("lease.pdf"), "Jane@Example.com").await.unwrap();
    assert_eq!(
        second,
        InitiationOutcome::AlreadyPending {
            doc_hash: *first.doc_hash()
        }
    );
    assert_eq!(h.registry.pending_count(), 1);
}

#[tokio::test]
async fn test_concurrent_submissions_create_one_record() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint("Nobody Known", "Room 1"))]);
    let h = Harness::new(ai);

    let first = upload("lease.pdf");
    let second = upload("lease.pdf");
    let (a, b) = tokio::join!(
        h.engine.initiate_contract(&first, "jane@example.com"),
        h.engine.initiate_contract(&second, "jane@example.com"),
    );
    let new_records = [a.unwrap(), b.unwrap()].iter().filter(|o| o.is_new()).count();
    assert_eq!(new_records, 1);
    assert_eq!(h.registry.pending_count(), 1);
}

#[tokio::test]
async fn test_initiation_rejects_bad_input() {
    let mut ai = MockDocumentIntelligence::new();
    ai.expect_extract_fingerprint().returning(|_| Ok("   ".to_string()));
    let h = Harness::new(ai);

    assert!(matches!(
        h.engine.initiate_contract(&UploadedDocument::new(vec![], "application/pdf", "x.pdf"), "jane@example.com").await,
        Err(DomainError::PreconditionFailed(_))
    ));
    assert!(matches!(
        h.engine.initiate_contract(&upload("x.pdf"), "not-an-email").await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        h.engine.initiate_contract(&upload("x.pdf"), "jane@example.com").await,
        Err(DomainError::Extraction(_))
    ));
    assert_eq!(h.registry.pending_count(), 0);
}

#[tokio::test]
async fn test_unregistered_or_unapproved_landlord_waits_for_registration() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    ai.expect_find_best_unit_match().times(0);
    let h = Harness::new(ai);
    h.landlord(LANDLORD, KycStatus::Pending).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let pending = h.pending(outcome.doc_hash()).await.unwrap();
    assert_eq!(pending.unit_status(), UnitMatchStatus::AwaitingLandlordRegistration);
    assert_eq!(h.storage.folders(), vec!["pending-contracts"]);
}

#[tokio::test]
async fn test_matched_verified_unit_is_ready_for_approval() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "Unit 5, Main St"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert_eq!(
        outcome,
        InitiationOutcome::PendingReadyForApproval {
            doc_hash: DocumentHash::of_text(&fingerprint(LANDLORD, "Unit 5, Main St")),
            landlord_id: landlord.id,
            unit_id: unit.id,
        }
    );
}

#[tokio::test]
async fn test_archived_units_are_not_candidates() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    ai.expect_find_best_unit_match().times(0);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", true).await;
    h.engine.archive_unit(landlord.id, unit.id).await.unwrap();

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert!(matches!(outcome, InitiationOutcome::PendingUnmatchedUnit { .. }));
}

#[tokio::test]
async fn test_unmatched_unit_flow_through_approval() {
    let mut ai = MockDocumentIntelligence::new();
    let text = fingerprint(LANDLORD, "Room 12B, Sathorn Road, Bangkok");
    scans(&mut ai, &[("lease.pdf", text.clone())]);
    // answer outside the candidate set
    ai.expect_find_best_unit_match()
        .returning(|_, _| Some(Uuid::new_v4()));
    ownership_scan(&mut ai, 92.0, LANDLORD, LANDLORD);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "279/19", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert_eq!(
        outcome,
        InitiationOutcome::PendingUnmatchedUnit {
            doc_hash: DocumentHash::of_text(&text),
            landlord_id: landlord.id,
        }
    );
    let doc_hash = *outcome.doc_hash();

    // approval needs a unit first
    assert!(matches!(
        h.engine.approve_contract(landlord.id, &doc_hash).await,
        Err(DomainError::PreconditionFailed(_))
    ));

    let unit = h.engine.approve_and_create_unit(landlord.id, &doc_hash).await.unwrap();
    assert_eq!(unit.unit_number, "Room 12B");
    assert_eq!(unit.verification_status(), VerificationStatus::PendingScan);
    assert_eq!(h.pending(&doc_hash).await.unwrap().unit_id(), Some(unit.id));

    // still blocked until ownership is verified
    assert!(matches!(
        h.engine.approve_contract(landlord.id, &doc_hash).await,
        Err(DomainError::PreconditionFailed(_))
    ));

    let verified = h.engine.verify_unit(landlord.id, unit.id, ownership()).await.unwrap();
    assert!(verified.is_verified());
    // auto-created units keep their contract-derived address
    assert!(verified.address.street.starts_with("Details from contract: "));

    let receipt = h.engine.approve_contract(landlord.id, &doc_hash).await.unwrap();
    assert!(receipt.tx_hash.is_some());
    assert_eq!(h.registry.pending_count(), 0);
    assert_eq!(h.registry.approved_count(), 1);
}

#[tokio::test]
async fn test_create_unit_requires_unmatched_contract() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", false).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert!(matches!(outcome, InitiationOutcome::PendingAwaitingUnitVerification { .. }));
    assert!(matches!(
        h.engine.approve_and_create_unit(landlord.id, outcome.doc_hash()).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_variant_unit_text_converges_on_one_hash() {
    let mut ai = MockDocumentIntelligence::new();
    scans(
        &mut ai,
        &[
            ("a.pdf", fingerprint(LANDLORD, "Unit 5, Main St")),
            ("b.pdf", fingerprint(LANDLORD, "5 Main Street")),
        ],
    );
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", true).await;

    let a = h.engine.initiate_contract(&upload("a.pdf"), "jane@example.com").await.unwrap();
    let b = h.engine.initiate_contract(&upload("b.pdf"), "jane@example.com").await.unwrap();
    assert_ne!(a.doc_hash(), b.doc_hash());

    let first = h.engine.approve_contract(landlord.id, a.doc_hash()).await.unwrap();
    let second = h.engine.approve_contract(landlord.id, b.doc_hash()).await.unwrap();

    let expected = DocumentHash::of_text(&format!(
        "Landlord: {} | Tenant: Jane Doe | Unit: 5, Main Street, Bangkok | From: 01/01/2025 | To: 31/12/2025 | Rent: 15000",
        LANDLORD
    ));
    assert_eq!(first.doc_hash, expected);
    assert_eq!(second.doc_hash, expected);
    assert_eq!(unit.official_unit_info(), "5, Main Street, Bangkok");
    assert_eq!(first.outcome, PromotionOutcome::Promoted);
    assert_eq!(second.outcome, PromotionOutcome::AlreadyApproved);
    assert!(second.tx_hash.is_none());

    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.registry.approved_count(), 1);
    assert_eq!(h.registry.pending_count(), 0);

    let outbox = h.registry.outbox();
    assert_eq!(outbox.len(), 1);
    assert!(matches!(
        &outbox[0].kind,
        NotificationKind::ContractApproved { share_url, .. } if share_url == &format!("https://lease.test/verify/{}", expected)
    ));
}

#[tokio::test]
async fn test_overlapping_approvals_of_one_contract_both_succeed() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "Unit 5, Main St"))]);
    match_first(&mut ai);
    let ledger = Arc::new(InMemoryLedger::new());
    let h = Harness::build(ai, Arc::new(SlowLedger(ledger.clone())), ledger);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let (a, b) = tokio::join!(
        h.engine.approve_contract(landlord.id, outcome.doc_hash()),
        h.engine.approve_contract(landlord.id, outcome.doc_hash()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.doc_hash, b.doc_hash);
    assert_eq!(a.tx_hash, b.tx_hash);
    assert!(a.tx_hash.is_some());
    let mut outcomes = [a.outcome, b.outcome];
    outcomes.sort_by_key(|o| *o == PromotionOutcome::AlreadyApproved);
    assert_eq!(outcomes, [PromotionOutcome::Promoted, PromotionOutcome::AlreadyApproved]);

    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.registry.approved_count(), 1);
    assert_eq!(h.registry.outbox().len(), 1);
}

#[tokio::test]
async fn test_approval_rejects_other_landlords_and_unverified_units() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let other = h.landlord("Someone Else", KycStatus::Approved).await;
    h.unit(landlord.id, "5", false).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let doc_hash = *outcome.doc_hash();

    assert!(matches!(
        h.engine.approve_contract(other.id, &doc_hash).await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.approve_contract(landlord.id, &doc_hash).await,
        Err(DomainError::PreconditionFailed(_))
    ));
    assert!(h.pending(&doc_hash).await.is_some());
    assert!(h.ledger.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ledger_timeout_leaves_pending_intact() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::with_ledger(ai, Arc::new(StalledLedger));
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let result = h.engine.approve_contract(landlord.id, outcome.doc_hash()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, DomainError::LedgerUnavailable(_)));
    assert!(err.is_retryable());
    assert!(h.pending(outcome.doc_hash()).await.is_some());
    assert_eq!(h.registry.approved_count(), 0);
    assert!(h.registry.outbox().is_empty());
}

#[tokio::test]
async fn test_name_gate_rejects_abbreviation() {
    let mut ai = MockDocumentIntelligence::new();
    ownership_scan(&mut ai, 97.0, "Somchai J.", LANDLORD);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", false).await;

    let err = h.engine.verify_unit(landlord.id, unit.id, ownership()).await.unwrap_err();
    match err {
        DomainError::OwnershipMismatch { deed, bill, .. } => {
            assert_eq!(deed, "Somchai J.");
            assert_eq!(bill, LANDLORD);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let stored = UnitRepository::find_by_id(&*h.registry, &unit.id).await.unwrap().unwrap();
    assert!(!stored.is_verified());
    assert!(h.storage.folders().is_empty());
}

#[tokio::test]
async fn test_name_gate_ignores_case() {
    let mut ai = MockDocumentIntelligence::new();
    ownership_scan(&mut ai, 97.0, "SOMCHAI JAIDEE", "somchai jaidee");
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", false).await;

    let verified = h.engine.verify_unit(landlord.id, unit.id, ownership()).await.unwrap();
    let evidence = verified.verification.evidence().unwrap();
    assert_eq!(evidence.authenticity_score, 97.0);
    assert!(evidence.title_deed_key.as_str().starts_with("verified-title-deeds/"));
    assert!(evidence.utility_bill_key.as_str().starts_with("verified-utility-bills/"));
}

#[tokio::test]
async fn test_authenticity_threshold_is_inclusive() {
    let mut ai = MockDocumentIntelligence::new();
    ownership_scan(&mut ai, 85.0, LANDLORD, LANDLORD);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", false).await;
    assert!(h.engine.verify_unit(landlord.id, unit.id, ownership()).await.is_ok());
}

#[tokio::test]
async fn test_authenticity_below_threshold_stops_before_extraction() {
    let mut ai = MockDocumentIntelligence::new();
    ai.expect_check_authenticity().returning(|_| 84.999);
    ai.expect_extract_deed_data().times(0);
    ai.expect_extract_utility_bill_data().times(0);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", false).await;

    assert!(matches!(
        h.engine.verify_unit(landlord.id, unit.id, ownership()).await,
        Err(DomainError::AuthenticityTooLow(score)) if score == 84.999
    ));
}

#[tokio::test]
async fn test_deed_and_bill_must_share_address() {
    let mut ai = MockDocumentIntelligence::new();
    ai.expect_check_authenticity().returning(|_| 99.0);
    ai.expect_extract_deed_data().returning(|_| {
        Ok(DeedData {
            owner_name: LANDLORD.into(),
            property_address: DEED_ADDRESS.into(),
        })
    });
    ai.expect_extract_utility_bill_data().returning(|_| {
        Ok(UtilityBillData {
            name_on_bill: LANDLORD.into(),
            address_on_bill: "9 Wrong Road, Chiang Mai".into(),
        })
    });
    ai.expect_compare_addresses()
        .returning(|a, b| !a.contains("Wrong") && !b.contains("Wrong"));
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", false).await;

    assert!(matches!(
        h.engine.verify_unit(landlord.id, unit.id, ownership()).await,
        Err(DomainError::AddressMismatch(_))
    ));
}

#[tokio::test]
async fn test_unit_verification_requires_kyc_and_ownership() {
    let mut ai = MockDocumentIntelligence::new();
    ai.expect_check_authenticity().times(0);
    let h = Harness::new(ai);
    let pending_kyc = h.landlord("Pending Person", KycStatus::Pending).await;
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let own_unit = h.unit(pending_kyc.id, "1", false).await;
    let foreign_unit = h.unit(pending_kyc.id, "2", false).await;

    assert!(matches!(
        h.engine.verify_unit(pending_kyc.id, own_unit.id, ownership()).await,
        Err(DomainError::PreconditionFailed(_))
    ));
    assert!(matches!(
        h.engine.verify_unit(landlord.id, foreign_unit.id, ownership()).await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        OwnershipDocuments::from_uploads(Some(upload("deed.png")), None),
        Err(DomainError::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn test_register_unit_asks_for_address_confirmation() {
    let mut ai = MockDocumentIntelligence::new();
    ownership_scan(&mut ai, 95.0, LANDLORD, LANDLORD);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let new_unit = NewUnit {
        unit_number: "5".into(),
        address: address("Wrong Road"),
    };

    let outcome = h
        .engine
        .register_unit(landlord.id, new_unit.clone(), ownership(), false)
        .await
        .unwrap();
    match outcome {
        UnitVerificationOutcome::NeedsAddressConfirmation {
            user_input_address,
            ai_suggested_address,
        } => {
            assert_eq!(user_input_address, "5, Wrong Road, Bangkok, Bangkok, 10110, Thailand");
            assert_eq!(ai_suggested_address, DEED_ADDRESS);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(UnitRepository::list_by_landlord(&*h.registry, &landlord.id).await.unwrap().is_empty());

    let outcome = h
        .engine
        .register_unit(landlord.id, new_unit, ownership(), true)
        .await
        .unwrap();
    let UnitVerificationOutcome::Verified(unit) = outcome else {
        panic!("confirmed registration should verify");
    };
    assert!(unit.is_verified());
    assert_eq!(unit.address.street, "Wrong Road");
}

#[tokio::test]
async fn test_public_verification_states() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    assert!(matches!(
        h.engine.public_verify(&DocumentHash::of_text("unknown")).await,
        Err(DomainError::NotFound(_))
    ));

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let receipt = h.engine.approve_contract(landlord.id, outcome.doc_hash()).await.unwrap();

    let report = h.engine.public_verify(&receipt.doc_hash).await.unwrap();
    assert_eq!(report.contract_status, ContractStatus::Active);
    assert_eq!(report.tx_hash, receipt.tx_hash);
    assert_eq!(report.entry.unit_info, "5, Main Street, Bangkok");
    assert!(report.document_url.unwrap().contains("pending-contracts/"));
    assert!(report.fingerprint.is_some());

    h.engine.terminate_contract(landlord.id, &receipt.doc_hash).await.unwrap();
    let report = h.engine.public_verify(&receipt.doc_hash).await.unwrap();
    assert_eq!(report.contract_status, ContractStatus::Terminated);
    assert!(report.fingerprint.is_some());

    // off-chain record lost: ledger entry still answers
    h.registry.forget_approved(&receipt.doc_hash);
    let report = h.engine.public_verify(&receipt.doc_hash).await.unwrap();
    assert_eq!(report.contract_status, ContractStatus::Terminated);
    assert!(report.document_url.is_none());
    assert!(report.fingerprint.is_none());
    assert!(report.tx_hash.is_none());
    assert_eq!(report.entry.tenant_name, "Jane Doe");
}

#[tokio::test]
async fn test_terminate_requires_owner() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let other = h.landlord("Someone Else", KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let receipt = h.engine.approve_contract(landlord.id, outcome.doc_hash()).await.unwrap();

    assert!(matches!(
        h.engine.terminate_contract(other.id, &receipt.doc_hash).await,
        Err(DomainError::NotFound(_))
    ));
    let terminated = h.engine.terminate_contract(landlord.id, &receipt.doc_hash).await.unwrap();
    assert_eq!(terminated.status, ContractStatus::Terminated);
    let again = h.engine.terminate_contract(landlord.id, &receipt.doc_hash).await.unwrap();
    assert_eq!(again.terminated_at, terminated.terminated_at);
}

#[tokio::test]
async fn test_uploaded_copy_verifies_against_corrected_hash() {
    let mut ai = MockDocumentIntelligence::new();
    scans(
        &mut ai,
        &[
            ("lease.pdf", fingerprint(LANDLORD, "5, Main St")),
            ("forged.pdf", fingerprint("Unknown Owner", "5, Main St")),
            ("other-unit.pdf", fingerprint(LANDLORD, "7, Main St")),
        ],
    );
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    let outcome = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    let receipt = h.engine.approve_contract(landlord.id, outcome.doc_hash()).await.unwrap();

    let check = h.engine.verify_uploaded_document(&upload("lease.pdf")).await.unwrap();
    assert!(check.verified);
    assert_eq!(check.doc_hash, Some(receipt.doc_hash));
    assert_eq!(check.entry.unwrap().landlord_name, LANDLORD);

    let check = h.engine.verify_uploaded_document(&upload("forged.pdf")).await.unwrap();
    assert!(!check.verified);
    assert_eq!(check.fingerprint, fingerprint("Unknown Owner", "5, Main St"));

    let check = h.engine.verify_uploaded_document(&upload("other-unit.pdf")).await.unwrap();
    assert!(!check.verified);
}

#[tokio::test]
async fn test_invitation_only_for_unregistered_landlords() {
    let mut ai = MockDocumentIntelligence::new();
    scans(
        &mut ai,
        &[
            ("orphan.pdf", fingerprint("New Owner", "3, River Road")),
            ("lease.pdf", fingerprint(LANDLORD, "5, Main Street")),
        ],
    );
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;

    let orphan = h.engine.initiate_contract(&upload("orphan.pdf"), "jane@example.com").await.unwrap();
    h.engine
        .send_invitation(orphan.doc_hash(), "Owner@Example.com")
        .await
        .unwrap();

    let outbox = h.registry.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].recipient, "owner@example.com");
    assert!(matches!(
        &outbox[0].kind,
        NotificationKind::LandlordInvitation { login_url, .. } if login_url == "https://lease.test/login"
    ));
    let pending = h.pending(orphan.doc_hash()).await.unwrap();
    assert!(matches!(
        pending.assignment,
        PendingAssignment::AwaitingLandlordRegistration { invitee_email: Some(ref e), .. } if e == "owner@example.com"
    ));

    let assigned = h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();
    assert!(matches!(
        h.engine.send_invitation(assigned.doc_hash(), "owner@example.com").await,
        Err(DomainError::PreconditionFailed(_))
    ));
    assert!(matches!(
        h.engine.send_invitation(&DocumentHash::of_text("missing"), "owner@example.com").await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dashboard_lists_units_and_contracts() {
    let mut ai = MockDocumentIntelligence::new();
    scans(&mut ai, &[("lease.pdf", fingerprint(LANDLORD, "5, Main Street"))]);
    match_first(&mut ai);
    let h = Harness::new(ai);
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    h.unit(landlord.id, "5", true).await;
    h.unit(landlord.id, "6", false).await;
    h.engine.initiate_contract(&upload("lease.pdf"), "jane@example.com").await.unwrap();

    let dashboard = h.engine.landlord_dashboard(landlord.id).await.unwrap();
    assert_eq!(dashboard.units.len(), 2);
    assert_eq!(dashboard.pending.len(), 1);
    assert!(dashboard.approved.is_empty());
    let verified = dashboard.units.iter().find(|v| v.unit.unit_number == "5").unwrap();
    assert!(verified.title_deed_url.is_some());
    let unverified = dashboard.units.iter().find(|v| v.unit.unit_number == "6").unwrap();
    assert!(unverified.title_deed_url.is_none());

    let key = dashboard.pending[0].contract_key.clone();
    assert!(h.engine.document_url(landlord.id, &key).await.is_ok());
    let stranger = h.landlord("Someone Else", KycStatus::Approved).await;
    assert!(matches!(
        h.engine.document_url(stranger.id, &key).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_archive_and_restore_unit() {
    let h = Harness::new(MockDocumentIntelligence::new());
    let landlord = h.landlord(LANDLORD, KycStatus::Approved).await;
    let other = h.landlord("Someone Else", KycStatus::Approved).await;
    let unit = h.unit(landlord.id, "5", true).await;

    assert!(matches!(
        h.engine.archive_unit(other.id, unit.id).await,
        Err(DomainError::NotFound(_))
    ));
    let archived = h.engine.archive_unit(landlord.id, unit.id).await.unwrap();
    assert!(!archived.is_active());
    let restored = h.engine.restore_unit(landlord.id, unit.id).await.unwrap();
    assert!(restored.is_active());
}
