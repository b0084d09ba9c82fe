//! Application services

pub mod identity_service;
pub mod outbox;
pub mod reconciliation;

pub use identity_service::{CallbackOutcome, IdentityService};
pub use outbox::{DrainReport, EmailTemplates, OutboxDispatcher, RenderedEmail};
pub use reconciliation::{
    ApprovalReceipt, DocumentCheck, EngineConfig, InitiationOutcome, LandlordDashboard, NewUnit,
    OwnershipDocuments, PublicVerification, ReconciliationEngine, UnitVerificationOutcome,
    UnitView,
};
