//! Domain entities for the lease registry.

pub mod contract;
pub mod document;
pub mod landlord;
pub mod notification;
pub mod unit;

pub use contract::{
    ApprovedContract, ContractStatus, PendingAssignment, PendingContract, UnitMatchStatus,
};
pub use document::{BlobKey, UploadedDocument};
pub use landlord::{KycStatus, Landlord};
pub use notification::{NotificationKind, OutboxMessage};
pub use unit::{
    DeedData, Unit, UnitAddress, UnitStatus, UnitVerification, UtilityBillData,
    VerificationEvidence, VerificationStatus,
};
