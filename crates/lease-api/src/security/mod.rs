pub mod header_validator;
pub mod middleware;

pub use header_validator::{ServiceHeaderValidator, ValidatedRequest};
pub use middleware::{security_middleware, CurrentLandlord};
