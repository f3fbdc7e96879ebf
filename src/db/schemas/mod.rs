//! Document schemas for the registrar collections

pub mod address;
pub mod business_application;
pub mod identity;
pub mod manager_application;
pub mod metadata;
pub mod profile;

pub use address::{AddressDoc, AddressInput, ADDRESS_COLLECTION};
pub use business_application::{
    ApplicationStatus, BusinessApplicationDoc, Verdict, BUSINESS_APPLICATION_COLLECTION,
};
pub use identity::{normalize_email, ApprovedRole, IdentityDoc, Role, IDENTITY_COLLECTION};
pub use manager_application::{ManagerApplicationDoc, MANAGER_APPLICATION_COLLECTION};
pub use metadata::Metadata;
pub use profile::{ProfileChanges, ProfileDoc, ProfileKind, PROFILE_COLLECTION};
