//! Store contracts for the registration core
//!
//! The durable store is the single consistency boundary: every invariant
//! (email uniqueness, at-most-once decisions, no orphan rows) is enforced
//! through these traits, never through in-process state. One trait per
//! component keeps collaborators narrow; `RegistryStore` aggregates them
//! for services that drive multi-component steps.
//!
//! Trait-based design allows mocking in tests.

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::db::schemas::{
    AddressDoc, ApplicationStatus, BusinessApplicationDoc, IdentityDoc, ManagerApplicationDoc,
    ProfileChanges, ProfileDoc, Role, Verdict,
};
use crate::types::Result;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Durable registry of login principals.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Insert a new identity. Fails with `DuplicateEmail` when the email
    /// is already registered, including when a concurrent insert wins.
    async fn insert_identity(&self, identity: IdentityDoc) -> Result<ObjectId>;

    async fn find_identity(&self, id: &ObjectId) -> Result<Option<IdentityDoc>>;

    /// Lookup by canonical (trimmed, lowercased) email.
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityDoc>>;

    /// Set the verification flag and, when given, the role. Reserved for
    /// the approval engine; fails with `UserNotFound` on a missing id.
    async fn promote_identity(&self, id: &ObjectId, verified: bool, role: Option<Role>) -> Result<()>;

    /// Update the contact phone. Fails with `UserNotFound` on a missing id.
    async fn set_identity_phone(&self, id: &ObjectId, phone: &str) -> Result<()>;

    /// Hard-delete an identity written earlier in a failed registration
    /// step. Compensation only; idempotent.
    async fn remove_identity(&self, id: &ObjectId) -> Result<()>;
}

/// Biographical profiles, attached 1:1 to identities.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn insert_profile(&self, profile: ProfileDoc) -> Result<ObjectId>;

    async fn find_profile_by_identity(&self, identity_id: &ObjectId) -> Result<Option<ProfileDoc>>;

    /// Apply a change set to the profile of `identity_id`. A replacement
    /// address must already be inserted and its id passed here; this
    /// method never writes address rows. Returns the updated profile, or
    /// `None` when the identity has no profile.
    async fn apply_profile_changes(
        &self,
        identity_id: &ObjectId,
        changes: &ProfileChanges,
        new_address_id: Option<ObjectId>,
    ) -> Result<Option<ProfileDoc>>;

    /// Compensation only; idempotent.
    async fn remove_profile_by_identity(&self, identity_id: &ObjectId) -> Result<()>;
}

/// Shared-by-reference postal addresses.
#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn insert_address(&self, address: AddressDoc) -> Result<ObjectId>;

    async fn find_address(&self, id: &ObjectId) -> Result<Option<AddressDoc>>;

    /// Compensation only. Normal address lifecycle never deletes: edits
    /// insert a new row and re-point the referrer.
    async fn remove_address(&self, id: &ObjectId) -> Result<()>;
}

/// Business applications awaiting admin disposition.
#[async_trait]
pub trait ApplicationQueue: Send + Sync {
    async fn insert_application(&self, application: BusinessApplicationDoc) -> Result<ObjectId>;

    async fn find_application(&self, id: &ObjectId) -> Result<Option<BusinessApplicationDoc>>;

    async fn applications_for_owner(
        &self,
        owner_identity_id: &ObjectId,
    ) -> Result<Vec<BusinessApplicationDoc>>;

    async fn pending_applications(&self) -> Result<Vec<BusinessApplicationDoc>>;

    /// Compare-and-swap decision: atomically move the application out of
    /// `Pending`, stamping verdict, decider and decision time. Returns
    /// the decided document, or `None` when no pending application
    /// matched the id - absent or already decided; the caller
    /// distinguishes the two.
    async fn decide_application(
        &self,
        id: &ObjectId,
        verdict: &Verdict,
        decided_by: &ObjectId,
    ) -> Result<Option<BusinessApplicationDoc>>;
}

/// Manager-to-business links.
#[async_trait]
pub trait ManagerLinker: Send + Sync {
    async fn insert_manager_application(&self, application: ManagerApplicationDoc) -> Result<ObjectId>;

    async fn find_manager_application(&self, id: &ObjectId) -> Result<Option<ManagerApplicationDoc>>;

    async fn manager_applications_for(
        &self,
        linked_application_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>>;

    /// Approved links for a manager identity - its business memberships.
    async fn approved_links_for_identity(
        &self,
        manager_identity_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>>;

    /// Same compare-and-swap contract as `decide_application`. `status`
    /// must be a decided state; passing `Pending` is a validation error.
    async fn decide_manager_application(
        &self,
        id: &ObjectId,
        status: ApplicationStatus,
        decided_by: &ObjectId,
    ) -> Result<Option<ManagerApplicationDoc>>;
}

/// Everything the orchestrating services need from the store.
///
/// Blanket-implemented for any type carrying all five component traits,
/// so `MongoStore`, `MemoryStore` and test doubles qualify without
/// further ceremony.
pub trait RegistryStore:
    IdentityRegistry + ProfileStore + AddressBook + ApplicationQueue + ManagerLinker
{
}

impl<T> RegistryStore for T where
    T: IdentityRegistry + ProfileStore + AddressBook + ApplicationQueue + ManagerLinker
{
}
