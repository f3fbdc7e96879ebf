//! In-memory store for testing/local development
//!
//! Single `RwLock` over all five maps, so every check-and-set runs under
//! one write lock and observes the same guarantees the MongoDB unique
//! index and conditional updates provide.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::schemas::{
    AddressDoc, ApplicationStatus, BusinessApplicationDoc, IdentityDoc, ManagerApplicationDoc,
    ProfileChanges, ProfileDoc, Role, Verdict,
};
use crate::store::{AddressBook, ApplicationQueue, IdentityRegistry, ManagerLinker, ProfileStore};
use crate::types::{RegistrarError, Result};

#[derive(Default)]
struct Inner {
    identities: HashMap<ObjectId, IdentityDoc>,
    profiles: HashMap<ObjectId, ProfileDoc>,
    addresses: HashMap<ObjectId, AddressDoc>,
    applications: HashMap<ObjectId, BusinessApplicationDoc>,
    manager_applications: HashMap<ObjectId, ManagerApplicationDoc>,
}

/// Row counts across the five collections. Lets tests assert that a
/// failed step wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub identities: usize,
    pub profiles: usize,
    pub addresses: usize,
    pub applications: usize,
    pub manager_applications: usize,
}

/// In-memory implementation of the store traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> RowCounts {
        let inner = self.inner.read().await;
        RowCounts {
            identities: inner.identities.len(),
            profiles: inner.profiles.len(),
            addresses: inner.addresses.len(),
            applications: inner.applications.len(),
            manager_applications: inner.manager_applications.len(),
        }
    }

    /// Address rows nothing references. Always empty when the no-orphan
    /// invariant holds.
    pub async fn orphan_addresses(&self) -> Vec<ObjectId> {
        let inner = self.inner.read().await;
        inner
            .addresses
            .keys()
            .filter(|id| {
                let referenced = inner.profiles.values().any(|p| p.address_id.as_ref() == Some(id))
                    || inner.applications.values().any(|a| a.address_id == **id)
                    || inner.manager_applications.values().any(|m| m.address_id == **id);
                !referenced
            })
            .copied()
            .collect()
    }
}

fn stamp_new(metadata: &mut crate::db::schemas::Metadata) {
    metadata.created_at = Some(DateTime::now());
    metadata.updated_at = Some(DateTime::now());
}

#[async_trait]
impl IdentityRegistry for MemoryStore {
    async fn insert_identity(&self, mut identity: IdentityDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        // Uniqueness check and insert under one write lock
        if inner.identities.values().any(|i| i.email == identity.email) {
            return Err(RegistrarError::DuplicateEmail);
        }
        let id = ObjectId::new();
        identity.id = Some(id);
        stamp_new(&mut identity.metadata);
        inner.identities.insert(id, identity);
        Ok(id)
    }

    async fn find_identity(&self, id: &ObjectId) -> Result<Option<IdentityDoc>> {
        Ok(self.inner.read().await.identities.get(id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityDoc>> {
        let inner = self.inner.read().await;
        Ok(inner.identities.values().find(|i| i.email == email).cloned())
    }

    async fn promote_identity(&self, id: &ObjectId, verified: bool, role: Option<Role>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let identity = inner
            .identities
            .get_mut(id)
            .ok_or(RegistrarError::UserNotFound)?;
        identity.verified = verified;
        if let Some(role) = role {
            identity.role = role;
        }
        identity.metadata.touch();
        Ok(())
    }

    async fn set_identity_phone(&self, id: &ObjectId, phone: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let identity = inner
            .identities
            .get_mut(id)
            .ok_or(RegistrarError::UserNotFound)?;
        identity.phone = phone.to_string();
        identity.metadata.touch();
        Ok(())
    }

    async fn remove_identity(&self, id: &ObjectId) -> Result<()> {
        self.inner.write().await.identities.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn insert_profile(&self, mut profile: ProfileDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        if inner
            .profiles
            .values()
            .any(|p| p.identity_id == profile.identity_id)
        {
            return Err(RegistrarError::Store(
                "identity already has a profile".to_string(),
            ));
        }
        let id = ObjectId::new();
        profile.id = Some(id);
        stamp_new(&mut profile.metadata);
        inner.profiles.insert(id, profile);
        Ok(id)
    }

    async fn find_profile_by_identity(&self, identity_id: &ObjectId) -> Result<Option<ProfileDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .profiles
            .values()
            .find(|p| p.identity_id == *identity_id)
            .cloned())
    }

    async fn apply_profile_changes(
        &self,
        identity_id: &ObjectId,
        changes: &ProfileChanges,
        new_address_id: Option<ObjectId>,
    ) -> Result<Option<ProfileDoc>> {
        let mut inner = self.inner.write().await;
        let profile = match inner
            .profiles
            .values_mut()
            .find(|p| p.identity_id == *identity_id)
        {
            Some(profile) => profile,
            None => return Ok(None),
        };

        if let Some(first_name) = &changes.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(date_of_birth) = changes.date_of_birth {
            profile.date_of_birth = Some(date_of_birth);
        }
        if let Some(national_id_number) = &changes.national_id_number {
            profile.national_id_number = Some(national_id_number.clone());
        }
        if let Some(national_id_image_ref) = &changes.national_id_image_ref {
            profile.national_id_image_ref = Some(national_id_image_ref.clone());
        }
        if let Some(address_id) = new_address_id {
            profile.address_id = Some(address_id);
        }
        profile.metadata.touch();
        Ok(Some(profile.clone()))
    }

    async fn remove_profile_by_identity(&self, identity_id: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.profiles.retain(|_, p| p.identity_id != *identity_id);
        Ok(())
    }
}

#[async_trait]
impl AddressBook for MemoryStore {
    async fn insert_address(&self, mut address: AddressDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        address.id = Some(id);
        stamp_new(&mut address.metadata);
        inner.addresses.insert(id, address);
        Ok(id)
    }

    async fn find_address(&self, id: &ObjectId) -> Result<Option<AddressDoc>> {
        Ok(self.inner.read().await.addresses.get(id).cloned())
    }

    async fn remove_address(&self, id: &ObjectId) -> Result<()> {
        self.inner.write().await.addresses.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ApplicationQueue for MemoryStore {
    async fn insert_application(&self, mut application: BusinessApplicationDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        application.id = Some(id);
        stamp_new(&mut application.metadata);
        inner.applications.insert(id, application);
        Ok(id)
    }

    async fn find_application(&self, id: &ObjectId) -> Result<Option<BusinessApplicationDoc>> {
        Ok(self.inner.read().await.applications.get(id).cloned())
    }

    async fn applications_for_owner(
        &self,
        owner_identity_id: &ObjectId,
    ) -> Result<Vec<BusinessApplicationDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .applications
            .values()
            .filter(|a| a.owner_identity_id == *owner_identity_id)
            .cloned()
            .collect())
    }

    async fn pending_applications(&self) -> Result<Vec<BusinessApplicationDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .applications
            .values()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn decide_application(
        &self,
        id: &ObjectId,
        verdict: &Verdict,
        decided_by: &ObjectId,
    ) -> Result<Option<BusinessApplicationDoc>> {
        let mut inner = self.inner.write().await;
        let application = match inner.applications.get_mut(id) {
            Some(application) => application,
            None => return Ok(None),
        };
        // Check-and-set under the write lock: only a pending row decides
        if application.status != ApplicationStatus::Pending {
            return Ok(None);
        }
        application.status = verdict.status();
        application.rejection_reason = verdict.rejection_reason().map(str::to_string);
        application.decided_at = Some(Utc::now());
        application.decided_by = Some(*decided_by);
        application.metadata.touch();
        Ok(Some(application.clone()))
    }
}

#[async_trait]
impl ManagerLinker for MemoryStore {
    async fn insert_manager_application(
        &self,
        mut application: ManagerApplicationDoc,
    ) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        application.id = Some(id);
        stamp_new(&mut application.metadata);
        inner.manager_applications.insert(id, application);
        Ok(id)
    }

    async fn find_manager_application(&self, id: &ObjectId) -> Result<Option<ManagerApplicationDoc>> {
        Ok(self.inner.read().await.manager_applications.get(id).cloned())
    }

    async fn manager_applications_for(
        &self,
        linked_application_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .manager_applications
            .values()
            .filter(|m| m.linked_application_id == *linked_application_id)
            .cloned()
            .collect())
    }

    async fn approved_links_for_identity(
        &self,
        manager_identity_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .manager_applications
            .values()
            .filter(|m| {
                m.manager_identity_id.as_ref() == Some(manager_identity_id)
                    && m.status == ApplicationStatus::Approved
            })
            .cloned()
            .collect())
    }

    async fn decide_manager_application(
        &self,
        id: &ObjectId,
        status: ApplicationStatus,
        decided_by: &ObjectId,
    ) -> Result<Option<ManagerApplicationDoc>> {
        if !status.is_decided() {
            return Err(RegistrarError::validation(
                "manager application decision must be a decided status",
            ));
        }
        let mut inner = self.inner.write().await;
        let application = match inner.manager_applications.get_mut(id) {
            Some(application) => application,
            None => return Ok(None),
        };
        if application.status != ApplicationStatus::Pending {
            return Ok(None);
        }
        application.status = status;
        application.decided_at = Some(Utc::now());
        application.decided_by = Some(*decided_by);
        application.metadata.touch();
        Ok(Some(application.clone()))
    }
}
