//! MongoDB-backed store
//!
//! Uniqueness rides on the unique email index; decisions ride on
//! conditional updates filtered to the pending status, so a raced
//! decision always loses cleanly instead of double-applying.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;

use crate::db::schemas::{
    AddressDoc, ApplicationStatus, BusinessApplicationDoc, IdentityDoc, ManagerApplicationDoc,
    ProfileChanges, ProfileDoc, Role, Verdict, ADDRESS_COLLECTION, BUSINESS_APPLICATION_COLLECTION,
    IDENTITY_COLLECTION, MANAGER_APPLICATION_COLLECTION, PROFILE_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{AddressBook, ApplicationQueue, IdentityRegistry, ManagerLinker, ProfileStore};
use crate::types::{RegistrarError, Result};

/// MongoDB implementation of the store traits.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
}

impl MongoStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    async fn identities(&self) -> Result<MongoCollection<IdentityDoc>> {
        self.client.collection(IDENTITY_COLLECTION).await
    }

    async fn profiles(&self) -> Result<MongoCollection<ProfileDoc>> {
        self.client.collection(PROFILE_COLLECTION).await
    }

    async fn addresses(&self) -> Result<MongoCollection<AddressDoc>> {
        self.client.collection(ADDRESS_COLLECTION).await
    }

    async fn applications(&self) -> Result<MongoCollection<BusinessApplicationDoc>> {
        self.client.collection(BUSINESS_APPLICATION_COLLECTION).await
    }

    async fn manager_applications(&self) -> Result<MongoCollection<ManagerApplicationDoc>> {
        self.client.collection(MANAGER_APPLICATION_COLLECTION).await
    }
}

fn now_bson() -> Result<bson::Bson> {
    bson::to_bson(&Utc::now())
        .map_err(|e| RegistrarError::Store(format!("Failed to encode timestamp: {}", e)))
}

#[async_trait]
impl IdentityRegistry for MongoStore {
    async fn insert_identity(&self, identity: IdentityDoc) -> Result<ObjectId> {
        let collection = self.identities().await?;

        // Friendly pre-check; the unique index backstops the race
        if collection
            .find_one(doc! { "email": &identity.email })
            .await?
            .is_some()
        {
            return Err(RegistrarError::DuplicateEmail);
        }

        match collection.insert_one(identity).await {
            Ok(id) => Ok(id),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("E11000") || msg.contains("duplicate key") {
                    Err(RegistrarError::DuplicateEmail)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn find_identity(&self, id: &ObjectId) -> Result<Option<IdentityDoc>> {
        self.identities().await?.find_one(doc! { "_id": *id }).await
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityDoc>> {
        self.identities().await?.find_one(doc! { "email": email }).await
    }

    async fn promote_identity(&self, id: &ObjectId, verified: bool, role: Option<Role>) -> Result<()> {
        let mut set = doc! {
            "verified": verified,
            "metadata.updated_at": DateTime::now(),
        };
        if let Some(role) = role {
            set.insert("role", role.as_str());
        }

        let result = self
            .identities()
            .await?
            .update_one(doc! { "_id": *id }, doc! { "$set": set })
            .await?;

        if result.matched_count == 0 {
            return Err(RegistrarError::UserNotFound);
        }
        Ok(())
    }

    async fn set_identity_phone(&self, id: &ObjectId, phone: &str) -> Result<()> {
        let result = self
            .identities()
            .await?
            .update_one(
                doc! { "_id": *id },
                doc! { "$set": { "phone": phone, "metadata.updated_at": DateTime::now() } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(RegistrarError::UserNotFound);
        }
        Ok(())
    }

    async fn remove_identity(&self, id: &ObjectId) -> Result<()> {
        self.identities().await?.delete_one(doc! { "_id": *id }).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MongoStore {
    async fn insert_profile(&self, profile: ProfileDoc) -> Result<ObjectId> {
        self.profiles().await?.insert_one(profile).await
    }

    async fn find_profile_by_identity(&self, identity_id: &ObjectId) -> Result<Option<ProfileDoc>> {
        self.profiles()
            .await?
            .find_one(doc! { "identity_id": *identity_id })
            .await
    }

    async fn apply_profile_changes(
        &self,
        identity_id: &ObjectId,
        changes: &ProfileChanges,
        new_address_id: Option<ObjectId>,
    ) -> Result<Option<ProfileDoc>> {
        let mut set = Document::new();
        if let Some(first_name) = &changes.first_name {
            set.insert("first_name", first_name);
        }
        if let Some(last_name) = &changes.last_name {
            set.insert("last_name", last_name);
        }
        if let Some(date_of_birth) = &changes.date_of_birth {
            let encoded = bson::to_bson(date_of_birth)
                .map_err(|e| RegistrarError::Store(format!("Failed to encode date: {}", e)))?;
            set.insert("date_of_birth", encoded);
        }
        if let Some(national_id_number) = &changes.national_id_number {
            set.insert("national_id_number", national_id_number);
        }
        if let Some(national_id_image_ref) = &changes.national_id_image_ref {
            set.insert("national_id_image_ref", national_id_image_ref);
        }
        if let Some(address_id) = new_address_id {
            set.insert("address_id", address_id);
        }
        set.insert("metadata.updated_at", DateTime::now());

        self.profiles()
            .await?
            .find_one_and_update(doc! { "identity_id": *identity_id }, doc! { "$set": set })
            .await
    }

    async fn remove_profile_by_identity(&self, identity_id: &ObjectId) -> Result<()> {
        self.profiles()
            .await?
            .delete_one(doc! { "identity_id": *identity_id })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AddressBook for MongoStore {
    async fn insert_address(&self, address: AddressDoc) -> Result<ObjectId> {
        self.addresses().await?.insert_one(address).await
    }

    async fn find_address(&self, id: &ObjectId) -> Result<Option<AddressDoc>> {
        self.addresses().await?.find_one(doc! { "_id": *id }).await
    }

    async fn remove_address(&self, id: &ObjectId) -> Result<()> {
        self.addresses().await?.delete_one(doc! { "_id": *id }).await?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationQueue for MongoStore {
    async fn insert_application(&self, application: BusinessApplicationDoc) -> Result<ObjectId> {
        self.applications().await?.insert_one(application).await
    }

    async fn find_application(&self, id: &ObjectId) -> Result<Option<BusinessApplicationDoc>> {
        self.applications().await?.find_one(doc! { "_id": *id }).await
    }

    async fn applications_for_owner(
        &self,
        owner_identity_id: &ObjectId,
    ) -> Result<Vec<BusinessApplicationDoc>> {
        self.applications()
            .await?
            .find_many(doc! { "owner_identity_id": *owner_identity_id })
            .await
    }

    async fn pending_applications(&self) -> Result<Vec<BusinessApplicationDoc>> {
        self.applications()
            .await?
            .find_many(doc! { "status": ApplicationStatus::Pending.as_str() })
            .await
    }

    async fn decide_application(
        &self,
        id: &ObjectId,
        verdict: &Verdict,
        decided_by: &ObjectId,
    ) -> Result<Option<BusinessApplicationDoc>> {
        let mut set = doc! {
            "status": verdict.status().as_str(),
            "decided_at": now_bson()?,
            "decided_by": *decided_by,
            "metadata.updated_at": DateTime::now(),
        };
        if let Some(reason) = verdict.rejection_reason() {
            set.insert("rejection_reason", reason);
        }

        // The filter pins the pending state: losers of a decision race
        // match nothing and get None back
        self.applications()
            .await?
            .find_one_and_update(
                doc! { "_id": *id, "status": ApplicationStatus::Pending.as_str() },
                doc! { "$set": set },
            )
            .await
    }
}

#[async_trait]
impl ManagerLinker for MongoStore {
    async fn insert_manager_application(
        &self,
        application: ManagerApplicationDoc,
    ) -> Result<ObjectId> {
        self.manager_applications().await?.insert_one(application).await
    }

    async fn find_manager_application(&self, id: &ObjectId) -> Result<Option<ManagerApplicationDoc>> {
        self.manager_applications()
            .await?
            .find_one(doc! { "_id": *id })
            .await
    }

    async fn manager_applications_for(
        &self,
        linked_application_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        self.manager_applications()
            .await?
            .find_many(doc! { "linked_application_id": *linked_application_id })
            .await
    }

    async fn approved_links_for_identity(
        &self,
        manager_identity_id: &ObjectId,
    ) -> Result<Vec<ManagerApplicationDoc>> {
        self.manager_applications()
            .await?
            .find_many(doc! {
                "manager_identity_id": *manager_identity_id,
                "status": ApplicationStatus::Approved.as_str(),
            })
            .await
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

        self.manager_applications()
            .await?
            .find_one_and_update(
                doc! { "_id": *id, "status": ApplicationStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": status.as_str(),
                    "decided_at": now_bson()?,
                    "decided_by": *decided_by,
                    "metadata.updated_at": DateTime::now(),
                } },
            )
            .await
    }
}
