//! Profile updates
//!
//! Owner-invoked mutation of biographical and contact data. Email,
//! credential, role and the verified flag are out of reach by contract:
//! the first two never change here, the last two belong to the approval
//! engine.

use std::sync::Arc;

use bson::oid::ObjectId;
use tracing::{info, warn};

use crate::db::schemas::{AddressDoc, ProfileChanges, ProfileDoc};
use crate::services::registration::{require, validate_address};
use crate::store::RegistryStore;
use crate::types::{RegistrarError, Result};

pub struct ProfileService {
    store: Arc<dyn RegistryStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Apply a change set to the principal's profile.
    ///
    /// An address change inserts a new row and re-points the profile; the
    /// old row stays for any other referrer. Phone propagates to the
    /// identity, which is the authoritative contact record.
    pub async fn update_profile(
        &self,
        identity_id: &ObjectId,
        changes: ProfileChanges,
    ) -> Result<ProfileDoc> {
        if changes.is_empty() {
            return Err(RegistrarError::validation("no fields to update"));
        }
        if let Some(first_name) = &changes.first_name {
            require("first_name", first_name)?;
        }
        if let Some(last_name) = &changes.last_name {
            require("last_name", last_name)?;
        }
        if let Some(phone) = &changes.phone {
            require("phone", phone)?;
        }
        if let Some(address) = &changes.address {
            validate_address(address)?;
        }

        self.store
            .find_identity(identity_id)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;

        let new_address_id = match &changes.address {
            Some(input) => Some(
                self.store
                    .insert_address(AddressDoc::new(input.clone()))
                    .await
                    .map_err(|e| RegistrarError::DependencyWriteFailed {
                        step: "profile address",
                        detail: e.to_string(),
                    })?,
            ),
            None => None,
        };

        let updated = match self
            .store
            .apply_profile_changes(identity_id, &changes, new_address_id)
            .await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                self.discard_address(new_address_id).await;
                return Err(RegistrarError::Store(format!(
                    "identity {identity_id} has no profile"
                )));
            }
            Err(e) => {
                self.discard_address(new_address_id).await;
                return Err(RegistrarError::DependencyWriteFailed {
                    step: "profile update",
                    detail: e.to_string(),
                });
            }
        };

        if let Some(phone) = &changes.phone {
            self.store.set_identity_phone(identity_id, phone).await?;
        }

        info!(identity = %identity_id, "profile updated");
        Ok(updated)
    }

    async fn discard_address(&self, address_id: Option<ObjectId>) {
        if let Some(address_id) = address_id {
            if let Err(e) = self.store.remove_address(&address_id).await {
                warn!(address = %address_id, error = %e, "failed to remove orphan profile address");
            }
        }
    }
}
