//! Registration orchestrator
//!
//! Drives consumer signup and the three-step business pipeline: owner
//! personal details, then business details, then an optional manager
//! link. Every step validates before writing, writes in dependency order
//! (address before the row that references it), and compensates partial
//! writes so a failed step leaves no orphan rows behind.

use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::password::hash_credential;
use crate::db::schemas::{
    normalize_email, AddressDoc, AddressInput, ApplicationStatus, BusinessApplicationDoc,
    IdentityDoc, ManagerApplicationDoc, ProfileDoc, ProfileKind, Role,
};
use crate::store::RegistryStore;
use crate::types::{RegistrarError, Result};

const MIN_CREDENTIAL_LEN: usize = 8;

/// Inputs for consumer signup.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSignup {
    pub email: String,
    pub password: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

/// Step 1 inputs - the owner's personal details.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSignup {
    pub email: String,
    pub password: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub national_id_number: Option<String>,
    #[serde(default)]
    pub national_id_image_ref: Option<String>,
}

/// Step 2 inputs - the business filed under an owner identity.
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessSignup {
    pub owner_identity_id: ObjectId,
    pub business_name: String,
    pub legal_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub tax_certificate_number: Option<String>,
    pub address: AddressInput,
}

/// Step 3 inputs - a manager attached to a filed application.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSignup {
    pub linked_application_id: ObjectId,
    /// Identity the caller claims to be. Must own the linked application.
    pub owner_identity_id: ObjectId,
    pub email: String,
    /// Credential for a newly created manager identity. Ignored when the
    /// email resolves to an existing identity.
    pub password: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub national_id_number: Option<String>,
    pub address: AddressInput,
}

/// Outcome of resolving a manager email against the identity registry.
///
/// One resolution function feeds both Step 3 and any future re-entry
/// point, so the reuse-vs-create branch lives in exactly one place.
#[derive(Debug)]
pub enum ManagerResolution {
    /// The email already belongs to an identity; reuse it as-is.
    Existing(IdentityDoc),
    /// No identity matches; the step creates one from the signup fields.
    New,
}

/// Orchestrates registration flows over the store.
pub struct RegistrationService {
    store: Arc<dyn RegistryStore>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Register a plain consumer. Consumers sign in without administrator
    /// review; no application row is involved.
    pub async fn register_consumer(&self, signup: ConsumerSignup) -> Result<ObjectId> {
        let email = normalize_email(&signup.email);
        validate_person(&email, &signup.password, &signup.phone, &signup.first_name, &signup.last_name)?;

        let hash = hash_credential(&signup.password)?;
        let identity = IdentityDoc::new(email, signup.phone.clone(), hash, Role::Consumer, false);

        let identity_id = create_identity_with_profile(
            self.store.as_ref(),
            "consumer registration",
            identity,
            |identity_id| {
                ProfileDoc::new(
                    identity_id,
                    ProfileKind::Consumer,
                    signup.first_name.clone(),
                    signup.last_name.clone(),
                )
                .with_date_of_birth(signup.date_of_birth)
            },
        )
        .await?;

        info!(identity = %identity_id, "consumer registered");
        Ok(identity_id)
    }

    /// Step 1: create the owner identity and profile.
    ///
    /// The returned id is the sole handle Step 2 needs. The identity is
    /// provisioned with role business_owner and verified=false; sign-in
    /// stays gated until an administrator decides the application.
    pub async fn register_owner(&self, signup: OwnerSignup) -> Result<ObjectId> {
        let email = normalize_email(&signup.email);
        validate_person(&email, &signup.password, &signup.phone, &signup.first_name, &signup.last_name)?;

        let hash = hash_credential(&signup.password)?;
        let identity = IdentityDoc::new(email, signup.phone.clone(), hash, Role::BusinessOwner, false);

        let identity_id = create_identity_with_profile(
            self.store.as_ref(),
            "owner registration",
            identity,
            |identity_id| {
                ProfileDoc::new(
                    identity_id,
                    ProfileKind::Owner,
                    signup.first_name.clone(),
                    signup.last_name.clone(),
                )
                .with_date_of_birth(signup.date_of_birth)
                .with_national_id(
                    signup.national_id_number.clone(),
                    signup.national_id_image_ref.clone(),
                )
            },
        )
        .await?;

        info!(identity = %identity_id, "owner registered, awaiting business details");
        Ok(identity_id)
    }

    /// Step 2: file the business under an owner identity.
    ///
    /// The address is written first; the application row never exists
    /// without a resolvable address id.
    pub async fn register_business(&self, signup: BusinessSignup) -> Result<ObjectId> {
        require("business_name", &signup.business_name)?;
        require("legal_name", &signup.legal_name)?;
        validate_email(&normalize_email(&signup.contact_email))?;
        require("contact_phone", &signup.contact_phone)?;
        validate_address(&signup.address)?;

        let owner = self
            .store
            .find_identity(&signup.owner_identity_id)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;
        if owner.role != Role::BusinessOwner {
            return Err(RegistrarError::NotAuthorizedForBusinessStep);
        }

        let address_id = self
            .store
            .insert_address(AddressDoc::new(signup.address.clone()))
            .await
            .map_err(|e| RegistrarError::DependencyWriteFailed {
                step: "business address",
                detail: e.to_string(),
            })?;

        let application = BusinessApplicationDoc {
            owner_identity_id: signup.owner_identity_id,
            business_name: signup.business_name.clone(),
            legal_name: signup.legal_name.clone(),
            address_id,
            contact_email: normalize_email(&signup.contact_email),
            contact_phone: signup.contact_phone.clone(),
            license_number: signup.license_number.clone(),
            tax_certificate_number: signup.tax_certificate_number.clone(),
            status: ApplicationStatus::Pending,
            ..Default::default()
        };

        match self.store.insert_application(application).await {
            Ok(application_id) => {
                info!(
                    application = %application_id,
                    owner = %signup.owner_identity_id,
                    "business application filed"
                );
                Ok(application_id)
            }
            Err(e) => {
                // All-or-nothing: take the address back out
                if let Err(undo) = self.store.remove_address(&address_id).await {
                    warn!(address = %address_id, error = %undo, "failed to remove orphan business address");
                }
                Err(RegistrarError::DependencyWriteFailed {
                    step: "business application",
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Step 3 (optional): attach a manager to a filed application.
    ///
    /// Reuses an existing identity matched by email, otherwise creates
    /// one. The link stays pending; business membership materializes only
    /// when an administrator finalizes it after approving the business.
    pub async fn register_manager(&self, signup: ManagerSignup) -> Result<ObjectId> {
        let email = normalize_email(&signup.email);
        validate_email(&email)?;
        require("phone", &signup.phone)?;
        require("first_name", &signup.first_name)?;
        require("last_name", &signup.last_name)?;
        validate_address(&signup.address)?;

        let application = self
            .store
            .find_application(&signup.linked_application_id)
            .await?
            .ok_or(RegistrarError::ApplicationNotFound)?;

        if application.owner_identity_id != signup.owner_identity_id {
            // Security check, not validation: someone is attaching a
            // manager to a business they do not own
            warn!(
                application = %signup.linked_application_id,
                owner = %application.owner_identity_id,
                caller = %signup.owner_identity_id,
                "ownership mismatch on manager registration"
            );
            return Err(RegistrarError::OwnershipMismatch);
        }

        if application.status == ApplicationStatus::Rejected {
            return Err(RegistrarError::validation(
                "cannot attach a manager to a rejected application",
            ));
        }

        let (manager_identity_id, created_identity) =
            match self.resolve_manager_identity(&email).await? {
                ManagerResolution::Existing(identity) => {
                    let identity_id = identity
                        .id
                        .ok_or_else(|| RegistrarError::Store("stored identity has no id".into()))?;
                    info!(manager = %identity_id, "reusing existing identity for manager link");
                    (identity_id, false)
                }
                ManagerResolution::New => {
                    validate_credential(&signup.password)?;
                    let hash = hash_credential(&signup.password)?;
                    let identity = IdentityDoc::new(
                        email.clone(),
                        signup.phone.clone(),
                        hash,
                        Role::BusinessManager,
                        false,
                    );
                    let identity_id = create_identity_with_profile(
                        self.store.as_ref(),
                        "manager registration",
                        identity,
                        |identity_id| {
                            ProfileDoc::new(
                                identity_id,
                                ProfileKind::Manager,
                                signup.first_name.clone(),
                                signup.last_name.clone(),
                            )
                            .with_date_of_birth(signup.date_of_birth)
                            .with_national_id(signup.national_id_number.clone(), None)
                        },
                    )
                    .await?;
                    (identity_id, true)
                }
            };

        let address_id = match self
            .store
            .insert_address(AddressDoc::new(signup.address.clone()))
            .await
        {
            Ok(address_id) => address_id,
            Err(e) => {
                if created_identity {
                    self.unwind_manager_identity(&manager_identity_id).await;
                }
                return Err(RegistrarError::DependencyWriteFailed {
                    step: "manager address",
                    detail: e.to_string(),
                });
            }
        };

        let link = ManagerApplicationDoc::new(
            signup.owner_identity_id,
            signup.linked_application_id,
            manager_identity_id,
            address_id,
        );

        match self.store.insert_manager_application(link).await {
            Ok(link_id) => {
                info!(
                    manager_application = %link_id,
                    application = %signup.linked_application_id,
                    manager = %manager_identity_id,
                    "manager application filed"
                );
                Ok(link_id)
            }
            Err(e) => {
                if let Err(undo) = self.store.remove_address(&address_id).await {
                    warn!(address = %address_id, error = %undo, "failed to remove orphan manager address");
                }
                if created_identity {
                    self.unwind_manager_identity(&manager_identity_id).await;
                }
                Err(RegistrarError::DependencyWriteFailed {
                    step: "manager application",
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Resolve a manager email against the registry: reuse or create.
    pub async fn resolve_manager_identity(&self, email: &str) -> Result<ManagerResolution> {
        Ok(match self.store.find_identity_by_email(email).await? {
            Some(identity) => ManagerResolution::Existing(identity),
            None => ManagerResolution::New,
        })
    }

    async fn unwind_manager_identity(&self, identity_id: &ObjectId) {
        if let Err(e) = self.store.remove_profile_by_identity(identity_id).await {
            warn!(identity = %identity_id, error = %e, "failed to remove manager profile during unwind");
        }
        if let Err(e) = self.store.remove_identity(identity_id).await {
            warn!(identity = %identity_id, error = %e, "failed to remove manager identity during unwind");
        }
    }
}

/// Insert an identity and its profile as one unit: a profile failure
/// takes the identity back out before the error propagates.
pub(crate) async fn create_identity_with_profile(
    store: &dyn RegistryStore,
    step: &'static str,
    identity: IdentityDoc,
    profile: impl FnOnce(ObjectId) -> ProfileDoc + Send,
) -> Result<ObjectId> {
    let identity_id = store.insert_identity(identity).await?;

    if let Err(e) = store.insert_profile(profile(identity_id)).await {
        if let Err(undo) = store.remove_identity(&identity_id).await {
            warn!(
                identity = %identity_id,
                error = %undo,
                "failed to remove identity after profile write failure"
            );
        }
        return Err(RegistrarError::DependencyWriteFailed {
            step,
            detail: e.to_string(),
        });
    }

    Ok(identity_id)
}

// ============================================================================
// Field validation
// ============================================================================

pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistrarError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(RegistrarError::validation("a valid email is required"));
    }
    Ok(())
}

pub(crate) fn validate_credential(password: &str) -> Result<()> {
    if password.len() < MIN_CREDENTIAL_LEN {
        return Err(RegistrarError::Validation(format!(
            "password must be at least {MIN_CREDENTIAL_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_address(address: &AddressInput) -> Result<()> {
    require("street", &address.street)?;
    require("area", &address.area)?;
    require("city", &address.city)?;
    require("postal_code", &address.postal_code)?;
    require("country", &address.country)?;
    Ok(())
}

/// Mandatory personal fields shared by every identity-creating path.
pub(crate) fn validate_person(
    email: &str,
    password: &str,
    phone: &str,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    validate_email(email)?;
    validate_credential(password)?;
    require("phone", phone)?;
    require("first_name", first_name)?;
    require("last_name", last_name)?;
    Ok(())
}
