//! Approval engine
//!
//! Admin-facing state machine over pending applications. A decision is
//! claimed with a compare-and-swap on the pending status before any
//! identity side effect is applied, so two racing administrators cannot
//! both win: the loser observes `AlreadyDecided` and mutates nothing.

use std::sync::Arc;

use bson::oid::ObjectId;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::password::hash_credential;
use crate::db::schemas::{
    normalize_email, ApplicationStatus, ApprovedRole, BusinessApplicationDoc, IdentityDoc,
    ManagerApplicationDoc, ProfileDoc, ProfileKind, Role, Verdict,
};
use crate::services::notification::{NotificationKind, NotificationPayload, Notifier};
use crate::services::registration::{create_identity_with_profile, validate_person};
use crate::store::RegistryStore;
use crate::types::{RegistrarError, Result};

/// Inputs for creating staff identities (and the bootstrap admin).
#[derive(Debug, Clone, Deserialize)]
pub struct StaffSignup {
    pub email: String,
    pub password: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

/// Policy knobs for the engine.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// When true, approving as business_manager requires the application
    /// to actually carry manager links; Step 1 provisions business_owner,
    /// so an unlinked manager grant can only be a mistake.
    pub strict_role_choice: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            strict_role_choice: true,
        }
    }
}

/// Drives admin decisions over the application queue.
pub struct ApprovalService {
    store: Arc<dyn RegistryStore>,
    notifier: Arc<dyn Notifier>,
    config: ApprovalConfig,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn RegistryStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(store, notifier, ApprovalConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn RegistryStore>,
        notifier: Arc<dyn Notifier>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Approve a pending application.
    ///
    /// First approval verifies the owner identity and grants the chosen
    /// role. An already-verified business owner takes the repeat-owner
    /// path: the business is added under the existing identity and the
    /// identity is left untouched.
    pub async fn approve(
        &self,
        admin_id: &ObjectId,
        application_id: &ObjectId,
        role: ApprovedRole,
    ) -> Result<BusinessApplicationDoc> {
        self.require_admin(admin_id).await?;

        let application = self
            .store
            .find_application(application_id)
            .await?
            .ok_or(RegistrarError::ApplicationNotFound)?;
        let owner = self
            .store
            .find_identity(&application.owner_identity_id)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;

        if self.config.strict_role_choice && role == ApprovedRole::BusinessManager {
            let links = self.store.manager_applications_for(application_id).await?;
            if links.is_empty() {
                return Err(RegistrarError::validation(
                    "cannot approve as business_manager: the application has no manager link",
                ));
            }
        }

        // Claim the decision before touching the identity; the losing
        // side of a race gets AlreadyDecided and applies nothing
        let decided = self
            .claim_decision(application_id, &Verdict::Approved, admin_id)
            .await?;

        let repeat_owner = owner.verified && owner.role == Role::BusinessOwner;
        if repeat_owner {
            info!(
                application = %application_id,
                owner = %application.owner_identity_id,
                "approved additional business for verified owner"
            );
        } else {
            self.store
                .promote_identity(&application.owner_identity_id, true, Some(role.into()))
                .await
                .map_err(|e| RegistrarError::DependencyWriteFailed {
                    step: "owner promotion",
                    detail: e.to_string(),
                })?;
            info!(
                application = %application_id,
                owner = %application.owner_identity_id,
                role = %Role::from(role),
                "approved application and verified applicant"
            );
        }

        self.notify(NotificationKind::ApplicationApproved, &decided, None, &owner.email)
            .await;
        Ok(decided)
    }

    /// Reject a pending application. The reason is mandatory and is
    /// stored on the application for the applicant to see.
    pub async fn reject(
        &self,
        admin_id: &ObjectId,
        application_id: &ObjectId,
        reason: &str,
    ) -> Result<BusinessApplicationDoc> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RegistrarError::MissingReason);
        }

        self.require_admin(admin_id).await?;

        let application = self
            .store
            .find_application(application_id)
            .await?
            .ok_or(RegistrarError::ApplicationNotFound)?;
        let owner = self
            .store
            .find_identity(&application.owner_identity_id)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;

        let verdict = Verdict::Rejected {
            reason: reason.to_string(),
        };
        let decided = self.claim_decision(application_id, &verdict, admin_id).await?;

        info!(
            application = %application_id,
            owner = %application.owner_identity_id,
            "rejected business application"
        );

        // Pending manager links can never finalize under a rejected
        // business; close them out so the queue stays honest
        self.cascade_reject_managers(application_id, admin_id).await;

        self.notify(
            NotificationKind::ApplicationRejected,
            &decided,
            Some(reason.to_string()),
            &owner.email,
        )
        .await;
        Ok(decided)
    }

    /// Finalize a manager link after its business is approved: the link
    /// becomes the membership record and the manager identity is
    /// verified. Role is left as stored - an existing identity reused as
    /// a manager keeps whatever role it had.
    pub async fn finalize_manager(
        &self,
        admin_id: &ObjectId,
        manager_application_id: &ObjectId,
    ) -> Result<ManagerApplicationDoc> {
        self.require_admin(admin_id).await?;

        let link = self
            .store
            .find_manager_application(manager_application_id)
            .await?
            .ok_or(RegistrarError::ManagerApplicationNotFound)?;
        let business = self
            .store
            .find_application(&link.linked_application_id)
            .await?
            .ok_or(RegistrarError::ApplicationNotFound)?;

        if business.status != ApplicationStatus::Approved {
            return Err(RegistrarError::ApplicationNotApproved);
        }

        let decided = self
            .claim_manager_decision(manager_application_id, ApplicationStatus::Approved, admin_id)
            .await?;

        if let Some(manager_identity_id) = decided.manager_identity_id {
            self.store
                .promote_identity(&manager_identity_id, true, None)
                .await
                .map_err(|e| RegistrarError::DependencyWriteFailed {
                    step: "manager promotion",
                    detail: e.to_string(),
                })?;
            info!(
                manager_application = %manager_application_id,
                manager = %manager_identity_id,
                application = %link.linked_application_id,
                "manager link finalized"
            );

            if let Some(manager) = self.store.find_identity(&manager_identity_id).await? {
                let payload = NotificationPayload {
                    recipient_email: manager.email,
                    business_name: business.business_name.clone(),
                    reason: None,
                };
                if let Err(e) = self
                    .notifier
                    .send(NotificationKind::ManagerLinkApproved, &payload)
                    .await
                {
                    warn!(error = %e, "notification dispatch failed");
                }
            }
        } else {
            warn!(
                manager_application = %manager_application_id,
                "finalized link carries no resolved manager identity"
            );
        }

        Ok(decided)
    }

    /// Reject a pending manager link. No identity mutation.
    pub async fn reject_manager(
        &self,
        admin_id: &ObjectId,
        manager_application_id: &ObjectId,
    ) -> Result<ManagerApplicationDoc> {
        self.require_admin(admin_id).await?;

        let decided = self
            .claim_manager_decision(manager_application_id, ApplicationStatus::Rejected, admin_id)
            .await?;
        info!(manager_application = %manager_application_id, "manager link rejected");
        Ok(decided)
    }

    /// Explicit administrator verification of an identity, outside any
    /// application decision.
    pub async fn verify_identity(&self, admin_id: &ObjectId, identity_id: &ObjectId) -> Result<()> {
        self.require_admin(admin_id).await?;

        self.store
            .find_identity(identity_id)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;
        self.store.promote_identity(identity_id, true, None).await?;

        info!(identity = %identity_id, admin = %admin_id, "identity verified by administrator");
        Ok(())
    }

    /// Create a back-office staff identity. Staff are provisioned
    /// verified; they never pass through the application queue.
    pub async fn register_staff(
        &self,
        admin_id: &ObjectId,
        signup: StaffSignup,
        role: Role,
    ) -> Result<ObjectId> {
        self.require_admin(admin_id).await?;

        if !role.is_staff() {
            return Err(RegistrarError::validation(
                "staff role must be admin, operations or social_media",
            ));
        }

        let email = normalize_email(&signup.email);
        validate_person(&email, &signup.password, &signup.phone, &signup.first_name, &signup.last_name)?;

        let hash = hash_credential(&signup.password)?;
        let identity = IdentityDoc::new(email, signup.phone.clone(), hash, role, true);

        let identity_id = create_identity_with_profile(
            self.store.as_ref(),
            "staff registration",
            identity,
            |identity_id| {
                ProfileDoc::new(
                    identity_id,
                    ProfileKind::Consumer,
                    signup.first_name.clone(),
                    signup.last_name.clone(),
                )
            },
        )
        .await?;

        info!(identity = %identity_id, role = %role, admin = %admin_id, "staff identity created");
        Ok(identity_id)
    }

    /// First-run provisioning of the initial administrator. There is no
    /// acting admin yet, so no admin gate; idempotent when the email
    /// already belongs to an admin.
    pub async fn bootstrap_admin(store: &dyn RegistryStore, signup: StaffSignup) -> Result<ObjectId> {
        let email = normalize_email(&signup.email);
        validate_person(&email, &signup.password, &signup.phone, &signup.first_name, &signup.last_name)?;

        if let Some(existing) = store.find_identity_by_email(&email).await? {
            return if existing.role == Role::Admin {
                existing
                    .id
                    .ok_or_else(|| RegistrarError::Store("stored identity has no id".into()))
            } else {
                Err(RegistrarError::DuplicateEmail)
            };
        }

        let hash = hash_credential(&signup.password)?;
        let identity = IdentityDoc::new(email, signup.phone.clone(), hash, Role::Admin, true);

        let identity_id = create_identity_with_profile(store, "admin bootstrap", identity, |identity_id| {
            ProfileDoc::new(
                identity_id,
                ProfileKind::Consumer,
                signup.first_name.clone(),
                signup.last_name.clone(),
            )
        })
        .await?;

        info!(identity = %identity_id, "bootstrap administrator created");
        Ok(identity_id)
    }

    /// Applications awaiting a decision - the unit of admin work.
    pub async fn pending_applications(&self) -> Result<Vec<BusinessApplicationDoc>> {
        self.store.pending_applications().await
    }

    /// All manager links filed against an application.
    pub async fn manager_links(&self, application_id: &ObjectId) -> Result<Vec<ManagerApplicationDoc>> {
        self.store.manager_applications_for(application_id).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Load and authorize the acting administrator.
    async fn require_admin(&self, admin_id: &ObjectId) -> Result<IdentityDoc> {
        let identity = self
            .store
            .find_identity(admin_id)
            .await?
            .ok_or(RegistrarError::AdminRequired)?;

        if identity.role != Role::Admin {
            warn!(
                caller = %admin_id,
                role = %identity.role,
                "non-admin attempted an approval operation"
            );
            return Err(RegistrarError::AdminRequired);
        }
        Ok(identity)
    }

    /// Resolve the CAS outcome into the typed error contract.
    async fn claim_decision(
        &self,
        application_id: &ObjectId,
        verdict: &Verdict,
        admin_id: &ObjectId,
    ) -> Result<BusinessApplicationDoc> {
        match self
            .store
            .decide_application(application_id, verdict, admin_id)
            .await?
        {
            Some(decided) => Ok(decided),
            None => match self.store.find_application(application_id).await? {
                Some(_) => Err(RegistrarError::AlreadyDecided),
                None => Err(RegistrarError::ApplicationNotFound),
            },
        }
    }

    async fn claim_manager_decision(
        &self,
        manager_application_id: &ObjectId,
        status: ApplicationStatus,
        admin_id: &ObjectId,
    ) -> Result<ManagerApplicationDoc> {
        match self
            .store
            .decide_manager_application(manager_application_id, status, admin_id)
            .await?
        {
            Some(decided) => Ok(decided),
            None => match self
                .store
                .find_manager_application(manager_application_id)
                .await?
            {
                Some(_) => Err(RegistrarError::AlreadyDecided),
                None => Err(RegistrarError::ManagerApplicationNotFound),
            },
        }
    }

    /// Close out pending manager links under a rejected business.
    /// Warn-and-continue: the business decision already landed.
    async fn cascade_reject_managers(&self, application_id: &ObjectId, admin_id: &ObjectId) {
        let links = match self.store.manager_applications_for(application_id).await {
            Ok(links) => links,
            Err(e) => {
                warn!(
                    application = %application_id,
                    error = %e,
                    "failed to load manager links for cascade rejection"
                );
                return;
            }
        };

        for link in links.iter().filter(|l| l.status == ApplicationStatus::Pending) {
            let Some(link_id) = link.id else { continue };
            match self
                .store
                .decide_manager_application(&link_id, ApplicationStatus::Rejected, admin_id)
                .await
            {
                Ok(Some(_)) => {
                    info!(manager_application = %link_id, "cascade-rejected pending manager link");
                }
                // Raced to a decision elsewhere; nothing to do
                Ok(None) => {}
                Err(e) => {
                    warn!(manager_application = %link_id, error = %e, "cascade rejection failed");
                }
            }
        }
    }

    /// Fire-and-forget applicant notification.
    async fn notify(
        &self,
        kind: NotificationKind,
        application: &BusinessApplicationDoc,
        reason: Option<String>,
        recipient: &str,
    ) {
        let payload = NotificationPayload {
            recipient_email: recipient.to_string(),
            business_name: application.business_name.clone(),
            reason,
        };
        if let Err(e) = self.notifier.send(kind, &payload).await {
            warn!(kind = ?kind, error = %e, "notification dispatch failed");
        }
    }
}
