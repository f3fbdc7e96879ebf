//! Authentication gateway
//!
//! Credential verification and session issuance over the identity
//! registry. Error precedence is part of the contract: unknown email
//! fails `UserNotFound`, an unreviewed business identity fails
//! `PendingApproval` before the credential is even checked, and only
//! then does a bad credential fail `InvalidCredential`.

use std::sync::Arc;

use bson::oid::ObjectId;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::password::verify_credential;
use crate::auth::session::{SessionIssuer, SessionToken};
use crate::db::schemas::{
    normalize_email, ApplicationStatus, BusinessApplicationDoc, IdentityDoc, ProfileDoc, Role,
};
use crate::store::RegistryStore;
use crate::types::{RegistrarError, Result};

/// One business visible to a principal.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessSummary {
    pub application_id: ObjectId,
    pub business_name: String,
    pub status: ApplicationStatus,
}

/// Successful authentication result. The credential hash is withheld;
/// the role is returned exactly as stored.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedPrincipal {
    pub identity_id: ObjectId,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub verified: bool,
    pub profile: Option<ProfileDoc>,
    /// Owned applications for owners, approved memberships for managers
    pub businesses: Vec<BusinessSummary>,
    pub session: SessionToken,
}

/// Verifies credentials and issues sessions.
pub struct AuthenticationService {
    store: Arc<dyn RegistryStore>,
    sessions: SessionIssuer,
}

impl AuthenticationService {
    pub fn new(store: Arc<dyn RegistryStore>, sessions: SessionIssuer) -> Self {
        Self { store, sessions }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthenticatedPrincipal> {
        let email = normalize_email(email);

        let identity = self
            .store
            .find_identity_by_email(&email)
            .await?
            .ok_or(RegistrarError::UserNotFound)?;

        // Gate before the credential check so clients can render
        // "awaiting approval" instead of a password error
        if identity.role.requires_review() && !identity.verified {
            return Err(RegistrarError::PendingApproval);
        }

        if !verify_credential(password, &identity.credential_hash)? {
            warn!(email = %email, "authentication failed: credential mismatch");
            return Err(RegistrarError::InvalidCredential);
        }

        let identity_id = identity
            .id
            .ok_or_else(|| RegistrarError::Store("stored identity has no id".into()))?;

        let profile = self.store.find_profile_by_identity(&identity_id).await?;
        let businesses = self.business_summaries(&identity, &identity_id).await?;
        let session = self.sessions.issue(&identity)?;

        info!(identity = %identity_id, role = %identity.role, "authentication succeeded");

        Ok(AuthenticatedPrincipal {
            identity_id,
            email: identity.email,
            phone: identity.phone,
            role: identity.role,
            verified: identity.verified,
            profile,
            businesses,
            session,
        })
    }

    /// Businesses the principal can act on. Owners see every application
    /// filed under them; approved manager links surface their business
    /// regardless of the stored role, since an existing identity reused
    /// as a manager keeps its original role.
    async fn business_summaries(
        &self,
        identity: &IdentityDoc,
        identity_id: &ObjectId,
    ) -> Result<Vec<BusinessSummary>> {
        let mut summaries: Vec<BusinessSummary> = Vec::new();

        if identity.role == Role::BusinessOwner {
            for application in self.store.applications_for_owner(identity_id).await? {
                if let Some(summary) = summarize(application) {
                    summaries.push(summary);
                }
            }
        }

        for link in self.store.approved_links_for_identity(identity_id).await? {
            if summaries.iter().any(|s| s.application_id == link.linked_application_id) {
                continue;
            }
            if let Some(application) = self.store.find_application(&link.linked_application_id).await? {
                if let Some(summary) = summarize(application) {
                    summaries.push(summary);
                }
            }
        }

        Ok(summaries)
    }
}

fn summarize(application: BusinessApplicationDoc) -> Option<BusinessSummary> {
    application.id.map(|application_id| BusinessSummary {
        application_id,
        business_name: application.business_name,
        status: application.status,
    })
}
